use std::path::{Component, Path};
use std::sync::atomic::{AtomicUsize, Ordering};

use ignore::WalkBuilder;
use rayon::prelude::*;
use snippets_core::{IndexSnapshot, Snippet, SnippetId, SnippetResult, text};
use snippets_progress::RefreshProgress;
use tracing::{debug, info, warn};

/// How often (in snippets) the scan reports progress.
const PROGRESS_EVERY: usize = 64;

/// Every snippet identity under `root`, sorted by `(folder, name)`.
///
/// Only files at least one directory deep count; hidden files and
/// directories are skipped.
pub fn list_snippets(root: &Path) -> SnippetResult<Vec<SnippetId>> {
    if !root.is_dir() {
        debug!("list_snippets: {} does not exist yet", root.display());
        return Ok(Vec::new());
    }

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut ids = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("list_snippets: failed to read entry: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        match id_from_relative(rel) {
            Some(id) => ids.push(id),
            None => debug!("list_snippets: ignoring {}", rel.display()),
        }
    }

    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// `Find/in directory` -> folder `Find`, name `in directory`. Nested
/// directories join into the folder with `/`.
fn id_from_relative(rel: &Path) -> Option<SnippetId> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => {
                    warn!("skipping non-UTF-8 path {}", rel.display());
                    return None;
                }
            },
            _ => return None,
        }
    }
    let (name, folder) = parts.split_last()?;
    if folder.is_empty() {
        return None;
    }
    Some(SnippetId::new(folder.join("/"), *name))
}

/// Build a full snapshot of `root`, reporting `InProgress` values through
/// `on_progress`. Binary files are left out.
pub fn scan<F>(root: &Path, on_progress: F) -> SnippetResult<IndexSnapshot>
where
    F: Fn(RefreshProgress) + Sync,
{
    // First pass: count.
    let ids = list_snippets(root)?;
    let total = ids.len();
    on_progress(RefreshProgress::from_counts(0, total));

    if total == 0 {
        info!("scan: no snippets under {}", root.display());
        return Ok(IndexSnapshot::empty());
    }

    // Second pass: check every file in parallel. Order follows `ids`.
    let counter = AtomicUsize::new(0);
    let snippets: Vec<Snippet> = ids
        .par_iter()
        .filter_map(|id| {
            let path = snippet_path(root, id);
            let keep = match text::read_text_file(&path) {
                Ok(Some(_)) => true,
                Ok(None) => {
                    warn!("scan: {} is not a text file, skipping", path.display());
                    false
                }
                Err(err) => {
                    warn!("scan: failed to read {}: {err}", path.display());
                    false
                }
            };

            let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
            if done.is_multiple_of(PROGRESS_EVERY) {
                on_progress(RefreshProgress::from_counts(done, total));
            }

            keep.then(|| Snippet::from_file(&id.folder, &id.name, &path))
        })
        .collect();

    on_progress(RefreshProgress::from_counts(total, total));
    info!(
        "scan: indexed {}/{} snippets under {}",
        snippets.len(),
        total,
        root.display()
    );
    Ok(IndexSnapshot::new(snippets))
}

/// On-disk location of `id` under `root`.
pub fn snippet_path(root: &Path, id: &SnippetId) -> std::path::PathBuf {
    let mut path = root.to_path_buf();
    for part in id.folder.split('/') {
        path.push(part);
    }
    path.push(&id.name);
    path
}
