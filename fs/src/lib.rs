//! Directory-backed snippet store: `<root>/<folder>/<name>`, one file per
//! snippet.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use snippets_core::{
    IndexProvider, IndexSnapshot, RefreshProgress, Snippet, SnippetError, SnippetId,
    SnippetResult,
};
use snippets_progress::IndexStatus;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod defaults;
pub mod scanner;
pub mod watcher;

pub use defaults::DEFAULT_SNIPPETS;
pub use scanner::{list_snippets, scan, snippet_path};
pub use watcher::{SETTLE_DELAY, watch_snippets};

/// Marker written once the defaults have been seeded.
pub const SEEDED_MARKER: &str = ".seeded";

pub struct LocalSnippets {
    root: PathBuf,
    index: watch::Sender<IndexSnapshot>,
    progress: watch::Sender<RefreshProgress>,
}

impl LocalSnippets {
    /// A store over `root` with an empty snapshot. Call `refresh` to scan.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (index, _) = watch::channel(IndexSnapshot::empty());
        let (progress, _) = watch::channel(RefreshProgress::None);
        Self {
            root: root.into(),
            index,
            progress,
        }
    }

    /// Create `root` if needed and scan it.
    pub fn open(root: impl Into<PathBuf>) -> SnippetResult<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root)?;
        store.refresh()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.index.borrow().clone()
    }

    pub fn status(&self) -> IndexStatus {
        let snapshot = self.snapshot();
        let mut folders: Vec<&str> = snapshot.snippets().iter().map(|s| s.folder()).collect();
        folders.sort_unstable();
        folders.dedup();
        IndexStatus {
            progress: *self.progress.borrow(),
            snippet_count: snapshot.len(),
            folder_count: folders.len(),
        }
    }

    pub fn list_snippets(&self) -> SnippetResult<Vec<SnippetId>> {
        list_snippets(&self.root)
    }

    /// Rescan the directory and publish the result.
    pub fn refresh(&self) -> SnippetResult<IndexSnapshot> {
        let snapshot = scan(&self.root, |p| {
            self.progress.send_replace(p);
        })?;
        self.index.send_replace(snapshot.clone());
        self.progress.send_replace(RefreshProgress::Complete);
        Ok(snapshot)
    }

    pub fn path_of(&self, id: &SnippetId) -> PathBuf {
        snippet_path(&self.root, id)
    }

    /// Look up a stored snippet by identity.
    pub fn get(&self, id: &SnippetId) -> SnippetResult<Snippet> {
        let path = self.path_of(id);
        if !path.is_file() {
            return Err(SnippetError::NotFound(id.clone()));
        }
        Ok(Snippet::from_file(&id.folder, &id.name, &path))
    }

    /// Write `content` to `folder/name`, replacing any existing body.
    pub fn save_snippet(&self, folder: &str, name: &str, content: &str) -> SnippetResult<Snippet> {
        validate_folder(folder)?;
        validate_name(name)?;
        let id = SnippetId::new(folder, name);
        let path = self.path_of(&id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        debug!("saved {} to {}", id, path.display());

        let snippet = Snippet::from_file(folder, name, &path);
        self.index.send_modify(|index| *index = index.with(snippet.clone()));
        Ok(snippet)
    }

    /// Remove `id` and any folder directories left empty.
    pub fn delete_snippet(&self, id: &SnippetId) -> SnippetResult<()> {
        let path = self.path_of(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SnippetError::NotFound(id.clone()));
            }
            Err(err) => return Err(err.into()),
        }
        self.prune_empty_dirs(&path);
        debug!("deleted {}", id);

        self.index.send_modify(|index| *index = index.without(id));
        Ok(())
    }

    /// Move `from` to `folder/name` and write `content` there.
    pub fn rename_snippet(
        &self,
        from: &SnippetId,
        folder: &str,
        name: &str,
        content: &str,
    ) -> SnippetResult<Snippet> {
        validate_folder(folder)?;
        validate_name(name)?;
        let to = SnippetId::new(folder, name);
        let old_path = self.path_of(from);
        if !old_path.is_file() {
            return Err(SnippetError::NotFound(from.clone()));
        }
        if &to == from {
            return self.save_snippet(folder, name, content);
        }

        let new_path = self.path_of(&to);
        if new_path.exists() {
            return Err(SnippetError::AlreadyExists(to));
        }
        if let Some(parent) = new_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&new_path, content)?;
        if let Err(err) = fs::remove_file(&old_path) {
            // Leave exactly one copy on disk.
            if let Err(cleanup) = fs::remove_file(&new_path) {
                warn!("could not undo rename of {from}: {cleanup}");
            } else {
                self.prune_empty_dirs(&new_path);
            }
            return Err(err.into());
        }
        self.prune_empty_dirs(&old_path);
        debug!("renamed {} to {}", from, to);

        let snippet = Snippet::from_file(folder, name, &new_path);
        self.index
            .send_modify(|index| *index = index.without(from).with(snippet.clone()));
        Ok(snippet)
    }

    /// Write the built-in examples once. Returns how many were written;
    /// zero when the store was already seeded.
    pub fn seed_defaults(&self) -> SnippetResult<usize> {
        let marker = self.root.join(SEEDED_MARKER);
        if marker.exists() {
            debug!("seed_defaults: already seeded");
            return Ok(0);
        }
        fs::create_dir_all(&self.root)?;
        for (folder, name, content) in DEFAULT_SNIPPETS {
            self.save_snippet(folder, name, content)?;
        }
        fs::write(&marker, "")?;
        info!(
            "seeded {} default snippets into {}",
            DEFAULT_SNIPPETS.len(),
            self.root.display()
        );
        Ok(DEFAULT_SNIPPETS.len())
    }

    fn prune_empty_dirs(&self, removed: &Path) {
        let mut dir = removed.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails once the directory still has entries.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

impl IndexProvider for LocalSnippets {
    fn subscribe_index(&self) -> watch::Receiver<IndexSnapshot> {
        self.index.subscribe()
    }

    fn subscribe_progress(&self) -> watch::Receiver<RefreshProgress> {
        self.progress.subscribe()
    }

    fn save(&self, folder: &str, name: &str, content: &str) -> SnippetResult<Snippet> {
        self.save_snippet(folder, name, content)
    }

    fn delete(&self, snippet: &Snippet) -> SnippetResult<()> {
        self.delete_snippet(snippet.id())
    }

    fn rename(
        &self,
        snippet: &Snippet,
        folder: &str,
        name: &str,
        content: &str,
    ) -> SnippetResult<Snippet> {
        self.rename_snippet(snippet.id(), folder, name, content)
    }
}

/// A single path component: non-empty, no separators, not hidden, not `..`.
pub fn validate_name(name: &str) -> SnippetResult<()> {
    let invalid = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.starts_with('.')
        || name == "..";
    if invalid {
        return Err(SnippetError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A folder may nest with `/`; every segment must be a valid name.
pub fn validate_folder(folder: &str) -> SnippetResult<()> {
    if folder.is_empty() {
        return Err(SnippetError::InvalidName(folder.to_string()));
    }
    for segment in folder.split('/') {
        validate_name(segment).map_err(|_| SnippetError::InvalidName(folder.to_string()))?;
    }
    Ok(())
}
