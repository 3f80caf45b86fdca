use rayon::prelude::*;
use tracing::warn;

use crate::model::{ContentHit, Snippet};
use crate::text::{find_ignore_case, preview_line};

/// Filters candidates by a case-insensitive substring of their content.
///
/// Output keeps the relative order of the input. A candidate whose content
/// cannot be loaded is dropped and logged; it never fails the search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSearcher;

impl ContentSearcher {
    pub fn search(&self, query: &str, candidates: &[Snippet]) -> Vec<ContentHit> {
        let needle = query.trim();
        if needle.is_empty() {
            return Vec::new();
        }

        candidates
            .par_iter()
            .filter_map(|snippet| {
                let content = match snippet.searchable_content() {
                    Ok(content) => content,
                    Err(err) => {
                        warn!("content search: skipping {}: {err}", snippet.id());
                        return None;
                    }
                };
                match_content(snippet, &content, needle)
            })
            .collect()
    }
}

/// Match one already-loaded body against `needle`.
pub fn match_content(snippet: &Snippet, content: &str, needle: &str) -> Option<ContentHit> {
    let spans = find_ignore_case(content, needle);
    if spans.is_empty() {
        return None;
    }
    let preview = preview_line(content, &spans);
    Some(ContentHit {
        snippet: snippet.clone(),
        spans,
        preview,
    })
}
