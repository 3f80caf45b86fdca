use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{ContentHit, FuzzyHit, HighlightStyle, Snippet, SnippetId};

/// Anything an accumulator can hold.
pub trait Hit {
    fn snippet(&self) -> &Snippet;
}

impl Hit for FuzzyHit {
    fn snippet(&self) -> &Snippet {
        &self.snippet
    }
}

impl Hit for ContentHit {
    fn snippet(&self) -> &Snippet {
        &self.snippet
    }
}

/// Query-tagged result set of one search phase.
///
/// `query` is always the exact (normalized) query that produced `hits`, and
/// `source_revision` identifies the candidate set it was computed from: an
/// index snapshot revision for the name phase, a name-result revision for
/// the content phase.
#[derive(Debug, Clone)]
pub struct Accumulator<H> {
    query: String,
    style: HighlightStyle,
    hits: Vec<H>,
    truncated: bool,
    source_revision: Option<u64>,
}

pub type FuzzyAccumulator = Accumulator<FuzzyHit>;
pub type ContentAccumulator = Accumulator<ContentHit>;

impl<H: Hit> Accumulator<H> {
    pub fn empty(style: HighlightStyle) -> Self {
        Self {
            query: String::new(),
            style,
            hits: Vec::new(),
            truncated: false,
            source_revision: None,
        }
    }

    pub fn new(
        query: impl Into<String>,
        style: HighlightStyle,
        source_revision: u64,
        hits: Vec<H>,
        truncated: bool,
    ) -> Self {
        Self {
            query: query.into(),
            style,
            hits,
            truncated,
            source_revision: Some(source_revision),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn style(&self) -> HighlightStyle {
        self.style
    }

    pub fn set_style(&mut self, style: HighlightStyle) {
        self.style = style;
    }

    pub fn hits(&self) -> &[H] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn source_revision(&self) -> Option<u64> {
        self.source_revision
    }

    /// Forget the query and results, keeping the style.
    pub fn clear(&mut self) {
        self.query.clear();
        self.hits.clear();
        self.truncated = false;
        self.source_revision = None;
    }

    /// True when this accumulator already holds the answer for `query`
    /// against `source_revision`.
    pub fn is_reusable_for(&self, query: &str, source_revision: u64) -> bool {
        !query.is_empty()
            && self.query == query
            && self.source_revision == Some(source_revision)
    }

    pub fn snippets(&self) -> Vec<Snippet> {
        self.hits.iter().map(|h| h.snippet().clone()).collect()
    }

    /// Whether `query` may be answered by searching only inside this
    /// result set.
    ///
    /// Sound only for matchers where a hit for `query` is always a hit for
    /// every prefix of it, and only when nothing was cut by the limit.
    pub fn can_narrow(&self, query: &str, source_revision: u64) -> bool {
        !self.truncated
            && !self.query.is_empty()
            && self.source_revision == Some(source_revision)
            && query.len() > self.query.len()
            && query.starts_with(self.query.as_str())
    }

    /// Candidate set for `query`: the members of `wide` this accumulator
    /// holds when narrowing is sound, otherwise the whole `wide` set.
    ///
    /// Narrowed candidates keep their `wide` order so tie-breaks come out
    /// the same as a search over everything.
    pub fn choose_source(
        &self,
        query: &str,
        source_revision: u64,
        wide: &Arc<[Snippet]>,
    ) -> Arc<[Snippet]> {
        if !self.can_narrow(query, source_revision) {
            return Arc::clone(wide);
        }
        let keep: HashSet<&SnippetId> = self.hits.iter().map(|h| h.snippet().id()).collect();
        wide.iter()
            .filter(|s| keep.contains(s.id()))
            .cloned()
            .collect()
    }
}
