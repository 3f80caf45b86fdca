use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{SnippetError, SnippetResult};
use crate::text::read_text_file;

/// Identity of a snippet: unique within an index snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnippetId {
    pub folder: String,
    pub name: String,
}

impl SnippetId {
    pub fn new(folder: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
        }
    }

    /// Parse `folder/name`. The last `/` separates the name, so nested
    /// folders (`a/b/name`) are accepted.
    pub fn parse(path: &str) -> Option<Self> {
        let (folder, name) = path.trim().rsplit_once('/')?;
        if folder.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(folder, name))
    }
}

impl fmt::Display for SnippetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.folder.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.folder, self.name)
        }
    }
}

/// Where a snippet's text body lives.
#[derive(Debug, Clone)]
pub enum ContentSource {
    Inline(Arc<str>),
    File(PathBuf),
}

/// A named, foldered text template.
///
/// Equality and hashing only look at the `(folder, name)` identity; two
/// snippets with the same identity but different bodies compare equal.
#[derive(Debug, Clone)]
pub struct Snippet {
    id: SnippetId,
    fuzzy_index: String,
    source: ContentSource,
}

impl Snippet {
    pub fn new(id: SnippetId, source: ContentSource) -> Self {
        let fuzzy_index = id.to_string();
        Self {
            id,
            fuzzy_index,
            source,
        }
    }

    pub fn inline(folder: &str, name: &str, content: &str) -> Self {
        Self::new(
            SnippetId::new(folder, name),
            ContentSource::Inline(Arc::from(content)),
        )
    }

    pub fn from_file(folder: &str, name: &str, path: &Path) -> Self {
        Self::new(
            SnippetId::new(folder, name),
            ContentSource::File(path.to_path_buf()),
        )
    }

    pub fn id(&self) -> &SnippetId {
        &self.id
    }

    pub fn folder(&self) -> &str {
        &self.id.folder
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// The string the name matcher runs against (`folder/name`).
    pub fn fuzzy_index(&self) -> &str {
        &self.fuzzy_index
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    /// Load the full text body. File-backed snippets are read on every call.
    pub fn searchable_content(&self) -> SnippetResult<String> {
        match &self.source {
            ContentSource::Inline(text) => Ok(text.to_string()),
            ContentSource::File(path) => match read_text_file(path) {
                Ok(Some(text)) => Ok(text),
                Ok(None) => Err(SnippetError::content_load(
                    &self.id,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "not a text file"),
                )),
                Err(err) => Err(SnippetError::content_load(&self.id, err)),
            },
        }
    }
}

impl PartialEq for Snippet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Snippet {}

impl Hash for Snippet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Immutable, ordered, identity-deduplicated view of the snippet collection.
///
/// Every constructed snapshot gets a process-unique revision so results
/// computed against one snapshot are never mistaken for another's.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    snippets: Arc<[Snippet]>,
    revision: u64,
}

impl IndexSnapshot {
    pub fn new(snippets: impl IntoIterator<Item = Snippet>) -> Self {
        let mut seen = HashSet::new();
        let unique: Vec<Snippet> = snippets
            .into_iter()
            .filter(|s| seen.insert(s.id().clone()))
            .collect();
        Self {
            snippets: Arc::from(unique),
            revision: next_revision(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn snippets(&self) -> &Arc<[Snippet]> {
        &self.snippets
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn get(&self, id: &SnippetId) -> Option<&Snippet> {
        self.snippets.iter().find(|s| s.id() == id)
    }

    /// Copy of this snapshot without `id`.
    pub fn without(&self, id: &SnippetId) -> Self {
        Self::new(self.snippets.iter().filter(|s| s.id() != id).cloned())
    }

    /// Copy of this snapshot with `snippet` replacing any entry of the same
    /// identity in place, or appended.
    pub fn with(&self, snippet: Snippet) -> Self {
        let mut items: Vec<Snippet> = self.snippets.to_vec();
        match items.iter().position(|s| s == &snippet) {
            Some(pos) => items[pos] = snippet,
            None => items.push(snippet),
        }
        Self::new(items)
    }
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Half-open character range `[start, end)` used for highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
}

impl HighlightSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Presentation style carried by the accumulators. Never affects ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightStyle {
    #[default]
    Light,
    Dark,
}

/// A snippet matched by name, with the score used for ranking.
#[derive(Debug, Clone)]
pub struct FuzzyHit {
    pub snippet: Snippet,
    pub score: u32,
    /// Matched characters of `fuzzy_index`, merged into runs.
    pub spans: Vec<HighlightSpan>,
}

/// The line of content around the first match, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPreview {
    /// Zero-based line number within the content.
    pub line: usize,
    pub text: String,
    /// Spans relative to `text`.
    pub spans: Vec<HighlightSpan>,
}

/// A snippet whose content contains the filter term.
#[derive(Debug, Clone)]
pub struct ContentHit {
    pub snippet: Snippet,
    /// Every occurrence of the filter term, as character offsets into the content.
    pub spans: Vec<HighlightSpan>,
    pub preview: ContentPreview,
}

/// One row of the displayed result list.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub snippet: Snippet,
    pub name_spans: Vec<HighlightSpan>,
    pub preview: Option<ContentPreview>,
}

impl From<&FuzzyHit> for ResultRow {
    fn from(hit: &FuzzyHit) -> Self {
        ResultRow {
            snippet: hit.snippet.clone(),
            name_spans: hit.spans.clone(),
            preview: None,
        }
    }
}
