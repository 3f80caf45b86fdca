//! Seams to the collaborators the engine does not own: the index provider
//! that stores snippets, the receiver that consumes a committed snippet, and
//! the surface that shows the search.

use std::sync::Arc;

use snippets_progress::RefreshProgress;
use tokio::sync::watch;

use crate::error::SnippetResult;
use crate::model::{IndexSnapshot, Snippet};

/// Source of index snapshots and owner of snippet storage.
///
/// Snapshots are replaced wholesale; a subscriber only ever sees the latest.
pub trait IndexProvider: Send + Sync {
    fn subscribe_index(&self) -> watch::Receiver<IndexSnapshot>;

    fn subscribe_progress(&self) -> watch::Receiver<RefreshProgress>;

    fn save(&self, folder: &str, name: &str, content: &str) -> SnippetResult<Snippet>;

    fn delete(&self, snippet: &Snippet) -> SnippetResult<()>;

    /// Move `snippet` to `folder/name` with new `content`.
    fn rename(
        &self,
        snippet: &Snippet,
        folder: &str,
        name: &str,
        content: &str,
    ) -> SnippetResult<Snippet>;
}

/// Takes the text of a committed snippet (a terminal, a clipboard, stdout).
pub trait SnippetReceiver: Send + Sync {
    fn receive(&self, content: &str);
}

/// Host surface that shows and hides the search.
pub trait PresentationContext: Send + Sync {
    fn present_search(&self);

    fn dismiss_search(&self);

    fn provide_receiver(&self) -> Option<Arc<dyn SnippetReceiver>>;
}
