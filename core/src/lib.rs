pub mod accumulator;
pub mod content;
pub mod error;
pub mod fuzzy;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod selection;
pub mod session;
pub mod text;

#[cfg(test)]
mod testing;

pub use accumulator::{ContentAccumulator, FuzzyAccumulator};
pub use content::ContentSearcher;
pub use error::{SnippetError, SnippetResult};
pub use fuzzy::{FuzzyMatcher, FuzzyOutcome, NameMatcher, RESULTS_LIMIT};
pub use model::{
    ContentHit, ContentPreview, ContentSource, FuzzyHit, HighlightSpan, HighlightStyle,
    IndexSnapshot, ResultRow, Snippet, SnippetId,
};
pub use pipeline::{
    BlockingSpawner, Completion, InlineSpawner, JobSpawner, PipelineState, SearchConfig,
    SearchController,
};
pub use provider::{IndexProvider, PresentationContext, SnippetReceiver};
pub use query::{SearchMode, SplitQuery, split_query};
pub use selection::SelectionCursor;
pub use session::{EditTarget, SearchSnapshot, SessionCommand, SnippetSession};
pub use snippets_progress::RefreshProgress;
