//! Two-phase incremental search: name matching, then content filtering.
//!
//! The controller lives on a single coordination context. Matching work is
//! handed to a [`JobSpawner`] and comes back as a [`Completion`] over an
//! mpsc channel; the coordinator applies completions one at a time with
//! [`SearchController::apply`].
//!
//! Every issued job carries a generation number. Cancelling a phase drops
//! its in-flight record, so a completion whose generation no longer matches
//! is discarded on arrival no matter when it finishes.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::accumulator::{ContentAccumulator, FuzzyAccumulator};
use crate::content::ContentSearcher;
use crate::fuzzy::{FuzzyMatcher, NameMatcher, RESULTS_LIMIT};
use crate::model::{HighlightSpan, HighlightStyle, IndexSnapshot, ResultRow, Snippet, SnippetId};
use crate::query::{SearchMode, split_query};
use crate::selection::SelectionCursor;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs matching work somewhere other than the coordination context.
pub trait JobSpawner: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Runs jobs on tokio's blocking pool. Must be called inside a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingSpawner;

impl JobSpawner for BlockingSpawner {
    fn spawn(&self, job: Job) {
        // Detached; the result travels back through the completion channel.
        drop(tokio::task::spawn_blocking(job));
    }
}

/// Runs jobs immediately on the calling thread. For one-shot searches.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSpawner;

impl JobSpawner for InlineSpawner {
    fn spawn(&self, job: Job) {
        job();
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Cap on name-match results.
    pub result_limit: usize,
    /// Re-run the active query when a new index snapshot arrives.
    pub rerun_on_index_change: bool,
    pub style: HighlightStyle,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_limit: RESULTS_LIMIT,
            rerun_on_index_change: true,
            style: HighlightStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    FuzzyInFlight,
    ContentInFlight,
    Settled,
}

/// Result of one background job, tagged with the generation it was issued
/// under.
#[derive(Debug)]
pub enum Completion {
    Fuzzy {
        generation: u64,
        accumulator: FuzzyAccumulator,
    },
    Content {
        generation: u64,
        accumulator: ContentAccumulator,
    },
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    query: String,
}

pub struct SearchController<M = FuzzyMatcher> {
    config: SearchConfig,
    matcher: Arc<M>,
    searcher: ContentSearcher,
    spawner: Arc<dyn JobSpawner>,
    completions: mpsc::UnboundedSender<Completion>,

    index: IndexSnapshot,
    mode: SearchMode,
    input: String,
    state: PipelineState,

    fuzzy: FuzzyAccumulator,
    content: ContentAccumulator,
    /// Snippets of `fuzzy`, in rank order; the content phase's wide source.
    fuzzy_snippets: Arc<[Snippet]>,
    /// Generation of the job that produced `fuzzy`.
    fuzzy_revision: u64,

    next_generation: u64,
    fuzzy_in_flight: Option<InFlight>,
    content_in_flight: Option<InFlight>,
    /// Filter term to run once the in-flight name match lands.
    pending_filter: String,

    displayed: Arc<[ResultRow]>,
    selection: SelectionCursor,
}

impl<M: NameMatcher + 'static> SearchController<M> {
    /// Build a controller plus the receiving end of its completion channel.
    /// The caller drains the receiver on the coordination context.
    pub fn new(
        config: SearchConfig,
        matcher: M,
        spawner: Arc<dyn JobSpawner>,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let style = config.style;
        let controller = Self {
            config,
            matcher: Arc::new(matcher),
            searcher: ContentSearcher,
            spawner,
            completions: tx,
            index: IndexSnapshot::empty(),
            mode: SearchMode::General,
            input: String::new(),
            state: PipelineState::Idle,
            fuzzy: FuzzyAccumulator::empty(style),
            content: ContentAccumulator::empty(style),
            fuzzy_snippets: Arc::from(Vec::new()),
            fuzzy_revision: 0,
            next_generation: 1,
            fuzzy_in_flight: None,
            content_in_flight: None,
            pending_filter: String::new(),
            displayed: Arc::from(Vec::new()),
            selection: SelectionCursor::default(),
        };
        (controller, rx)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn index(&self) -> &IndexSnapshot {
        &self.index
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn style(&self) -> HighlightStyle {
        self.config.style
    }

    pub fn fuzzy_results(&self) -> &FuzzyAccumulator {
        &self.fuzzy
    }

    pub fn content_results(&self) -> &ContentAccumulator {
        &self.content
    }

    /// The published result list. Replaced wholesale, never mutated.
    pub fn displayed(&self) -> &Arc<[ResultRow]> {
        &self.displayed
    }

    pub fn selection(&self) -> SelectionCursor {
        self.selection
    }

    pub fn is_busy(&self) -> bool {
        self.fuzzy_in_flight.is_some() || self.content_in_flight.is_some()
    }

    pub fn current_selection(&self) -> Option<&Snippet> {
        self.selection
            .index()
            .and_then(|idx| self.displayed.get(idx))
            .map(|row| &row.snippet)
    }

    pub fn select_next(&mut self) -> Option<usize> {
        self.selection.select_next()
    }

    pub fn select_previous(&mut self) -> Option<usize> {
        self.selection.select_previous()
    }

    /// Move the cursor onto `snippet` if it is displayed.
    pub fn select_snippet(&mut self, snippet: &Snippet) -> bool {
        match self.displayed.iter().position(|row| &row.snippet == snippet) {
            Some(idx) => self.selection.select(idx),
            None => false,
        }
    }

    /// Enter insert mode and search for `text`.
    pub fn update_with(&mut self, text: &str) {
        self.mode = SearchMode::Insert;
        self.set_input(text);
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.run_input();
    }

    pub fn set_mode(&mut self, mode: SearchMode) {
        self.mode = mode;
        self.run_input();
    }

    /// Clear the input and every result.
    pub fn reset(&mut self) {
        self.input.clear();
        self.run_input();
    }

    /// Change presentation style. Results and cursor are kept.
    pub fn set_style(&mut self, style: HighlightStyle) {
        self.config.style = style;
        self.fuzzy.set_style(style);
        self.content.set_style(style);
    }

    /// Swap in a new index snapshot.
    ///
    /// Held results keep their old source revision, so they are never
    /// reused or narrowed against the new snapshot.
    pub fn replace_index(&mut self, index: IndexSnapshot) {
        debug!(
            "index replaced: {} snippets (revision {})",
            index.len(),
            index.revision()
        );
        self.index = index;
        if self.config.rerun_on_index_change && split_query(self.mode, &self.input).is_some() {
            self.cancel_fuzzy();
            self.cancel_content();
            self.run_input();
        }
    }

    /// Apply a finished job. Returns false when it was stale and dropped.
    pub fn apply(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Fuzzy {
                generation,
                accumulator,
            } => {
                if !is_live(&self.fuzzy_in_flight, generation) {
                    debug!(
                        "discarding stale name results for {:?} (generation {generation})",
                        accumulator.query()
                    );
                    return false;
                }
                self.fuzzy_in_flight = None;
                debug!(
                    "name match {:?} settled with {} hits",
                    accumulator.query(),
                    accumulator.len()
                );
                self.fuzzy = accumulator;
                self.fuzzy_revision = generation;
                self.fuzzy_snippets = Arc::from(self.fuzzy.snippets());
                self.content.clear();
                let filter = mem::take(&mut self.pending_filter);
                self.run_content_phase(filter);
                true
            }
            Completion::Content {
                generation,
                accumulator,
            } => {
                if !is_live(&self.content_in_flight, generation) {
                    debug!(
                        "discarding stale content results for {:?} (generation {generation})",
                        accumulator.query()
                    );
                    return false;
                }
                self.content_in_flight = None;
                self.content = accumulator;
                let rows = self.content_rows();
                self.publish(rows);
                true
            }
        }
    }

    /// Apply every completion already waiting in `completions`.
    pub fn drain(&mut self, completions: &mut mpsc::UnboundedReceiver<Completion>) -> usize {
        let mut applied = 0;
        while let Ok(completion) = completions.try_recv() {
            if self.apply(completion) {
                applied += 1;
            }
        }
        applied
    }

    fn run_input(&mut self) {
        let Some(split) = split_query(self.mode, &self.input) else {
            self.clear_results();
            return;
        };
        let fuzzy_query = split.fuzzy.to_lowercase();
        let filter_query = split.filter.to_lowercase();

        if let Some(in_flight) = &self.fuzzy_in_flight
            && in_flight.query == fuzzy_query
        {
            // The same name term is already being matched; only the filter moved.
            self.pending_filter = filter_query;
            return;
        }

        if self.fuzzy.is_reusable_for(&fuzzy_query, self.index.revision()) {
            self.cancel_fuzzy();
            self.run_content_phase(filter_query);
            return;
        }

        self.cancel_content();
        self.start_fuzzy(fuzzy_query, filter_query);
    }

    fn start_fuzzy(&mut self, query: String, filter: String) {
        self.cancel_fuzzy();
        let generation = self.issue_generation();
        let revision = self.index.revision();
        let source = self
            .fuzzy
            .choose_source(&query, revision, self.index.snippets());
        debug!(
            "issuing name match {query:?} over {} candidates (generation {generation})",
            source.len()
        );

        let matcher = Arc::clone(&self.matcher);
        let tx = self.completions.clone();
        let limit = self.config.result_limit;
        let style = self.config.style;
        let job_query = query.clone();

        self.fuzzy_in_flight = Some(InFlight { generation, query });
        self.pending_filter = filter;
        self.state = PipelineState::FuzzyInFlight;

        self.spawner.spawn(Box::new(move || {
            let outcome = matcher.match_snippets(&job_query, &source, limit);
            let accumulator =
                FuzzyAccumulator::new(job_query, style, revision, outcome.hits, outcome.truncated);
            let _ = tx.send(Completion::Fuzzy {
                generation,
                accumulator,
            });
        }));
    }

    fn run_content_phase(&mut self, filter: String) {
        self.cancel_content();

        if self.fuzzy.is_empty() {
            self.content.clear();
            self.publish(Vec::new());
            return;
        }

        if filter.is_empty() {
            self.content.clear();
            let rows = self.fuzzy.hits().iter().map(ResultRow::from).collect();
            self.publish(rows);
            return;
        }

        if self.content.is_reusable_for(&filter, self.fuzzy_revision) {
            let rows = self.content_rows();
            self.publish(rows);
            return;
        }

        let generation = self.issue_generation();
        let revision = self.fuzzy_revision;
        let source = self
            .content
            .choose_source(&filter, revision, &self.fuzzy_snippets);
        debug!(
            "issuing content search {filter:?} over {} candidates (generation {generation})",
            source.len()
        );

        let searcher = self.searcher;
        let tx = self.completions.clone();
        let style = self.config.style;
        let job_query = filter.clone();

        self.content_in_flight = Some(InFlight {
            generation,
            query: filter,
        });
        self.state = PipelineState::ContentInFlight;

        self.spawner.spawn(Box::new(move || {
            let hits = searcher.search(&job_query, &source);
            let accumulator = ContentAccumulator::new(job_query, style, revision, hits, false);
            let _ = tx.send(Completion::Content {
                generation,
                accumulator,
            });
        }));
    }

    fn content_rows(&self) -> Vec<ResultRow> {
        let name_spans: HashMap<&SnippetId, &[HighlightSpan]> = self
            .fuzzy
            .hits()
            .iter()
            .map(|hit| (hit.snippet.id(), hit.spans.as_slice()))
            .collect();

        self.content
            .hits()
            .iter()
            .map(|hit| ResultRow {
                snippet: hit.snippet.clone(),
                name_spans: name_spans
                    .get(hit.snippet.id())
                    .map(|spans| spans.to_vec())
                    .unwrap_or_default(),
                preview: Some(hit.preview.clone()),
            })
            .collect()
    }

    fn clear_results(&mut self) {
        self.cancel_fuzzy();
        self.cancel_content();
        self.pending_filter.clear();
        self.fuzzy.clear();
        self.content.clear();
        self.fuzzy_snippets = Arc::from(Vec::new());
        self.publish(Vec::new());
        self.state = PipelineState::Idle;
    }

    fn publish(&mut self, rows: Vec<ResultRow>) {
        self.selection.reset(rows.len());
        self.displayed = Arc::from(rows);
        self.state = PipelineState::Settled;
    }

    fn cancel_fuzzy(&mut self) {
        if let Some(cancelled) = self.fuzzy_in_flight.take() {
            debug!(
                "cancelled name match {:?} (generation {})",
                cancelled.query, cancelled.generation
            );
        }
    }

    fn cancel_content(&mut self) {
        if let Some(cancelled) = self.content_in_flight.take() {
            debug!(
                "cancelled content search {:?} (generation {})",
                cancelled.query, cancelled.generation
            );
        }
    }

    fn issue_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }
}

fn is_live(in_flight: &Option<InFlight>, generation: u64) -> bool {
    matches!(in_flight, Some(f) if f.generation == generation)
}
