//! The coordination context: owns the controller and applies everything
//! that changes search state (input, completions, new index snapshots,
//! refresh progress) one at a time.

use std::sync::Arc;

use snippets_progress::RefreshProgress;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::{SnippetError, SnippetResult};
use crate::fuzzy::{FuzzyMatcher, NameMatcher};
use crate::model::{HighlightStyle, IndexSnapshot, ResultRow, Snippet};
use crate::pipeline::{Completion, JobSpawner, PipelineState, SearchConfig, SearchController};
use crate::provider::{IndexProvider, PresentationContext};
use crate::query::SearchMode;

/// Everything a presentation layer needs to draw the search.
#[derive(Debug, Clone, Default)]
pub struct SearchSnapshot {
    pub state: PipelineState,
    pub mode: SearchMode,
    pub input: String,
    pub rows: Arc<[ResultRow]>,
    pub cursor: Option<usize>,
    pub style: HighlightStyle,
    pub progress: RefreshProgress,
    pub index_len: usize,
    pub is_on: bool,
    /// Last storage failure worth telling the user about.
    pub notice: Option<String>,
}

impl SearchSnapshot {
    pub fn selected(&self) -> Option<&ResultRow> {
        self.cursor.and_then(|idx| self.rows.get(idx))
    }
}

/// What an edit request should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    Existing(Snippet),
    New,
}

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Input(String),
    SetMode(SearchMode),
    SetStyle(HighlightStyle),
    SelectNext,
    SelectPrevious,
    Commit,
    DeleteSelection,
    Open,
    Close,
}

pub struct SnippetSession<M = FuzzyMatcher> {
    controller: SearchController<M>,
    completions: mpsc::UnboundedReceiver<Completion>,
    provider: Arc<dyn IndexProvider>,
    context: Option<Arc<dyn PresentationContext>>,
    index_rx: watch::Receiver<IndexSnapshot>,
    progress_rx: watch::Receiver<RefreshProgress>,
    progress: RefreshProgress,
    is_on: bool,
    notice: Option<String>,
    published: watch::Sender<SearchSnapshot>,
}

impl<M: NameMatcher + 'static> SnippetSession<M> {
    pub fn new(
        config: SearchConfig,
        matcher: M,
        spawner: Arc<dyn JobSpawner>,
        provider: Arc<dyn IndexProvider>,
        context: Option<Arc<dyn PresentationContext>>,
    ) -> Self {
        let (mut controller, completions) = SearchController::new(config, matcher, spawner);
        let mut index_rx = provider.subscribe_index();
        let mut progress_rx = provider.subscribe_progress();
        controller.replace_index(index_rx.borrow_and_update().clone());
        let progress = *progress_rx.borrow_and_update();
        let (published, _) = watch::channel(SearchSnapshot::default());

        let mut session = Self {
            controller,
            completions,
            provider,
            context,
            index_rx,
            progress_rx,
            progress,
            is_on: false,
            notice: None,
            published,
        };
        session.publish();
        session
    }

    pub fn controller(&self) -> &SearchController<M> {
        &self.controller
    }

    /// Watch published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            state: self.controller.state(),
            mode: self.controller.mode(),
            input: self.controller.input().to_string(),
            rows: Arc::clone(self.controller.displayed()),
            cursor: self.controller.selection().index(),
            style: self.controller.style(),
            progress: self.progress,
            index_len: self.controller.index().len(),
            is_on: self.is_on,
            notice: self.notice.clone(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn progress(&self) -> RefreshProgress {
        self.progress
    }

    pub fn update_with(&mut self, text: &str) {
        self.controller.update_with(text);
        self.publish();
    }

    pub fn set_mode(&mut self, mode: SearchMode) {
        self.controller.set_mode(mode);
        self.publish();
    }

    pub fn set_style(&mut self, style: HighlightStyle) {
        self.controller.set_style(style);
        self.publish();
    }

    pub fn select_next(&mut self) -> Option<usize> {
        let cursor = self.controller.select_next();
        self.publish();
        cursor
    }

    pub fn select_previous(&mut self) -> Option<usize> {
        let cursor = self.controller.select_previous();
        self.publish();
        cursor
    }

    pub fn select_snippet(&mut self, snippet: &Snippet) -> bool {
        let moved = self.controller.select_snippet(snippet);
        if moved {
            self.publish();
        }
        moved
    }

    pub fn current_selection(&self) -> Option<&Snippet> {
        self.controller.current_selection()
    }

    pub fn open(&mut self) {
        self.is_on = true;
        if let Some(context) = &self.context {
            context.present_search();
        }
        self.publish();
    }

    pub fn close(&mut self) {
        self.is_on = false;
        if let Some(context) = &self.context {
            context.dismiss_search();
        }
        self.publish();
    }

    /// Deliver the selected snippet's content. Returns false when nothing
    /// is selected.
    pub fn commit_selection(&mut self) -> SnippetResult<bool> {
        let Some(snippet) = self.controller.current_selection().cloned() else {
            return Ok(false);
        };
        let content = match snippet.searchable_content() {
            Ok(content) => content,
            Err(err) => {
                error!("cannot commit {}: {err}", snippet.id());
                self.notice = Some(format!("Could not read {}: {err}", snippet.id()));
                self.publish();
                return Err(err);
            }
        };
        self.send_content_to_receiver(&content);
        Ok(true)
    }

    /// Hand `content` to the context's receiver, clear the input and close
    /// the surface.
    pub fn send_content_to_receiver(&mut self, content: &str) {
        match self.context.as_ref().and_then(|c| c.provide_receiver()) {
            Some(receiver) => receiver.receive(content),
            None => warn!("no snippet receiver available; dropping {} bytes", content.len()),
        }
        self.controller.reset();
        self.close();
    }

    pub fn edit_selection_or_create(&self) -> EditTarget {
        match self.controller.current_selection() {
            Some(snippet) => EditTarget::Existing(snippet.clone()),
            None => EditTarget::New,
        }
    }

    /// Delete through the provider. On success the snippet leaves the local
    /// index and the search is reset; on failure nothing changes but the
    /// notice.
    pub fn delete_snippet(&mut self, snippet: &Snippet) -> SnippetResult<()> {
        match self.provider.delete(snippet) {
            Ok(()) => {
                info!("deleted {}", snippet.id());
                let index = self.controller.index().without(snippet.id());
                self.controller.replace_index(index);
                self.controller.reset();
                self.notice = None;
                self.publish();
                Ok(())
            }
            Err(err) => Err(self.storage_failure("delete", &snippet.id().to_string(), err)),
        }
    }

    pub fn save_snippet(
        &mut self,
        folder: &str,
        name: &str,
        content: &str,
    ) -> SnippetResult<Snippet> {
        match self.provider.save(folder, name, content) {
            Ok(saved) => {
                info!("saved {}", saved.id());
                let index = self.controller.index().with(saved.clone());
                self.apply_local_index(index);
                Ok(saved)
            }
            Err(err) => Err(self.storage_failure("save", &format!("{folder}/{name}"), err)),
        }
    }

    pub fn rename_snippet(
        &mut self,
        snippet: &Snippet,
        folder: &str,
        name: &str,
        content: &str,
    ) -> SnippetResult<Snippet> {
        match self.provider.rename(snippet, folder, name, content) {
            Ok(renamed) => {
                info!("renamed {} to {}", snippet.id(), renamed.id());
                let index = self
                    .controller
                    .index()
                    .without(snippet.id())
                    .with(renamed.clone());
                self.apply_local_index(index);
                Ok(renamed)
            }
            Err(err) => Err(self.storage_failure("rename", &snippet.id().to_string(), err)),
        }
    }

    /// Apply whatever is already waiting: completions, a new index
    /// snapshot, a new progress value. Never blocks.
    pub fn pump(&mut self) -> usize {
        let applied = self.controller.drain(&mut self.completions);
        if self.index_rx.has_changed().unwrap_or(false) {
            let index = self.index_rx.borrow_and_update().clone();
            self.controller.replace_index(index);
        }
        if self.progress_rx.has_changed().unwrap_or(false) {
            self.progress = *self.progress_rx.borrow_and_update();
        }
        // Index replacement may have issued work an inline spawner already finished.
        let applied = applied + self.controller.drain(&mut self.completions);
        self.publish();
        applied
    }

    /// Wait until no job is in flight.
    pub async fn settle(&mut self) {
        while self.controller.is_busy() {
            match self.completions.recv().await {
                Some(completion) => {
                    self.controller.apply(completion);
                }
                None => break,
            }
        }
        self.publish();
    }

    /// Serve commands until the command channel closes.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let mut index_open = true;
        let mut progress_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(completion) = self.completions.recv() => {
                    self.controller.apply(completion);
                }
                changed = self.index_rx.changed(), if index_open => match changed {
                    Ok(()) => {
                        let index = self.index_rx.borrow_and_update().clone();
                        self.controller.replace_index(index);
                    }
                    Err(_) => {
                        debug!("index provider closed its snapshot stream");
                        index_open = false;
                    }
                },
                changed = self.progress_rx.changed(), if progress_open => match changed {
                    Ok(()) => self.progress = *self.progress_rx.borrow_and_update(),
                    Err(_) => progress_open = false,
                },
            }
            self.publish();
        }
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Input(text) => self.controller.update_with(&text),
            SessionCommand::SetMode(mode) => self.controller.set_mode(mode),
            SessionCommand::SetStyle(style) => self.controller.set_style(style),
            SessionCommand::SelectNext => {
                self.controller.select_next();
            }
            SessionCommand::SelectPrevious => {
                self.controller.select_previous();
            }
            SessionCommand::Commit => {
                // failures are already logged and noted
                let _ = self.commit_selection();
            }
            SessionCommand::DeleteSelection => {
                if let Some(snippet) = self.controller.current_selection().cloned() {
                    let _ = self.delete_snippet(&snippet);
                }
            }
            SessionCommand::Open => self.open(),
            SessionCommand::Close => self.close(),
        }
    }

    fn apply_local_index(&mut self, index: IndexSnapshot) {
        self.controller.replace_index(index);
        if !self.controller.config().rerun_on_index_change {
            // Held results refer to the old snapshot; search again anyway.
            let input = self.controller.input().to_string();
            self.controller.set_input(&input);
        }
        self.notice = None;
        self.publish();
    }

    fn storage_failure(
        &mut self,
        action: &str,
        target: &str,
        err: SnippetError,
    ) -> SnippetError {
        error!("failed to {action} {target}: {err}");
        self.notice = Some(format!("Could not {action} {target}: {err}"));
        self.publish();
        err
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.published.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BlockingSpawner, InlineSpawner};
    use crate::testing::{CountingContext, MemoryProvider};

    fn example_index() -> Vec<Snippet> {
        vec![
            Snippet::inline("Find", "in directory", "find . -maxdepth 1 ${name}"),
            Snippet::inline("Find", "from directory", "find . -iname ${name}"),
            Snippet::inline("SSH", "connect", "ssh ${user}@${host}"),
        ]
    }

    fn session_with(
        provider: Arc<MemoryProvider>,
        context: Option<Arc<CountingContext>>,
    ) -> SnippetSession {
        SnippetSession::new(
            SearchConfig::default(),
            FuzzyMatcher,
            Arc::new(InlineSpawner),
            provider,
            context.map(|c| c as Arc<dyn PresentationContext>),
        )
    }

    fn shown(session: &SnippetSession) -> Vec<String> {
        session
            .snapshot()
            .rows
            .iter()
            .map(|row| row.snippet.fuzzy_index().to_string())
            .collect()
    }

    #[test]
    fn picks_up_initial_index_and_searches() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = session_with(provider, None);
        assert_eq!(session.snapshot().index_len, 3);

        session.update_with("ssh");
        session.pump();
        assert_eq!(shown(&session), vec!["SSH/connect"]);
        assert_eq!(session.snapshot().mode, SearchMode::Insert);
    }

    #[test]
    fn commit_delivers_content_and_closes() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let context = Arc::new(CountingContext::default());
        let mut session = session_with(provider, Some(context.clone()));

        session.open();
        assert!(session.is_on());
        session.update_with("ssh");
        session.pump();
        assert!(session.commit_selection().unwrap());

        assert_eq!(context.received(), vec!["ssh ${user}@${host}".to_string()]);
        assert_eq!(context.presented(), 1);
        assert_eq!(context.dismissed(), 1);
        assert!(!session.is_on());
        assert_eq!(session.snapshot().input, "");
        assert!(session.snapshot().rows.is_empty());
    }

    #[test]
    fn commit_without_selection_is_a_no_op() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let context = Arc::new(CountingContext::default());
        let mut session = session_with(provider, Some(context.clone()));
        assert!(!session.commit_selection().unwrap());
        assert!(context.received().is_empty());
    }

    #[test]
    fn edit_target_follows_selection() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = session_with(provider, None);
        assert_eq!(session.edit_selection_or_create(), EditTarget::New);
        session.update_with("ssh");
        session.pump();
        assert_eq!(
            session.edit_selection_or_create(),
            EditTarget::Existing(Snippet::inline("SSH", "connect", ""))
        );
    }

    #[test]
    fn delete_removes_locally_and_resets_search() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = session_with(provider.clone(), None);
        session.update_with("find");
        session.pump();
        let target = session.current_selection().cloned().unwrap();

        session.delete_snippet(&target).unwrap();
        assert_eq!(session.snapshot().index_len, 2);
        assert_eq!(session.snapshot().input, "");
        assert!(session.snapshot().rows.is_empty());
        assert_eq!(session.snapshot().cursor, None);
        assert!(provider.deleted().contains(target.id()));
    }

    #[test]
    fn failed_delete_leaves_search_state_alone() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        provider.fail_writes(true);
        let mut session = session_with(provider, None);
        session.update_with("find");
        session.pump();
        session.select_next();
        let before = session.snapshot();
        let target = session.current_selection().cloned().unwrap();

        assert!(session.delete_snippet(&target).is_err());
        let after = session.snapshot();
        assert_eq!(after.index_len, 3);
        assert_eq!(after.input, before.input);
        assert_eq!(after.cursor, before.cursor);
        assert_eq!(after.rows.len(), before.rows.len());
        assert!(after.notice.unwrap().contains("delete"));

        // later operations still work
        session.update_with("ssh");
        session.pump();
        assert_eq!(shown(&session), vec!["SSH/connect"]);
    }

    #[test]
    fn save_makes_new_snippet_searchable() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = session_with(provider, None);
        session.update_with("git");
        session.pump();
        assert!(shown(&session).is_empty());

        session.save_snippet("Git", "status", "git status -sb").unwrap();
        session.pump();
        assert_eq!(shown(&session), vec!["Git/status"]);
    }

    #[test]
    fn rename_replaces_old_identity() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = session_with(provider, None);
        let old = Snippet::inline("SSH", "connect", "");
        session
            .rename_snippet(&old, "SSH", "login", "ssh -l ${user} ${host}")
            .unwrap();
        session.update_with("ssh");
        session.pump();
        assert_eq!(shown(&session), vec!["SSH/login"]);
    }

    #[test]
    fn provider_snapshots_and_progress_are_applied_on_pump() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = session_with(provider.clone(), None);
        session.update_with("ssh");
        session.pump();

        provider.publish(vec![
            Snippet::inline("SSH", "connect", "ssh"),
            Snippet::inline("SSH", "tunnel", "ssh -L"),
        ]);
        provider.set_progress(RefreshProgress::Complete);
        session.pump();

        assert_eq!(shown(&session).len(), 2);
        assert_eq!(session.progress(), RefreshProgress::Complete);
    }

    #[tokio::test]
    async fn run_loop_serves_commands_and_publishes() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session = SnippetSession::new(
            SearchConfig::default(),
            FuzzyMatcher,
            Arc::new(BlockingSpawner),
            provider,
            None,
        );
        let mut snapshots = session.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            session.run(rx).await;
            session
        });

        tx.send(SessionCommand::Input("find iname".into())).unwrap();
        let settled = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                snapshots.changed().await.unwrap();
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.state == PipelineState::Settled && !snapshot.rows.is_empty() {
                    return snapshot;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(settled.rows.len(), 1);
        assert_eq!(settled.rows[0].snippet.name(), "from directory");

        drop(tx);
        let session = handle.await.unwrap();
        assert_eq!(session.snapshot().input, "find iname");
    }

    #[tokio::test]
    async fn settle_waits_for_background_jobs() {
        let provider = Arc::new(MemoryProvider::new(example_index()));
        let mut session: SnippetSession = SnippetSession::new(
            SearchConfig::default(),
            FuzzyMatcher,
            Arc::new(BlockingSpawner),
            provider,
            None,
        );
        session.update_with("find name");
        session.settle().await;
        assert_eq!(shown(&session).len(), 2);
        assert_eq!(session.snapshot().state, PipelineState::Settled);
    }
}
