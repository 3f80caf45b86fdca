//! Test doubles for the pipeline and session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use snippets_progress::RefreshProgress;
use tokio::sync::watch;

use crate::error::{SnippetError, SnippetResult};
use crate::fuzzy::{FuzzyMatcher, FuzzyOutcome, NameMatcher};
use crate::model::{IndexSnapshot, Snippet, SnippetId};
use crate::pipeline::{Job, JobSpawner};
use crate::provider::{IndexProvider, PresentationContext, SnippetReceiver};

/// Queues jobs until a test decides when, and in which order, they run.
#[derive(Default)]
pub struct ManualSpawner {
    queue: Mutex<VecDeque<Job>>,
}

impl ManualSpawner {
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run the oldest queued job.
    pub fn run_next(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_front();
        job.map(|job| job()).is_some()
    }

    /// Run the newest queued job.
    pub fn run_last(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_back();
        job.map(|job| job()).is_some()
    }

    pub fn run_all(&self) {
        while self.run_next() {}
    }
}

impl JobSpawner for ManualSpawner {
    fn spawn(&self, job: Job) {
        self.queue.lock().unwrap().push_back(job);
    }
}

/// Real matcher that records every call.
#[derive(Default)]
pub struct CountingMatcher {
    calls: AtomicUsize,
    sizes: Mutex<Vec<usize>>,
}

impl CountingMatcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Candidate count of each call, in call order.
    pub fn candidate_sizes(&self) -> Vec<usize> {
        self.sizes.lock().unwrap().clone()
    }
}

impl NameMatcher for CountingMatcher {
    fn match_snippets(&self, query: &str, candidates: &[Snippet], limit: usize) -> FuzzyOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push(candidates.len());
        FuzzyMatcher.match_snippets(query, candidates, limit)
    }
}

/// In-memory provider. Writes succeed unless `fail_writes` is set and are
/// not republished; tests push snapshots explicitly with `publish`.
pub struct MemoryProvider {
    index: watch::Sender<IndexSnapshot>,
    progress: watch::Sender<RefreshProgress>,
    fail: Mutex<bool>,
    deleted: Mutex<Vec<SnippetId>>,
}

impl MemoryProvider {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        let (index, _) = watch::channel(IndexSnapshot::new(snippets));
        let (progress, _) = watch::channel(RefreshProgress::None);
        Self {
            index,
            progress,
            fail: Mutex::new(false),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn publish(&self, snippets: Vec<Snippet>) {
        self.index.send_replace(IndexSnapshot::new(snippets));
    }

    pub fn set_progress(&self, progress: RefreshProgress) {
        self.progress.send_replace(progress);
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn deleted(&self) -> Vec<SnippetId> {
        self.deleted.lock().unwrap().clone()
    }

    fn check(&self) -> SnippetResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(SnippetError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only store",
            )));
        }
        Ok(())
    }
}

impl IndexProvider for MemoryProvider {
    fn subscribe_index(&self) -> watch::Receiver<IndexSnapshot> {
        self.index.subscribe()
    }

    fn subscribe_progress(&self) -> watch::Receiver<RefreshProgress> {
        self.progress.subscribe()
    }

    fn save(&self, folder: &str, name: &str, content: &str) -> SnippetResult<Snippet> {
        self.check()?;
        Ok(Snippet::inline(folder, name, content))
    }

    fn delete(&self, snippet: &Snippet) -> SnippetResult<()> {
        self.check()?;
        self.deleted.lock().unwrap().push(snippet.id().clone());
        Ok(())
    }

    fn rename(
        &self,
        _snippet: &Snippet,
        folder: &str,
        name: &str,
        content: &str,
    ) -> SnippetResult<Snippet> {
        self.check()?;
        Ok(Snippet::inline(folder, name, content))
    }
}

#[derive(Default)]
struct CollectingReceiver {
    received: Mutex<Vec<String>>,
}

impl SnippetReceiver for CollectingReceiver {
    fn receive(&self, content: &str) {
        self.received.lock().unwrap().push(content.to_string());
    }
}

/// Context that counts surface calls and collects delivered content.
#[derive(Default)]
pub struct CountingContext {
    presented: AtomicUsize,
    dismissed: AtomicUsize,
    receiver: Arc<CollectingReceiver>,
}

impl CountingContext {
    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }

    pub fn dismissed(&self) -> usize {
        self.dismissed.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.receiver.received.lock().unwrap().clone()
    }
}

impl PresentationContext for CountingContext {
    fn present_search(&self) {
        self.presented.fetch_add(1, Ordering::SeqCst);
    }

    fn dismiss_search(&self) {
        self.dismissed.fetch_add(1, Ordering::SeqCst);
    }

    fn provide_receiver(&self) -> Option<Arc<dyn SnippetReceiver>> {
        Some(self.receiver.clone())
    }
}
