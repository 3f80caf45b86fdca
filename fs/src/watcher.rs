use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use snippets_core::SnippetError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::LocalSnippets;

/// Quiet period after the last relevant event before rescanning.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Watch the store's root and republish a fresh snapshot whenever snippet
/// files change. Runs until the watcher's event stream ends.
pub async fn watch_snippets(store: Arc<LocalSnippets>) -> notify::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        Config::default(),
    )?;

    watcher.watch(store.root(), RecursiveMode::Recursive)?;
    info!("watching {} for snippet changes", store.root().display());

    while let Some(res) = rx.recv().await {
        match res {
            Ok(event) if is_relevant(&event, store.root()) => {
                // Let a burst of writes finish, then drop what queued up meanwhile.
                tokio::time::sleep(SETTLE_DELAY).await;
                while rx.try_recv().is_ok() {}
                if let Err(err) = refresh(&store).await {
                    error!("watcher: refresh failed: {err}");
                }
            }
            Ok(event) => debug!("watcher: ignoring {:?}", event.kind),
            Err(err) => warn!("file watcher error: {err}"),
        }
    }

    Ok(())
}

fn is_relevant(event: &Event, root: &Path) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    );
    kind_matters && event.paths.iter().any(|path| !is_hidden(path, root))
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

async fn refresh(store: &Arc<LocalSnippets>) -> Result<(), SnippetError> {
    let store = Arc::clone(store);
    let snapshot = tokio::task::spawn_blocking(move || store.refresh())
        .await
        .map_err(|join_err| {
            error!("watcher: refresh task panicked: {join_err}");
            SnippetError::ProviderClosed
        })??;
    debug!("watcher: republished {} snippets", snapshot.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snippets_core::IndexProvider;

    #[test]
    fn hidden_paths_are_not_relevant() {
        let root = Path::new("/snips");
        assert!(is_hidden(Path::new("/snips/.seeded"), root));
        assert!(is_hidden(Path::new("/snips/Find/.in directory.swp"), root));
        assert!(!is_hidden(Path::new("/snips/Find/in directory"), root));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn new_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalSnippets::open(dir.path()).unwrap());
        let mut index_rx = store.subscribe_index();

        let watching = tokio::spawn(watch_snippets(Arc::clone(&store)));
        // give the watcher time to register
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::create_dir_all(dir.path().join("SSH")).unwrap();
        std::fs::write(dir.path().join("SSH/connect"), "ssh ${host}").unwrap();

        let found = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                index_rx.changed().await.unwrap();
                if index_rx.borrow_and_update().len() == 1 {
                    break;
                }
            }
        })
        .await;
        watching.abort();
        assert!(found.is_ok(), "watcher never republished the snapshot");
    }
}
