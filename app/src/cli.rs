use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use snippets_core::{
    BlockingSpawner, FuzzyMatcher, HighlightStyle, IndexSnapshot, InlineSpawner,
    PresentationContext, ResultRow, SearchConfig, SearchController, SnippetError, SnippetId,
    SnippetReceiver, SnippetResult, SnippetSession,
};
use snippets_fs::{LocalSnippets, watch_snippets};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::render::render_list;

/// `<documents>/snippets`, or the current directory when the platform has
/// no documents folder.
pub fn default_root() -> PathBuf {
    match dirs::document_dir() {
        Some(docs) => docs.join("snippets"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Initialize tracing for CLI commands.
///
/// Logs go to stderr, and respect RUST_LOG or default to `info`.
pub fn init_tracing_cli() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize tracing for the MCP server.
///
/// - Never logs to stdout (to keep stdio clean for JSON-RPC).
/// - If `SNIP_LOG_PATH` is set, append logs to that file.
/// - If not set or the file cannot be opened, no subscriber is installed.
pub fn init_tracing_server() {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::{EnvFilter, fmt};

    let path = match std::env::var("SNIP_LOG_PATH") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => return,
    };

    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub style: HighlightStyle,
    pub folder_regex: Option<String>,
}

impl SearchOptions {
    pub fn config(&self) -> SearchConfig {
        SearchConfig {
            result_limit: self.limit,
            style: self.style,
            ..SearchConfig::default()
        }
    }

    fn folder_filter(&self) -> Option<Regex> {
        let pattern = self.folder_regex.as_ref()?;
        match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                error!("Invalid folder regex '{}': {}", pattern, err);
                std::process::exit(1);
            }
        }
    }
}

/// Run both search phases to completion on the calling thread.
pub fn search_once(index: IndexSnapshot, input: &str, config: SearchConfig) -> Arc<[ResultRow]> {
    let (mut controller, mut completions) =
        SearchController::new(config, FuzzyMatcher, Arc::new(InlineSpawner));
    controller.replace_index(index);
    controller.update_with(input);
    controller.drain(&mut completions);
    Arc::clone(controller.displayed())
}

/// Keep only rows whose folder matches `folder_regex`.
pub fn filter_rows(rows: &[ResultRow], folder_regex: Option<&Regex>) -> Vec<ResultRow> {
    rows.iter()
        .filter(|row| folder_regex.is_none_or(|re| re.is_match(row.snippet.folder())))
        .cloned()
        .collect()
}

fn open_store(root: Option<PathBuf>) -> SnippetResult<LocalSnippets> {
    let root = root.unwrap_or_else(default_root);
    debug!("snippet root: {}", root.display());
    LocalSnippets::open(root)
}

fn parse_id(spec: &str) -> SnippetResult<SnippetId> {
    SnippetId::parse(spec).ok_or_else(|| SnippetError::InvalidName(spec.to_string()))
}

fn color_enabled() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Writes committed content to stdout.
pub struct StdoutReceiver;

impl SnippetReceiver for StdoutReceiver {
    fn receive(&self, content: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(content.as_bytes());
        if !content.ends_with('\n') {
            let _ = stdout.write_all(b"\n");
        }
        let _ = stdout.flush();
    }
}

/// The terminal is the surface; presenting and dismissing only log.
struct TerminalContext {
    receiver: Arc<StdoutReceiver>,
}

impl PresentationContext for TerminalContext {
    fn present_search(&self) {
        debug!("picker opened");
    }

    fn dismiss_search(&self) {
        debug!("picker closed");
    }

    fn provide_receiver(&self) -> Option<Arc<dyn SnippetReceiver>> {
        Some(self.receiver.clone())
    }
}

pub fn run_list(root: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(root)?;
    for id in store.list_snippets()? {
        println!("{id}");
    }
    Ok(())
}

pub fn run_search(
    root: Option<PathBuf>,
    options: SearchOptions,
    input: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let folder_regex = options.folder_filter();
    let store = open_store(root)?;
    let rows = search_once(store.snapshot(), &input, options.config());
    let rows = filter_rows(&rows, folder_regex.as_ref());

    println!("{}", render_list(&rows, None, options.style, color_enabled()));
    Ok(())
}

pub fn run_show(root: Option<PathBuf>, spec: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(root)?;
    let id = parse_id(spec)?;
    let snippet = match store.get(&id) {
        Ok(s) => s,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };
    StdoutReceiver.receive(&snippet.searchable_content()?);
    Ok(())
}

pub fn run_add(
    root: Option<PathBuf>,
    folder: &str,
    name: &str,
    content: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = match content {
        Some(c) => c,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let store = open_store(root)?;
    let snippet = store.save_snippet(folder, name, &content)?;
    info!("saved {}", snippet.id());
    Ok(())
}

pub fn run_rm(root: Option<PathBuf>, spec: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(root)?;
    let id = parse_id(spec)?;
    store.delete_snippet(&id)?;
    info!("removed {id}");
    Ok(())
}

pub fn run_mv(
    root: Option<PathBuf>,
    spec: &str,
    folder: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(root)?;
    let id = parse_id(spec)?;
    let content = store.get(&id)?.searchable_content()?;
    let moved = store.rename_snippet(&id, folder, name, &content)?;
    info!("moved {id} to {}", moved.id());
    Ok(())
}

pub fn run_seed(root: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(root)?;
    match store.seed_defaults()? {
        0 => info!("snippets already seeded in {}", store.root().display()),
        n => info!("seeded {n} snippets into {}", store.root().display()),
    }
    Ok(())
}

/// Line-driven picker: every stdin line replaces the input, except the
/// `:next`, `:prev`, `:pick` and `:quit` commands.
pub async fn run_pick(
    root: Option<PathBuf>,
    options: SearchOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(open_store(root)?);
    let watcher_store = Arc::clone(&store);
    let watcher = tokio::spawn(async move {
        if let Err(err) = watch_snippets(watcher_store).await {
            warn!("file watcher stopped: {err}");
        }
    });

    let context: Arc<dyn PresentationContext> = Arc::new(TerminalContext {
        receiver: Arc::new(StdoutReceiver),
    });
    let mut session = SnippetSession::new(
        options.config(),
        FuzzyMatcher,
        Arc::new(BlockingSpawner),
        store,
        Some(context),
    );
    session.open();

    let color = color_enabled();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        session.pump();
        match line.trim() {
            ":quit" => {
                session.close();
                break;
            }
            ":next" => {
                session.select_next();
            }
            ":prev" => {
                session.select_previous();
            }
            ":pick" => match session.commit_selection() {
                Ok(true) => break,
                Ok(false) => warn!("nothing selected"),
                Err(err) => error!("{err}"),
            },
            _ => {
                session.update_with(&line);
                session.settle().await;
            }
        }

        let snapshot = session.snapshot();
        if let Some(notice) = &snapshot.notice {
            warn!("{notice}");
        }
        println!(
            "{}\n--",
            render_list(&snapshot.rows, snapshot.cursor, snapshot.style, color)
        );
    }

    watcher.abort();
    Ok(())
}
