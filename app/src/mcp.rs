use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::Deserialize;
use snippets_core::{SearchConfig, SnippetId};
use snippets_fs::{LocalSnippets, watch_snippets};
use tokio::task;
use tracing::{error, info};

use crate::cli::{default_root, filter_rows, search_once};
use crate::render::render_row;

const BUILDING_WARNING: &str =
    "Warning: snippet index is still building; results may be incomplete";

#[derive(Clone)]
pub struct SnippetServer {
    store: Arc<LocalSnippets>,
    tool_router: ToolRouter<SnippetServer>,
}

impl SnippetServer {
    fn internal_error(code: &str, message: impl Into<String>) -> McpError {
        let full = format!("{code}: {}", message.into());
        McpError::internal_error(full, None)
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchSnippetsArgs {
    /// First word matches snippet names fuzzily; the rest must occur in the content.
    pub input: String,
    #[serde(default)]
    pub folder_regex: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetSnippetArgs {
    /// Snippet as `folder/name`.
    pub snippet: String,
}

#[tool_router]
impl SnippetServer {
    pub fn new(store: Arc<LocalSnippets>) -> Self {
        Self {
            store,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Search the personal snippet collection. The first word of `input` is fuzzy-matched against `folder/name`; any remaining words must appear in the snippet content. Returns ranked snippet names with the matching content line."
    )]
    pub async fn search_snippets(
        &self,
        Parameters(args): Parameters<SearchSnippetsArgs>,
    ) -> Result<CallToolResult, McpError> {
        // While the first scan runs, answer from whatever snapshot exists.
        let building = !self.store.status().ready();

        let folder_regex = args
            .folder_regex
            .as_ref()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| Self::internal_error("invalid_folder_regex", e.to_string()))
            })
            .transpose()?;

        let mut config = SearchConfig::default();
        if let Some(limit) = args.limit {
            config.result_limit = limit;
        }
        let style = config.style;
        let snapshot = self.store.snapshot();
        let input = args.input;

        let rows = task::spawn_blocking(move || search_once(snapshot, &input, config))
            .await
            .map_err(|e| Self::internal_error("search_task_failed", e.to_string()))?;

        let mut contents: Vec<Content> = filter_rows(&rows, folder_regex.as_ref())
            .iter()
            .map(|row| Content::text(render_row(row, style, false)))
            .collect();
        if contents.is_empty() {
            contents.push(Content::text("No results"));
        }
        if building {
            contents.insert(0, Content::text(BUILDING_WARNING));
        }

        Ok(CallToolResult::success(contents))
    }

    #[tool(description = "Return the full content of one snippet, addressed as `folder/name`.")]
    pub async fn get_snippet(
        &self,
        Parameters(args): Parameters<GetSnippetArgs>,
    ) -> Result<CallToolResult, McpError> {
        let id = SnippetId::parse(&args.snippet).ok_or_else(|| {
            Self::internal_error(
                "invalid_snippet",
                format!("expected folder/name, got {:?}", args.snippet),
            )
        })?;
        let content = self
            .store
            .get(&id)
            .and_then(|snippet| snippet.searchable_content())
            .map_err(|e| Self::internal_error("snippet_unavailable", e.to_string()))?;

        Ok(CallToolResult::success(vec![Content::text(content)]))
    }
}

#[tool_handler]
impl ServerHandler for SnippetServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Personal command snippet library. Use `search_snippets` to find a command template by name and content, then `get_snippet` to fetch its full text."
                    .to_string(),
            ),
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
        }
    }
}

pub async fn run_server(root: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let root = root.unwrap_or_else(default_root);

    info!("snip MCP server starting");
    info!("root: {}", root.display());

    std::fs::create_dir_all(&root)?;
    let store = Arc::new(LocalSnippets::new(root));

    // Scan in the background so the server can answer immediately.
    let store_for_scan = Arc::clone(&store);
    task::spawn(async move {
        let res = task::spawn_blocking(move || store_for_scan.refresh()).await;
        match res {
            Ok(Ok(snapshot)) => {
                info!("MCP server: initial scan found {} snippets", snapshot.len());
            }
            Ok(Err(err)) => {
                error!("MCP server: initial scan failed: {err}");
            }
            Err(join_err) => {
                error!("MCP server: initial scan task panicked: {join_err}");
            }
        }
    });

    // Keep the snapshot current as files change.
    let store_for_watcher = Arc::clone(&store);
    task::spawn(async move {
        if let Err(err) = watch_snippets(store_for_watcher).await {
            error!("file watcher stopped: {err}");
        }
    });

    let server = SnippetServer::new(store);

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| error!("snip MCP serve error: {e:?}"))?;

    service.waiting().await?;

    Ok(())
}
