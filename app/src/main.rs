use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use snippets_core::HighlightStyle;

mod cli;
mod mcp;
mod render;

use crate::cli::{
    SearchOptions, init_tracing_cli, init_tracing_server, run_add, run_list, run_mv, run_pick,
    run_rm, run_search, run_seed, run_show,
};
use crate::mcp::run_server;

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
enum StyleArg {
    #[default]
    Light,
    Dark,
}

impl From<StyleArg> for HighlightStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Light => HighlightStyle::Light,
            StyleArg::Dark => HighlightStyle::Dark,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct SearchFlags {
    /// Maximum number of name matches
    #[arg(long, default_value_t = snippets_core::RESULTS_LIMIT)]
    limit: usize,
    /// Highlight colors
    #[arg(long, value_enum, default_value_t = StyleArg::Light)]
    style: StyleArg,
    /// Optional regex to filter results by folder
    #[arg(long = "folder-regex")]
    folder_regex: Option<String>,
}

impl From<SearchFlags> for SearchOptions {
    fn from(flags: SearchFlags) -> Self {
        SearchOptions {
            limit: flags.limit,
            style: flags.style.into(),
            folder_regex: flags.folder_regex,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every snippet as folder/name
    List {
        /// Snippet directory
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Search once: the first word matches names, the rest filters content
    Search {
        #[arg(long)]
        root: Option<PathBuf>,
        #[command(flatten)]
        flags: SearchFlags,
        /// Search input, e.g. `find maxdepth`
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },
    /// Print a snippet's content
    Show {
        #[arg(long)]
        root: Option<PathBuf>,
        /// Snippet as folder/name
        snippet: String,
    },
    /// Create or overwrite a snippet; reads content from stdin when omitted
    Add {
        #[arg(long)]
        root: Option<PathBuf>,
        folder: String,
        name: String,
        content: Option<String>,
    },
    /// Delete a snippet
    Rm {
        #[arg(long)]
        root: Option<PathBuf>,
        /// Snippet as folder/name
        snippet: String,
    },
    /// Move a snippet to a new folder and name
    Mv {
        #[arg(long)]
        root: Option<PathBuf>,
        /// Snippet as folder/name
        snippet: String,
        folder: String,
        name: String,
    },
    /// Write the built-in example snippets (only once)
    Seed {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Interactive picker driven by stdin lines (:next, :prev, :pick, :quit)
    Pick {
        #[arg(long)]
        root: Option<PathBuf>,
        #[command(flatten)]
        flags: SearchFlags,
    },
    /// Run MCP server over stdio
    Server {
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "snip",
    about = "snip: incremental search over a personal snippet collection",
    version,
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::Server { root } => {
            // Never log to stdout here; stdio carries JSON-RPC.
            init_tracing_server();
            run_server(root).await?;
        }
        command => {
            init_tracing_cli();
            match command {
                Command::List { root } => run_list(root)?,
                Command::Search { root, flags, input } => {
                    run_search(root, flags.into(), input.join(" "))?
                }
                Command::Show { root, snippet } => run_show(root, &snippet)?,
                Command::Add {
                    root,
                    folder,
                    name,
                    content,
                } => run_add(root, &folder, &name, content)?,
                Command::Rm { root, snippet } => run_rm(root, &snippet)?,
                Command::Mv {
                    root,
                    snippet,
                    folder,
                    name,
                } => run_mv(root, &snippet, &folder, &name)?,
                Command::Seed { root } => run_seed(root)?,
                Command::Pick { root, flags } => run_pick(root, flags.into()).await?,
                Command::Server { .. } => {}
            }
        }
    }

    Ok(())
}
