use std::io;

use thiserror::Error;

use crate::model::SnippetId;

#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to load content of {id}: {source}")]
    ContentLoad {
        id: SnippetId,
        #[source]
        source: io::Error,
    },

    #[error("snippet not found: {0}")]
    NotFound(SnippetId),

    #[error("invalid snippet name: {0:?}")]
    InvalidName(String),

    #[error("snippet already exists: {0}")]
    AlreadyExists(SnippetId),

    #[error("index provider is no longer running")]
    ProviderClosed,
}

impl SnippetError {
    pub fn content_load(id: &SnippetId, source: io::Error) -> Self {
        SnippetError::ContentLoad {
            id: id.clone(),
            source,
        }
    }
}

pub type SnippetResult<T> = Result<T, SnippetError>;
