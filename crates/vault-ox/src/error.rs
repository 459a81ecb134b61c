use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use vault_ox_common::error::CommonRequestError;

/// One entry of a GraphQL `errors` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<serde_json::Value>>,
}

impl fmt::Display for GraphqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Coarse classification used by views to pick an error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Network or connectivity failure, or a response we could not read
    Transport,
    /// The service understood the request and refused or failed it
    Server,
    /// Bad input caught on the client before anything was sent
    Validation,
}

/// Errors produced by the vault client
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Transport(#[from] CommonRequestError),

    #[error("Server error: {}", join_messages(.0))]
    Server(Vec<GraphqlError>),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response is missing `{0}`")]
    MissingData(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VaultError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) if e.is_server_status() => ErrorKind::Server,
            Self::Server(_) | Self::MissingData(_) => ErrorKind::Server,
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Decode(_) | Self::Io(_) => ErrorKind::Transport,
        }
    }
}

/// Render a GraphQL error list as one line
fn join_messages(errors: &[GraphqlError]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
