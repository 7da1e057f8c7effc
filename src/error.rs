use crate::repositories::playbook::PlaybookError;
use std::time::Duration;
use thiserror::Error;

/// Error type shared by every client, the tool layer and the server.
///
/// The `Transport` and `HttpStatus` display strings are relied on by callers
/// that match on message text, so their shape must stay
/// `"<api> API error: ..."`.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Upstream API errors
    #[error("{api} API error: {message}")]
    Transport { api: String, message: String },

    #[error("{api} API error: HTTP {status} - {detail}")]
    HttpStatus {
        api: String,
        status: u16,
        detail: String,
    },

    #[error("{api} API error: invalid JSON response - {message}")]
    Decode { api: String, message: String },

    #[error("{api} polling timed out after {attempts} attempts ({interval:?} apart)")]
    PollTimeout {
        api: String,
        attempts: u32,
        interval: Duration,
    },

    /// The upstream answered 2xx but reported a failure in its payload
    #[error("{context} error: {message}")]
    Remote { context: String, message: String },

    // Cache errors
    #[error("Cache error: {operation} failed - {reason}")]
    Cache { operation: String, reason: String },

    // Client errors
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    // General service error
    #[error("Service error: {0}")]
    Service(String),
}

impl Error {
    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn cache(operation: &str, reason: impl std::fmt::Display) -> Self {
        Self::Cache {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure came from talking to an upstream API
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::HttpStatus { .. }
                | Self::Decode { .. }
                | Self::PollTimeout { .. }
                | Self::Remote { .. }
        )
    }

    /// Whether the caller supplied bad arguments
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::UnknownTool(_))
    }

    /// HTTP status reported by the upstream, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
