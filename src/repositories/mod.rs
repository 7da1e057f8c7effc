//! # Repositories
//!
//! Storage behind the API clients and the tool layer:
//!
//! - [`ResponseCache`]: persistent HTTP response store, one partition per API
//! - [`PlaybookRepository`]: read-only playbook documents loaded at startup
//!
//! Both implement [`Repository`] so the CLI can report on them uniformly.

pub mod cache;
pub mod playbook;

pub use cache::{CacheStats, CachedResponse, ResponseCache};
pub use playbook::{Playbook, PlaybookError, PlaybookRepository, PlaybookStep, PlaybookStepType};

/// Common repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Repository result type
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

impl From<sled::Error> for RepositoryError {
    fn from(err: sled::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<bincode::Error> for RepositoryError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<RepositoryError> for crate::Error {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Storage { message } => Self::cache("storage", message),
            RepositoryError::Serialization { message } => Self::cache("serialization", message),
        }
    }
}

/// Base trait for all repositories
pub trait Repository: Send + Sync {
    /// Returns the name of the repository for logging and debugging
    fn name(&self) -> &str;

    /// Removes every entry
    fn clear(&self) -> RepositoryResult<()>;

    /// Returns statistics about the repository
    fn stats(&self) -> RepositoryResult<RepositoryStats>;
}

/// Statistics about repository contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    /// Total number of entities stored
    pub total_entities: u64,
    /// Storage size on disk in bytes (for persistent repositories)
    pub storage_size_bytes: Option<u64>,
}
