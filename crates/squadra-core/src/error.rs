use std::sync::Arc;

use thiserror::Error;

/// Failure inside the local store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StorageError::Task(e.to_string())
    }
}

/// Errors surfaced by the cache coordinator and cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be opened or its schema provisioned.
    /// Every caller waiting on the same attempt receives the same error.
    #[error("failed to initialize local cache: {0}")]
    Initialization(Arc<StorageError>),

    /// The cache was used before `initialize()` completed.
    #[error("local cache not initialized; call initialize first")]
    NotInitialized,

    #[error("local cache storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CacheError {
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, CacheError::NotInitialized)
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
