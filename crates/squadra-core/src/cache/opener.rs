use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use crate::error::StorageError;

/// Physically opens the local store.
///
/// Called on a blocking thread, at most once per initialization attempt.
pub trait StoreOpener: Send + Sync + 'static {
    fn open(&self) -> Result<Connection, StorageError>;

    /// Human-readable location for logs and status output.
    fn describe(&self) -> String;
}

/// Opens (creating if needed) a store file inside a data directory.
#[derive(Debug, Clone)]
pub struct FileOpener {
    path: PathBuf,
}

impl FileOpener {
    pub fn new(data_dir: impl AsRef<Path>, database_name: &str) -> Self {
        Self {
            path: data_dir.as_ref().join(database_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreOpener for FileOpener {
    fn open(&self) -> Result<Connection, StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %self.path.display(), "Opening local store");

        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(conn)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Private in-memory store, gone when the process exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryOpener;

impl StoreOpener for MemoryOpener {
    fn open(&self) -> Result<Connection, StorageError> {
        Ok(Connection::open_in_memory()?)
    }

    fn describe(&self) -> String {
        ":memory:".to_string()
    }
}
