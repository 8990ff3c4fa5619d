use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info};

use super::db::CacheDb;
use super::opener::StoreOpener;
use super::schema::SCHEMA;
use crate::error::{CacheError, CacheResult, StorageError};

type InitOutcome = Result<CacheDb, Arc<StorageError>>;
type PendingInit = Shared<BoxFuture<'static, InitOutcome>>;

/// Lifecycle of the local store.
///
/// A failed attempt drops straight back to `Uninitialized`; failure is
/// never remembered.
enum InitState {
    Uninitialized,
    Initializing(PendingInit),
    Ready(CacheDb),
}

/// Observable phase of the coordinator, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Uninitialized,
    Initializing,
    Ready,
}

impl InitPhase {
    pub fn label(&self) -> &'static str {
        match self {
            InitPhase::Uninitialized => "not initialized",
            InitPhase::Initializing => "initializing",
            InitPhase::Ready => "ready",
        }
    }
}

/// Opens and provisions the local store exactly once.
///
/// Owned by the application's composition root and shared by `Arc`.
/// Concurrent `initialize()` calls attach to the single in-flight attempt
/// and all observe its outcome.
pub struct CacheCoordinator {
    opener: Arc<dyn StoreOpener>,
    state: Mutex<InitState>,
}

impl CacheCoordinator {
    pub fn new(opener: impl StoreOpener) -> Self {
        Self {
            opener: Arc::new(opener),
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, InitState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> InitPhase {
        match &*self.lock_state() {
            InitState::Uninitialized => InitPhase::Uninitialized,
            InitState::Initializing(_) => InitPhase::Initializing,
            InitState::Ready(_) => InitPhase::Ready,
        }
    }

    pub fn location(&self) -> String {
        self.opener.describe()
    }

    /// Live store handle, or `NotInitialized` if `initialize()` has not
    /// completed successfully. Never waits.
    pub fn handle(&self) -> CacheResult<CacheDb> {
        match &*self.lock_state() {
            InitState::Ready(db) => Ok(db.clone()),
            _ => Err(CacheError::NotInitialized),
        }
    }

    /// Ensure the store is open and its schema exists.
    ///
    /// Returns immediately once ready. While an attempt is in flight,
    /// callers await that same attempt instead of starting another.
    pub async fn initialize(&self) -> CacheResult<CacheDb> {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                InitState::Ready(db) => {
                    debug!("Local cache already initialized");
                    return Ok(db.clone());
                }
                InitState::Initializing(pending) => {
                    debug!("Local cache initialization in progress, waiting");
                    pending.clone()
                }
                InitState::Uninitialized => {
                    let pending = open_and_provision(Arc::clone(&self.opener))
                        .boxed()
                        .shared();
                    *state = InitState::Initializing(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        let mut state = self.lock_state();
        // Only the attempt currently on record may move the state; a caller
        // finishing late must not clobber a newer attempt.
        let current = matches!(&*state, InitState::Initializing(p) if p.ptr_eq(&pending));

        match outcome {
            Ok(db) => {
                if current {
                    info!(location = %self.opener.describe(), "Local cache initialized");
                    *state = InitState::Ready(db.clone());
                }
                Ok(db)
            }
            Err(e) => {
                if current {
                    error!(error = %e, "Error initializing local cache");
                    *state = InitState::Uninitialized;
                }
                Err(CacheError::Initialization(e))
            }
        }
    }
}

/// The physical open plus schema batch. Runs once per attempt.
async fn open_and_provision(opener: Arc<dyn StoreOpener>) -> InitOutcome {
    let result = tokio::task::spawn_blocking(move || -> Result<CacheDb, StorageError> {
        let conn = opener.open()?;
        // On error the connection is dropped here and nothing is kept
        conn.execute_batch(SCHEMA)?;
        Ok(CacheDb::new(conn))
    })
    .await;

    match result {
        Ok(inner) => inner.map_err(Arc::new),
        Err(join) => Err(Arc::new(join.into())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;
    use rusqlite::Connection;

    use super::*;
    use crate::cache::MemoryOpener;

    /// Counts physical opens; fails the first `fail_first` of them.
    pub(crate) struct ScriptedOpener {
        pub opens: Arc<AtomicUsize>,
        pub fail_first: usize,
        pub delay: Duration,
    }

    impl ScriptedOpener {
        pub fn new(fail_first: usize) -> (Self, Arc<AtomicUsize>) {
            let opens = Arc::new(AtomicUsize::new(0));
            let opener = Self {
                opens: Arc::clone(&opens),
                fail_first,
                delay: Duration::from_millis(20),
            };
            (opener, opens)
        }
    }

    impl StoreOpener for ScriptedOpener {
        fn open(&self) -> Result<Connection, StorageError> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if n < self.fail_first {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "storage unavailable",
                )));
            }
            MemoryOpener.open()
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[tokio::test]
    async fn test_sequential_initialize_opens_once() {
        let (opener, opens) = ScriptedOpener::new(0);
        let coordinator = CacheCoordinator::new(opener);

        for _ in 0..5 {
            coordinator.initialize().await.unwrap();
        }

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.phase(), InitPhase::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_shares_one_attempt() {
        let (opener, opens) = ScriptedOpener::new(0);
        let coordinator = CacheCoordinator::new(opener);

        let results = join_all((0..8).map(|_| coordinator.initialize())).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_shares_failure() {
        let (opener, opens) = ScriptedOpener::new(1);
        let coordinator = CacheCoordinator::new(opener);

        let results = join_all((0..6).map(|_| coordinator.initialize())).await;

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        for result in &results {
            assert!(matches!(result, Err(CacheError::Initialization(_))));
        }
        assert_eq!(coordinator.phase(), InitPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_retry_after_failure_starts_new_attempt() {
        let (opener, opens) = ScriptedOpener::new(1);
        let coordinator = CacheCoordinator::new(opener);

        let first = coordinator.initialize().await;
        assert!(matches!(first, Err(CacheError::Initialization(_))));
        assert!(coordinator.handle().unwrap_err().is_not_initialized());

        coordinator.initialize().await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert!(coordinator.handle().is_ok());
    }

    #[tokio::test]
    async fn test_handle_before_initialize_is_not_initialized() {
        let coordinator = CacheCoordinator::new(MemoryOpener);
        assert_eq!(coordinator.phase(), InitPhase::Uninitialized);
        assert!(matches!(coordinator.handle(), Err(CacheError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_schema_failure_is_initialization_error() {
        struct ReadOnlyOpener;

        impl StoreOpener for ReadOnlyOpener {
            fn open(&self) -> Result<Connection, StorageError> {
                let conn = Connection::open_in_memory()?;
                conn.pragma_update(None, "query_only", true)?;
                Ok(conn)
            }

            fn describe(&self) -> String {
                "read-only".to_string()
            }
        }

        let coordinator = CacheCoordinator::new(ReadOnlyOpener);
        let err = coordinator.initialize().await.unwrap_err();
        assert!(matches!(err, CacheError::Initialization(_)));
        assert_eq!(coordinator.phase(), InitPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let first = CacheCoordinator::new(crate::cache::FileOpener::new(dir.path(), "squadra.db"));
        first.initialize().await.unwrap();
        drop(first);

        // Provisioning is idempotent against an existing file
        let second = CacheCoordinator::new(crate::cache::FileOpener::new(dir.path(), "squadra.db"));
        second.initialize().await.unwrap();
        assert_eq!(second.phase(), InitPhase::Ready);
    }
}
