//! Local offline cache.
//!
//! Two pieces cooperate here:
//!
//! - `CacheCoordinator` opens the SQLite store and provisions its schema
//!   exactly once, sharing one in-flight attempt between concurrent
//!   callers and allowing a retry after a failed attempt.
//! - `CacheStore` mirrors clubs, teams, memberships and the user profile
//!   with whole-row overwrite semantics, for reads when the backend is
//!   unreachable.

pub mod cached;
pub mod coordinator;
pub mod db;
pub mod opener;
mod schema;
pub mod store;

pub use cached::{describe_age, Cached};
pub use coordinator::{CacheCoordinator, InitPhase};
pub use db::CacheDb;
pub use opener::{FileOpener, MemoryOpener, StoreOpener};
pub use store::{CacheCounts, CacheStore};
