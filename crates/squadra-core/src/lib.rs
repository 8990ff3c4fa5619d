//! Core library for squadra, a club and team management client.
//!
//! The backend is a hosted service (auth, relational storage, row-level
//! authorization). This crate adds what the client needs on top of it:
//!
//! - `cache`: local SQLite mirror of clubs, teams, memberships and the user
//!   profile, with a coordinator that initializes it exactly once
//! - `repository`: fetch-then-cache reads with offline fallback
//! - `api`: REST/auth client for the backend
//! - `auth`: session persistence and the auth event stream
//! - `config`: file and environment configuration

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;

pub use api::{ApiError, SupabaseClient};
pub use auth::{AuthEvent, AuthEvents, Session, SessionData};
pub use cache::{
    describe_age, CacheCoordinator, CacheStore, Cached, FileOpener, InitPhase, MemoryOpener,
    StoreOpener,
};
pub use config::Config;
pub use error::{CacheError, CacheResult, StorageError};
pub use remote::RemoteSource;
pub use repository::{Loaded, OfflineRepository, Origin};
