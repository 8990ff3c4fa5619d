//! REST client for the hosted backend.
//!
//! Relational reads and writes go through the PostgREST endpoint
//! (`/rest/v1`), authentication through GoTrue (`/auth/v1`). Requests carry
//! the project's anon key plus the session's bearer token when signed in.

pub mod client;
pub mod error;

pub use client::SupabaseClient;
pub use error::ApiError;
