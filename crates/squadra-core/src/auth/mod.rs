//! Authentication state for the signed-in user.
//!
//! This module provides:
//! - `Session`: persisted session tokens with expiry tracking
//! - `AuthEvents`: broadcast stream of sign-in/sign-out/session changes,
//!   consumed by the offline repository to populate or clear the cache

pub mod events;
pub mod session;

pub use events::{AuthEvent, AuthEvents};
pub use session::{Session, SessionData};
