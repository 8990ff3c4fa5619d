use tokio::sync::broadcast;
use tracing::debug;

use super::SessionData;
use crate::models::UserProfile;

/// Buffer for auth events; slow subscribers past this many events lag.
const AUTH_EVENT_BUFFER: usize = 16;

/// Change in authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(SessionData),
    SignedOut,
    TokenRefreshed(SessionData),
    UserUpdated(UserProfile),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::SignedOut => "signed_out",
            AuthEvent::TokenRefreshed(_) => "token_refreshed",
            AuthEvent::UserUpdated(_) => "user_updated",
        }
    }
}

/// Single sign-in/sign-out/session-change stream.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(AUTH_EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn emit(&self, event: AuthEvent) -> usize {
        debug!(event = event.name(), "Auth event");
        // No subscribers is fine: nobody needs to react
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}
