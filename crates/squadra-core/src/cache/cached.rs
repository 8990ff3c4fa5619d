use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Offline data older than this is flagged as possibly out of date.
pub const STALE_AFTER_MINUTES: i64 = 60;

/// A row read back from the local cache together with the time it was
/// written locally. `synced_at` is the local write time, never a backend
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cached<T> {
    pub data: T,
    pub synced_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    pub fn new(data: T, synced_at: DateTime<Utc>) -> Self {
        Self { data, synced_at }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// Time since `synced_at`, clamped at zero for clock skew.
pub fn age_of(synced_at: DateTime<Utc>) -> Duration {
    (Utc::now() - synced_at).max(Duration::zero())
}

pub fn is_stale(synced_at: DateTime<Utc>) -> bool {
    age_of(synced_at) > Duration::minutes(STALE_AFTER_MINUTES)
}

/// Short relative age, truncated to the largest whole unit.
pub fn describe_age(age: Duration) -> String {
    match age.num_minutes() {
        m if m < 1 => "just now".to_string(),
        m if m < 60 => format!("{} min ago", m),
        m if m < 48 * 60 => format!("{} h ago", m / 60),
        m => format!("{} days ago", m / (24 * 60)),
    }
}
