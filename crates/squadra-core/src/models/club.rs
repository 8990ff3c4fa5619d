use serde::{Deserialize, Serialize};

/// A club as returned by the `clubs` collection.
///
/// `created_at` is kept as the backend's ISO-8601 text so ordering by it
/// is a plain string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
}

impl Club {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }
}
