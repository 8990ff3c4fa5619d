use serde::{Deserialize, Serialize};

/// Profile row from the `users` collection, one per authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub created_at: String,
}

impl UserProfile {
    /// Name to show in listings, falling back to the email address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

/// Editable profile fields. Blank values are sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

impl ProfileUpdate {
    pub fn new(name: &str, phone_number: &str) -> Self {
        fn blank_to_none(s: &str) -> Option<String> {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        Self {
            name: blank_to_none(name),
            phone_number: blank_to_none(phone_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut profile = UserProfile {
            id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            name: None,
            phone_number: None,
            created_at: "2024-01-01".to_string(),
        };
        assert_eq!(profile.display_name(), "ana@example.com");

        profile.name = Some("   ".to_string());
        assert_eq!(profile.display_name(), "ana@example.com");

        profile.name = Some("Ana".to_string());
        assert_eq!(profile.display_name(), "Ana");
    }

    #[test]
    fn test_profile_update_trims_and_nulls_blanks() {
        let update = ProfileUpdate::new("  Ana ", "   ");
        assert_eq!(update.name.as_deref(), Some("Ana"));
        assert_eq!(update.phone_number, None);

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["phone_number"], serde_json::Value::Null);
    }
}
