use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role a user holds within a club or team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Links a user to exactly one club or one team.
///
/// The backend enforces that exactly one of `club_id`/`team_id` is set;
/// the local cache stores whatever it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub club_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: String,
}

/// What a membership points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipTarget<'a> {
    Club(&'a str),
    Team(&'a str),
    /// Both or neither id set; only possible with malformed rows.
    Invalid,
}

impl Membership {
    pub fn target(&self) -> MembershipTarget<'_> {
        match (self.club_id.as_deref(), self.team_id.as_deref()) {
            (Some(club), None) => MembershipTarget::Club(club),
            (None, Some(team)) => MembershipTarget::Team(team),
            _ => MembershipTarget::Invalid,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(club: Option<&str>, team: Option<&str>) -> Membership {
        Membership {
            id: "m1".to_string(),
            user_id: "u1".to_string(),
            club_id: club.map(str::to_string),
            team_id: team.map(str::to_string),
            role: Role::Member,
            created_at: "2024-01-01".to_string(),
        }
    }

    #[test]
    fn test_role_parses_backend_values() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("member".parse::<Role>(), Ok(Role::Member));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_deserializes_lowercase() {
        let m: Membership = serde_json::from_str(
            r#"{"id":"m1","user_id":"u1","club_id":"c1","team_id":null,"role":"admin","created_at":"2024-01-01"}"#,
        )
        .unwrap();
        assert!(m.is_admin());
        assert_eq!(m.target(), MembershipTarget::Club("c1"));
    }

    #[test]
    fn test_membership_target() {
        assert_eq!(membership(None, Some("t1")).target(), MembershipTarget::Team("t1"));
        assert_eq!(membership(Some("c1"), Some("t1")).target(), MembershipTarget::Invalid);
        assert_eq!(membership(None, None).target(), MembershipTarget::Invalid);
    }
}
