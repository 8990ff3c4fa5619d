use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub club_id: String,
    pub created_at: String,
}

/// Insert payload for the `teams` collection.
///
/// Descriptive fields are optional; the server fills `id` and `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewTeam {
    pub name: String,
    pub club_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub season: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl NewTeam {
    /// A team in the season running on `today`.
    pub fn new(club_id: &str, name: &str, today: NaiveDate) -> Self {
        Self {
            name: name.trim().to_string(),
            club_id: club_id.to_string(),
            season: season_of(today),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("team name is required".to_string());
        }
        if self.club_id.is_empty() {
            return Err("club is required".to_string());
        }
        if !is_valid_season(&self.season) {
            return Err(format!("invalid season '{}', expected YYYY-YYYY", self.season));
        }
        Ok(())
    }
}

/// Seasons start in July: `2024-2025` runs from July 2024 to June 2025.
pub fn season_of(date: NaiveDate) -> String {
    let start = if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{}", start, start + 1)
}

/// `YYYY-YYYY` with consecutive years in 2000..2100.
pub fn is_valid_season(season: &str) -> bool {
    let Some((a, b)) = season.split_once('-') else {
        return false;
    };
    if a.len() != 4 || b.len() != 4 {
        return false;
    }
    match (a.parse::<i32>(), b.parse::<i32>()) {
        (Ok(a), Ok(b)) => b == a + 1 && a >= 2000 && b < 2100,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_season_turns_over_in_july() {
        assert_eq!(season_of(date(2025, 6, 30)), "2024-2025");
        assert_eq!(season_of(date(2025, 7, 1)), "2025-2026");
        assert_eq!(season_of(date(2026, 1, 15)), "2025-2026");
    }

    #[test]
    fn test_season_format() {
        assert!(is_valid_season("2024-2025"));
        assert!(!is_valid_season("2024-2026"));
        assert!(!is_valid_season("1999-2000"));
        assert!(!is_valid_season("2024/2025"));
        assert!(!is_valid_season("+024-2025"));
    }

    #[test]
    fn test_new_team_validation() {
        let team = NewTeam::new("c1", "  U13 A ", date(2025, 9, 1));
        assert_eq!(team.name, "U13 A");
        assert_eq!(team.season, "2025-2026");
        assert!(team.validate().is_ok());

        assert!(NewTeam::new("c1", " ", date(2025, 9, 1)).validate().is_err());

        let bad_season = NewTeam {
            season: "2025".to_string(),
            ..team
        };
        assert!(bad_season.validate().is_err());
    }

    #[test]
    fn test_insert_payload_omits_unset_fields() {
        let team = NewTeam::new("c1", "Seniors", date(2025, 9, 1));
        let json = serde_json::to_value(&team).unwrap();
        assert_eq!(json["season"], "2025-2026");
        assert!(json.get("sport").is_none());
        assert!(json.get("created_by").is_none());
    }
}
