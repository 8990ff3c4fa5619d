//! Boundary to the remote backend.
//!
//! The backend is the source of truth; everything here returns plain rows
//! per collection. `SupabaseClient` is the production implementation.

use async_trait::async_trait;

use crate::models::{Club, Membership, NewTeam, ProfileUpdate, Team, UserProfile};

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Clubs visible to the current user, newest first.
    async fn fetch_clubs(&self) -> anyhow::Result<Vec<Club>>;

    async fn fetch_teams(&self, club_id: &str) -> anyhow::Result<Vec<Team>>;

    async fn fetch_memberships(&self, user_id: &str) -> anyhow::Result<Vec<Membership>>;

    /// `Ok(None)` when no profile row exists for `user_id`.
    async fn fetch_user_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>>;

    async fn update_user_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> anyhow::Result<UserProfile>;

    /// Insert a club and return the stored row. The backend makes the
    /// creator an admin of it.
    async fn create_club(&self, name: &str, created_by: &str) -> anyhow::Result<Club>;

    /// Whether `club_id` already has a team called `name` (case-insensitive)
    /// in `season`.
    async fn team_name_taken(
        &self,
        club_id: &str,
        season: &str,
        name: &str,
    ) -> anyhow::Result<bool>;

    async fn create_team(&self, team: &NewTeam) -> anyhow::Result<Team>;
}

#[async_trait]
impl<T: RemoteSource + ?Sized> RemoteSource for std::sync::Arc<T> {
    async fn fetch_clubs(&self) -> anyhow::Result<Vec<Club>> {
        (**self).fetch_clubs().await
    }

    async fn fetch_teams(&self, club_id: &str) -> anyhow::Result<Vec<Team>> {
        (**self).fetch_teams(club_id).await
    }

    async fn fetch_memberships(&self, user_id: &str) -> anyhow::Result<Vec<Membership>> {
        (**self).fetch_memberships(user_id).await
    }

    async fn fetch_user_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        (**self).fetch_user_profile(user_id).await
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> anyhow::Result<UserProfile> {
        (**self).update_user_profile(user_id, update).await
    }

    async fn create_club(&self, name: &str, created_by: &str) -> anyhow::Result<Club> {
        (**self).create_club(name, created_by).await
    }

    async fn team_name_taken(
        &self,
        club_id: &str,
        season: &str,
        name: &str,
    ) -> anyhow::Result<bool> {
        (**self).team_name_taken(club_id, season, name).await
    }

    async fn create_team(&self, team: &NewTeam) -> anyhow::Result<Team> {
        (**self).create_team(team).await
    }
}
