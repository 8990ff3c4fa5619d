//! Fetch-then-cache orchestration.
//!
//! Every read goes to the backend first. A successful fetch is written
//! through to the local cache; a failed fetch is answered from the cache
//! instead. Cache failures never reach the caller here: writes are logged
//! and dropped, reads degrade to empty results.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::auth::AuthEvent;
use crate::cache::{cached, describe_age, Cached, CacheStore};
use crate::error::CacheResult;
use crate::models::{Club, Membership, NewTeam, ProfileUpdate, Team, UserProfile};
use crate::remote::RemoteSource;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    /// The backend was unreachable; data may be stale or empty.
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub data: T,
    pub origin: Origin,
    /// Oldest local write among the rows, for cache results.
    pub synced_at: Option<DateTime<Utc>>,
}

impl<T> Loaded<T> {
    fn remote(data: T) -> Self {
        Self {
            data,
            origin: Origin::Remote,
            synced_at: None,
        }
    }

    fn cache(data: T, synced_at: Option<DateTime<Utc>>) -> Self {
        Self {
            data,
            origin: Origin::Cache,
            synced_at,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.origin == Origin::Cache
    }

    /// Offline data old enough that it may no longer match the backend.
    pub fn is_stale(&self) -> bool {
        self.synced_at.map(cached::is_stale).unwrap_or(false)
    }

    pub fn age_display(&self) -> Option<String> {
        self.synced_at.map(|t| describe_age(cached::age_of(t)))
    }
}

fn log_cache_write(what: &str, result: CacheResult<usize>) {
    match result {
        Ok(count) => debug!(what = what, count = count, "Wrote through to cache"),
        Err(e) => warn!(what = what, error = %e, "Failed to cache data"),
    }
}

/// Cache fallback result. A read failure degrades to an empty list.
fn from_cache<T>(what: &str, result: CacheResult<Vec<Cached<T>>>) -> Loaded<Vec<T>> {
    match result {
        Ok(rows) => {
            let synced_at = rows.iter().map(|r| r.synced_at).min();
            Loaded::cache(rows.into_iter().map(Cached::into_inner).collect(), synced_at)
        }
        Err(e) => {
            warn!(what = what, error = %e, "Failed to read cache, showing empty list");
            Loaded::cache(Vec::new(), None)
        }
    }
}

/// Remote reads with write-through caching and offline fallback.
pub struct OfflineRepository<R> {
    remote: R,
    cache: CacheStore,
}

impl<R: RemoteSource> OfflineRepository<R> {
    pub fn new(remote: R, cache: CacheStore) -> Self {
        Self { remote, cache }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn clubs(&self) -> Loaded<Vec<Club>> {
        match self.remote.fetch_clubs().await {
            Ok(clubs) => {
                log_cache_write("clubs", self.cache.upsert_clubs(&clubs).await);
                Loaded::remote(clubs)
            }
            Err(e) => {
                warn!(error = %e, "Error fetching clubs, using cache");
                from_cache("clubs", self.cache.get_clubs().await)
            }
        }
    }

    /// Clubs created by `user_id`, for picking the club a new team goes in.
    pub async fn clubs_created_by(&self, user_id: &str) -> Loaded<Vec<Club>> {
        match self.remote.fetch_clubs().await {
            Ok(clubs) => {
                let mine: Vec<Club> =
                    clubs.into_iter().filter(|c| c.is_owned_by(user_id)).collect();
                log_cache_write("clubs", self.cache.upsert_clubs(&mine).await);
                Loaded::remote(mine)
            }
            Err(e) => {
                warn!(error = %e, "Error fetching clubs, using cache");
                from_cache("clubs", self.cache.get_clubs_created_by(user_id).await)
            }
        }
    }

    pub async fn teams_for_club(&self, club_id: &str) -> Loaded<Vec<Team>> {
        match self.remote.fetch_teams(club_id).await {
            Ok(teams) => {
                log_cache_write("teams", self.cache.upsert_teams(&teams).await);
                Loaded::remote(teams)
            }
            Err(e) => {
                warn!(club_id = club_id, error = %e, "Error fetching teams, using cache");
                from_cache("teams", self.cache.get_teams_for_club(club_id).await)
            }
        }
    }

    pub async fn memberships_for_user(&self, user_id: &str) -> Loaded<Vec<Membership>> {
        match self.remote.fetch_memberships(user_id).await {
            Ok(memberships) => {
                log_cache_write("memberships", self.cache.upsert_memberships(&memberships).await);
                Loaded::remote(memberships)
            }
            Err(e) => {
                warn!(error = %e, "Error fetching memberships, using cache");
                from_cache("memberships", self.cache.get_memberships_for_user(user_id).await)
            }
        }
    }

    pub async fn user_profile(&self, user_id: &str) -> Loaded<Option<UserProfile>> {
        match self.remote.fetch_user_profile(user_id).await {
            Ok(Some(profile)) => {
                self.cache_profile(&profile).await;
                Loaded::remote(Some(profile))
            }
            Ok(None) => Loaded::remote(None),
            Err(e) => {
                warn!(error = %e, "Error fetching user profile, using cache");
                match self.cache.get_user_profile(user_id).await {
                    Ok(Some(row)) => Loaded::cache(Some(row.data), Some(row.synced_at)),
                    Ok(None) => Loaded::cache(None, None),
                    Err(e) => {
                        warn!(error = %e, "Failed to read cached user profile");
                        Loaded::cache(None, None)
                    }
                }
            }
        }
    }

    /// Update the profile remotely, then cache the row the backend returns.
    /// Remote failures propagate; there is no offline write path.
    pub async fn update_user_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> anyhow::Result<UserProfile> {
        let profile = self.remote.update_user_profile(user_id, update).await?;
        self.cache_profile(&profile).await;
        Ok(profile)
    }

    async fn cache_profile(&self, profile: &UserProfile) {
        let written = self.cache.upsert_user_profile(profile).await.map(|()| 1);
        log_cache_write("user profile", written);
    }

    /// Create a club owned by `created_by` and cache the stored row.
    pub async fn create_club(&self, name: &str, created_by: &str) -> anyhow::Result<Club> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("club name is required");
        }
        let club = self.remote.create_club(name, created_by).await?;
        info!(club_id = %club.id, "Club created");
        log_cache_write("clubs", self.cache.upsert_clubs(std::slice::from_ref(&club)).await);
        Ok(club)
    }

    /// Create a team and cache the stored row. Team names are unique per
    /// club and season, ignoring case.
    pub async fn create_team(&self, team: &NewTeam) -> anyhow::Result<Team> {
        team.validate().map_err(anyhow::Error::msg)?;
        if self
            .remote
            .team_name_taken(&team.club_id, &team.season, &team.name)
            .await?
        {
            anyhow::bail!(
                "a team named '{}' already exists in this club for {}",
                team.name,
                team.season
            );
        }
        let created = self.remote.create_team(team).await?;
        info!(team_id = %created.id, club_id = %created.club_id, "Team created");
        log_cache_write("teams", self.cache.upsert_teams(std::slice::from_ref(&created)).await);
        Ok(created)
    }

    /// React to an authentication change.
    pub async fn apply_auth_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::SignedOut => {
                if let Err(e) = self.cache.clear_all().await {
                    warn!(error = %e, "Failed to clear cache on sign-out");
                }
            }
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                let profile = self.user_profile(&session.user_id).await;
                debug!(
                    found = profile.data.is_some(),
                    offline = profile.is_offline(),
                    "Prefetched user profile"
                );
            }
            AuthEvent::UserUpdated(profile) => self.cache_profile(profile).await,
        }
    }

    /// Apply auth events until the stream closes.
    pub async fn watch_auth(&self, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.apply_auth_event(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Auth event stream lagged");
                }
                Err(RecvError::Closed) => {
                    info!("Auth event stream closed");
                    break;
                }
            }
        }
    }
}
