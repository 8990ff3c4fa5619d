use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, OptionalExtension, Row, Statement};
use tracing::{debug, info};

use super::cached::Cached;
use super::coordinator::CacheCoordinator;
use super::db::CacheDb;
use super::schema::CLEAR_ALL;
use crate::error::CacheResult;
use crate::models::{Club, Membership, Role, Team, UserProfile};

// ============================================================================
// SQL
// ============================================================================

const UPSERT_CLUB: &str = "INSERT OR REPLACE INTO cached_clubs
     (id, name, created_by, created_at, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5)";
const UPSERT_TEAM: &str = "INSERT OR REPLACE INTO cached_teams
     (id, name, club_id, created_at, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5)";
const UPSERT_MEMBERSHIP: &str = "INSERT OR REPLACE INTO cached_memberships
     (id, user_id, club_id, team_id, role, created_at, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const UPSERT_USER: &str = "INSERT OR REPLACE INTO cached_users
     (id, email, name, phone_number, created_at, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const CLUB_COLUMNS: &str = "id, name, created_by, created_at, synced_at";
const TEAM_COLUMNS: &str = "id, name, club_id, created_at, synced_at";
const MEMBERSHIP_COLUMNS: &str = "id, user_id, club_id, team_id, role, created_at, synced_at";
const USER_COLUMNS: &str = "id, email, name, phone_number, created_at, synced_at";

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn club_row(row: &Row<'_>) -> rusqlite::Result<Cached<Club>> {
    Ok(Cached::new(
        Club {
            id: row.get(0)?,
            name: row.get(1)?,
            created_by: row.get(2)?,
            created_at: row.get(3)?,
        },
        row.get(4)?,
    ))
}

fn team_row(row: &Row<'_>) -> rusqlite::Result<Cached<Team>> {
    Ok(Cached::new(
        Team {
            id: row.get(0)?,
            name: row.get(1)?,
            club_id: row.get(2)?,
            created_at: row.get(3)?,
        },
        row.get(4)?,
    ))
}

fn membership_row(row: &Row<'_>) -> rusqlite::Result<Cached<Membership>> {
    Ok(Cached::new(
        Membership {
            id: row.get(0)?,
            user_id: row.get(1)?,
            club_id: row.get(2)?,
            team_id: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
        },
        row.get(6)?,
    ))
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<Cached<UserProfile>> {
    Ok(Cached::new(
        UserProfile {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            phone_number: row.get(3)?,
            created_at: row.get(4)?,
        },
        row.get(5)?,
    ))
}

type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

// ============================================================================
// Cache Store
// ============================================================================

/// Row counts per cache table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub clubs: usize,
    pub teams: usize,
    pub memberships: usize,
    pub users: usize,
}

impl CacheCounts {
    pub fn is_empty(&self) -> bool {
        self.clubs + self.teams + self.memberships + self.users == 0
    }
}

/// Overwrite-only local mirror of backend rows.
///
/// Every operation requires the coordinator to be ready and fails with
/// `CacheError::NotInitialized` otherwise. Storage errors are returned
/// as-is; retry and fallback policy belong to the caller.
#[derive(Clone)]
pub struct CacheStore {
    coordinator: Arc<CacheCoordinator>,
}

impl CacheStore {
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }

    fn db(&self) -> CacheResult<CacheDb> {
        self.coordinator.handle()
    }

    /// Insert-or-replace every row in one transaction, stamping all of
    /// them with the same `synced_at`.
    async fn upsert<T, B>(&self, sql: &'static str, rows: &[T], bind: B) -> CacheResult<usize>
    where
        T: Clone + Send + 'static,
        B: Fn(&mut Statement<'_>, &T, &DateTime<Utc>) -> rusqlite::Result<usize> + Send + 'static,
    {
        let db = self.db()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let rows = rows.to_vec();
        let written = db
            .call(move |conn| {
                let synced_at = Utc::now();
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(sql)?;
                    for row in &rows {
                        bind(&mut stmt, row, &synced_at)?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(written)
    }

    async fn query<T>(
        &self,
        sql: String,
        args: Vec<String>,
        map: RowMapper<T>,
    ) -> CacheResult<Vec<T>>
    where
        T: Send + 'static,
    {
        let rows = self
            .db()?
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(args.iter()), map)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(rows)
    }

    async fn query_one<T>(
        &self,
        sql: String,
        key: String,
        map: RowMapper<T>,
    ) -> CacheResult<Option<T>>
    where
        T: Send + 'static,
    {
        let row = self
            .db()?
            .call(move |conn| Ok(conn.query_row(&sql, params![key], map).optional()?))
            .await?;
        Ok(row)
    }

    // ===== Clubs =====

    pub async fn upsert_clubs(&self, clubs: &[Club]) -> CacheResult<usize> {
        let written = self
            .upsert(UPSERT_CLUB, clubs, |stmt, club, synced_at| {
                stmt.execute(params![
                    club.id,
                    club.name,
                    club.created_by,
                    club.created_at,
                    synced_at,
                ])
            })
            .await?;
        debug!(count = written, "Cached clubs");
        Ok(written)
    }

    /// All cached clubs, newest first.
    pub async fn get_clubs(&self) -> CacheResult<Vec<Cached<Club>>> {
        self.query(
            format!("SELECT {CLUB_COLUMNS} FROM cached_clubs ORDER BY created_at DESC"),
            Vec::new(),
            club_row,
        )
        .await
    }

    pub async fn get_club(&self, id: &str) -> CacheResult<Option<Cached<Club>>> {
        self.query_one(
            format!("SELECT {CLUB_COLUMNS} FROM cached_clubs WHERE id = ?1"),
            id.to_string(),
            club_row,
        )
        .await
    }

    pub async fn get_clubs_created_by(&self, user_id: &str) -> CacheResult<Vec<Cached<Club>>> {
        self.query(
            format!(
                "SELECT {CLUB_COLUMNS} FROM cached_clubs
                 WHERE created_by = ?1 ORDER BY created_at DESC"
            ),
            vec![user_id.to_string()],
            club_row,
        )
        .await
    }

    // ===== Teams =====

    pub async fn upsert_teams(&self, teams: &[Team]) -> CacheResult<usize> {
        let written = self
            .upsert(UPSERT_TEAM, teams, |stmt, team, synced_at| {
                stmt.execute(params![team.id, team.name, team.club_id, team.created_at, synced_at])
            })
            .await?;
        debug!(count = written, "Cached teams");
        Ok(written)
    }

    pub async fn get_teams(&self) -> CacheResult<Vec<Cached<Team>>> {
        self.query(
            format!("SELECT {TEAM_COLUMNS} FROM cached_teams ORDER BY created_at DESC"),
            Vec::new(),
            team_row,
        )
        .await
    }

    pub async fn get_teams_for_club(&self, club_id: &str) -> CacheResult<Vec<Cached<Team>>> {
        self.query(
            format!(
                "SELECT {TEAM_COLUMNS} FROM cached_teams
                 WHERE club_id = ?1 ORDER BY created_at DESC"
            ),
            vec![club_id.to_string()],
            team_row,
        )
        .await
    }

    // ===== Memberships =====

    pub async fn upsert_memberships(&self, memberships: &[Membership]) -> CacheResult<usize> {
        let written = self
            .upsert(UPSERT_MEMBERSHIP, memberships, |stmt, m, synced_at| {
                stmt.execute(params![
                    m.id,
                    m.user_id,
                    m.club_id,
                    m.team_id,
                    m.role,
                    m.created_at,
                    synced_at,
                ])
            })
            .await?;
        debug!(count = written, "Cached memberships");
        Ok(written)
    }

    pub async fn get_memberships(&self) -> CacheResult<Vec<Cached<Membership>>> {
        self.query(
            format!("SELECT {MEMBERSHIP_COLUMNS} FROM cached_memberships ORDER BY created_at DESC"),
            Vec::new(),
            membership_row,
        )
        .await
    }

    pub async fn get_memberships_for_user(
        &self,
        user_id: &str,
    ) -> CacheResult<Vec<Cached<Membership>>> {
        self.query(
            format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM cached_memberships
                 WHERE user_id = ?1 ORDER BY created_at DESC"
            ),
            vec![user_id.to_string()],
            membership_row,
        )
        .await
    }

    // ===== User Profile =====

    pub async fn upsert_user_profiles(&self, profiles: &[UserProfile]) -> CacheResult<usize> {
        let written = self
            .upsert(UPSERT_USER, profiles, |stmt, u, synced_at| {
                stmt.execute(params![
                    u.id,
                    u.email,
                    u.name,
                    u.phone_number,
                    u.created_at,
                    synced_at,
                ])
            })
            .await?;
        debug!(count = written, "Cached user profiles");
        Ok(written)
    }

    pub async fn upsert_user_profile(&self, profile: &UserProfile) -> CacheResult<()> {
        self.upsert_user_profiles(std::slice::from_ref(profile)).await?;
        Ok(())
    }

    pub async fn get_user_profile(&self, id: &str) -> CacheResult<Option<Cached<UserProfile>>> {
        self.query_one(
            format!("SELECT {USER_COLUMNS} FROM cached_users WHERE id = ?1"),
            id.to_string(),
            user_row,
        )
        .await
    }

    // ===== Whole cache =====

    /// Delete every row from every cache table. Not scoped to a user.
    pub async fn clear_all(&self) -> CacheResult<()> {
        self.db()?
            .call(|conn| Ok(conn.execute_batch(CLEAR_ALL)?))
            .await?;
        info!("Local cache cleared");
        Ok(())
    }

    pub async fn counts(&self) -> CacheResult<CacheCounts> {
        let counts = self
            .db()?
            .call(|conn| {
                let count = |table: &str| -> rusqlite::Result<usize> {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get::<_, i64>(0)
                    })
                    .map(|n| n as usize)
                };
                Ok(CacheCounts {
                    clubs: count("cached_clubs")?,
                    teams: count("cached_teams")?,
                    memberships: count("cached_memberships")?,
                    users: count("cached_users")?,
                })
            })
            .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::MemoryOpener;
    use crate::error::CacheError;

    async fn ready_store() -> CacheStore {
        let coordinator = Arc::new(CacheCoordinator::new(MemoryOpener));
        coordinator.initialize().await.unwrap();
        CacheStore::new(coordinator)
    }

    fn club(id: &str, name: &str, created_at: &str) -> Club {
        Club {
            id: id.to_string(),
            name: name.to_string(),
            created_by: "u1".to_string(),
            created_at: created_at.to_string(),
        }
    }

    fn team(id: &str, club_id: &str, created_at: &str) -> Team {
        Team {
            id: id.to_string(),
            name: format!("Team {id}"),
            club_id: club_id.to_string(),
            created_at: created_at.to_string(),
        }
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: Some("Ana".to_string()),
            phone_number: None,
            created_at: "2024-01-01".to_string(),
        }
    }

    fn club_ids(rows: &[Cached<Club>]) -> Vec<&str> {
        rows.iter().map(|r| r.data.id.as_str()).collect()
    }

    fn team_ids(rows: &[Cached<Team>]) -> Vec<&str> {
        rows.iter().map(|r| r.data.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let store = CacheStore::new(Arc::new(CacheCoordinator::new(MemoryOpener)));

        assert!(matches!(store.get_clubs().await, Err(CacheError::NotInitialized)));
        assert!(matches!(
            store.upsert_clubs(&[club("c1", "Reds", "2024-01-01")]).await,
            Err(CacheError::NotInitialized)
        ));
        assert!(matches!(store.clear_all().await, Err(CacheError::NotInitialized)));
        assert!(matches!(store.get_user_profile("u1").await, Err(CacheError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_clubs_then_clear() {
        let store = ready_store().await;

        store
            .upsert_clubs(&[
                club("c1", "Reds", "2024-01-01"),
                club("c2", "Blues", "2024-02-01"),
            ])
            .await
            .unwrap();

        let clubs = store.get_clubs().await.unwrap();
        assert_eq!(club_ids(&clubs), vec!["c2", "c1"]);

        store.clear_all().await.unwrap();
        assert!(store.get_clubs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clubs_created_by_filters_by_owner() {
        let store = ready_store().await;
        let theirs = Club {
            created_by: "u2".to_string(),
            ..club("c3", "Greens", "2024-03-01")
        };

        store
            .upsert_clubs(&[
                club("c1", "Reds", "2024-01-01"),
                theirs,
                club("c2", "Blues", "2024-02-01"),
            ])
            .await
            .unwrap();

        let mine = store.get_clubs_created_by("u1").await.unwrap();
        assert_eq!(club_ids(&mine), vec!["c2", "c1"]);
        assert!(mine.iter().all(|c| c.data.is_owned_by("u1")));

        let other = store.get_clubs_created_by("u2").await.unwrap();
        assert_eq!(club_ids(&other), vec!["c3"]);
        assert!(store.get_clubs_created_by("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clubs_ordered_newest_first_regardless_of_insert_order() {
        let store = ready_store().await;

        store.upsert_clubs(&[club("t2", "B", "2024-02-01T00:00:00Z")]).await.unwrap();
        store
            .upsert_clubs(&[
                club("t3", "C", "2024-03-01T00:00:00Z"),
                club("t1", "A", "2024-01-01T00:00:00Z"),
            ])
            .await
            .unwrap();

        let clubs = store.get_clubs().await.unwrap();
        assert_eq!(club_ids(&clubs), vec!["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_row() {
        let store = ready_store().await;

        store.upsert_clubs(&[club("a", "Old name", "2024-01-01")]).await.unwrap();
        let first = store.get_club("a").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut v2 = club("a", "New name", "2024-05-01");
        v2.created_by = "u2".to_string();
        store.upsert_clubs(&[v2.clone()]).await.unwrap();

        let clubs = store.get_clubs().await.unwrap();
        assert_eq!(clubs.len(), 1);
        assert_eq!(clubs[0].data, v2);
        assert!(clubs[0].synced_at > first.synced_at);
    }

    #[tokio::test]
    async fn test_upsert_empty_batch_is_noop() {
        let store = ready_store().await;
        assert_eq!(store.upsert_teams(&[]).await.unwrap(), 0);
        assert!(store.counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_teams_filtered_by_club_without_parent_row() {
        let store = ready_store().await;

        // Club "c9" is never cached; no referential checks locally
        store
            .upsert_teams(&[
                team("t1", "c9", "2024-01-01"),
                team("t2", "c9", "2024-03-01"),
                team("t3", "c1", "2024-02-01"),
            ])
            .await
            .unwrap();

        let teams = store.get_teams_for_club("c9").await.unwrap();
        assert_eq!(team_ids(&teams), vec!["t2", "t1"]);
        assert_eq!(store.get_teams().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_memberships_keep_role_and_target() {
        let store = ready_store().await;

        let admin = Membership {
            id: "m1".to_string(),
            user_id: "u1".to_string(),
            club_id: Some("c1".to_string()),
            team_id: None,
            role: Role::Admin,
            created_at: "2024-01-01".to_string(),
        };
        let member = Membership {
            id: "m2".to_string(),
            user_id: "u1".to_string(),
            club_id: None,
            team_id: Some("t1".to_string()),
            role: Role::Member,
            created_at: "2024-02-01".to_string(),
        };
        let other = Membership {
            id: "m3".to_string(),
            user_id: "u2".to_string(),
            ..admin.clone()
        };

        store
            .upsert_memberships(&[admin.clone(), member.clone(), other])
            .await
            .unwrap();

        let mine: Vec<Membership> = store
            .get_memberships_for_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(Cached::into_inner)
            .collect();
        assert_eq!(mine, vec![member, admin]);
    }

    #[tokio::test]
    async fn test_unknown_stored_role_is_storage_error() {
        let store = ready_store().await;
        store
            .coordinator()
            .handle()
            .unwrap()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO cached_memberships (id, user_id, role, created_at, synced_at)
                     VALUES ('m1', 'u1', 'owner', '2024-01-01', '2024-01-01 00:00:00')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(store.get_memberships().await, Err(CacheError::Storage(_))));
    }

    #[tokio::test]
    async fn test_user_profile_get_one() {
        let store = ready_store().await;

        assert!(store.get_user_profile("u1").await.unwrap().is_none());

        store.upsert_user_profile(&profile("u1")).await.unwrap();
        let cached = store.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(cached.data, profile("u1"));
        assert!(store.get_user_profile("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_all_empties_every_table() {
        let store = ready_store().await;

        store.upsert_clubs(&[club("c1", "Reds", "2024-01-01")]).await.unwrap();
        store.upsert_teams(&[team("t1", "c1", "2024-01-01")]).await.unwrap();
        store
            .upsert_memberships(&[Membership {
                id: "m1".to_string(),
                user_id: "u1".to_string(),
                club_id: Some("c1".to_string()),
                team_id: None,
                role: Role::Admin,
                created_at: "2024-01-01".to_string(),
            }])
            .await
            .unwrap();
        store.upsert_user_profile(&profile("u1")).await.unwrap();

        assert_eq!(
            store.counts().await.unwrap(),
            CacheCounts {
                clubs: 1,
                teams: 1,
                memberships: 1,
                users: 1
            }
        );

        store.clear_all().await.unwrap();

        assert!(store.get_clubs().await.unwrap().is_empty());
        assert!(store.get_teams().await.unwrap().is_empty());
        assert!(store.get_memberships().await.unwrap().is_empty());
        assert!(store.get_user_profile("u1").await.unwrap().is_none());
        assert!(store.counts().await.unwrap().is_empty());
    }
}
