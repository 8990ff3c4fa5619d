pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cached_clubs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    synced_at TEXT NOT NULL
);

-- club_id is not a foreign key: the cache may hold teams of clubs it never saw
CREATE TABLE IF NOT EXISTS cached_teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    club_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    synced_at TEXT NOT NULL
);

-- Exactly one of club_id/team_id is expected, not enforced locally
CREATE TABLE IF NOT EXISTS cached_memberships (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    club_id TEXT,
    team_id TEXT,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cached_users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    name TEXT,
    phone_number TEXT,
    created_at TEXT NOT NULL,
    synced_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clubs_created_by ON cached_clubs(created_by);
CREATE INDEX IF NOT EXISTS idx_teams_club_id ON cached_teams(club_id);
CREATE INDEX IF NOT EXISTS idx_memberships_user_id ON cached_memberships(user_id);
"#;

pub const CLEAR_ALL: &str = r#"
DELETE FROM cached_clubs;
DELETE FROM cached_teams;
DELETE FROM cached_memberships;
DELETE FROM cached_users;
"#;
