//! Data models for squadra entities.
//!
//! These mirror the rows served by the remote backend:
//!
//! - `Club`: a sports club owned by the user who created it
//! - `Team`, `NewTeam`: a team belonging to a club, and its insert payload
//! - `Membership`, `Role`: a user's admin/member link to a club or team
//! - `UserProfile`, `ProfileUpdate`: the signed-in user's profile row

pub mod club;
pub mod membership;
pub mod team;
pub mod user;

pub use club::Club;
pub use membership::{Membership, MembershipTarget, Role};
pub use team::{is_valid_season, season_of, NewTeam, Team};
pub use user::{ProfileUpdate, UserProfile};
