use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode};

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{self, Difficulty};

pub mod accounts;
pub mod announced;
pub mod guilds;
pub mod schema;

pub type DBResult<T> = rusqlite::Result<T>;

/// Turns a uniqueness violation into `Ok(false)` ("already there"), passing any
/// other error through. Used by every insert-if-absent query.
pub(crate) fn swallow_constraint_violation(err: rusqlite::Error) -> DBResult<bool> {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Ok(false),
        _ => Err(err),
    }
}

impl ToSql for Difficulty {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Difficulty {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(|label| label.parse::<Difficulty>().unwrap_or_default())
    }
}

/// Durable state shared by the activity monitor, the report scheduler and the
/// command layer.
///
/// Every operation is a single statement, so SQLite's own atomicity is the only
/// locking discipline needed between callers.
pub trait TrackingStore: Send + Sync {
    /// Sets (or clears, with `None`) the announcement channel of a guild.
    fn set_destination(&self, guild_id: u64, channel_id: Option<u64>) -> DBResult<()>;
    fn query_destination(&self, guild_id: u64) -> DBResult<Option<u64>>;
    /// All guilds that currently have an announcement channel.
    fn query_destinations(&self) -> DBResult<Vec<models::GuildDestination>>;

    fn query_tracked_accounts(&self) -> DBResult<Vec<models::TrackedAccount>>;
    fn query_guild_accounts(&self, guild_id: u64) -> DBResult<Vec<models::TrackedAccount>>;

    /// Links (or re-links) `member_id` in `guild_id` to `username`. The watermark
    /// is reset so the next poll is a baseline pass.
    fn link_account(
        &self,
        member_id: u64,
        guild_id: u64,
        username: &str,
        profile: Option<&models::Profile>,
    ) -> DBResult<()>;
    /// Returns `true` if a link was removed.
    fn unlink_account(&self, member_id: u64, guild_id: u64) -> DBResult<bool>;

    fn update_watermark(&self, account: &models::TrackedAccount, last_seen: i64) -> DBResult<()>;
    fn update_cached_stats(
        &self,
        account: &models::TrackedAccount,
        total_solved: u64,
        streak: u64,
    ) -> DBResult<()>;

    /// Records the event unless the same (member, guild, problem) is already in
    /// the ledger. Returns `true` if it was newly added, false otherwise.
    fn insert_announced(&self, event: &models::AnnouncedEvent) -> DBResult<bool>;
    /// Members of `guild_id` ranked by ledger rows with `start <= solved_at < end`.
    fn query_leaderboard(
        &self,
        guild_id: u64,
        start: i64,
        end: i64,
        limit: usize,
    ) -> DBResult<Vec<models::LeaderboardEntry>>;
    fn count_announced_since(&self, member_id: u64, guild_id: u64, since: i64) -> DBResult<u64>;
    /// Every ledger entry of a member in a guild, oldest first.
    fn query_member_history(&self, member_id: u64, guild_id: u64) -> DBResult<Vec<models::AnnouncedEvent>>;
}

/// SQLite-backed [`TrackingStore`].
pub struct LeekDb {
    connection: Mutex<Connection>,
}

impl LeekDb {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DBResult<Self> {
        Self::initialize(Connection::open(path)?)
    }

    /// A private, throwaway database. Handy for tests.
    pub fn open_in_memory() -> DBResult<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(connection: Connection) -> DBResult<Self> {
        schema::initialize_db(&connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    fn connect(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-written in SQLite, so the
        // connection is still usable.
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TrackingStore for LeekDb {
    fn set_destination(&self, guild_id: u64, channel_id: Option<u64>) -> DBResult<()> {
        guilds::set_destination(&self.connect(), guild_id, channel_id)
    }

    fn query_destination(&self, guild_id: u64) -> DBResult<Option<u64>> {
        guilds::query_destination(&self.connect(), guild_id)
    }

    fn query_destinations(&self) -> DBResult<Vec<models::GuildDestination>> {
        guilds::query_destinations(&self.connect())
    }

    fn query_tracked_accounts(&self) -> DBResult<Vec<models::TrackedAccount>> {
        accounts::query_tracked_accounts(&self.connect())
    }

    fn query_guild_accounts(&self, guild_id: u64) -> DBResult<Vec<models::TrackedAccount>> {
        accounts::query_guild_accounts(&self.connect(), guild_id)
    }

    fn link_account(
        &self,
        member_id: u64,
        guild_id: u64,
        username: &str,
        profile: Option<&models::Profile>,
    ) -> DBResult<()> {
        accounts::link_account(&self.connect(), member_id, guild_id, username, profile)
    }

    fn unlink_account(&self, member_id: u64, guild_id: u64) -> DBResult<bool> {
        accounts::unlink_account(&self.connect(), member_id, guild_id)
    }

    fn update_watermark(&self, account: &models::TrackedAccount, last_seen: i64) -> DBResult<()> {
        accounts::update_watermark(&self.connect(), account, last_seen)
    }

    fn update_cached_stats(
        &self,
        account: &models::TrackedAccount,
        total_solved: u64,
        streak: u64,
    ) -> DBResult<()> {
        accounts::update_cached_stats(&self.connect(), account, total_solved, streak)
    }

    fn insert_announced(&self, event: &models::AnnouncedEvent) -> DBResult<bool> {
        announced::insert_announced(&self.connect(), event)
    }

    fn query_leaderboard(
        &self,
        guild_id: u64,
        start: i64,
        end: i64,
        limit: usize,
    ) -> DBResult<Vec<models::LeaderboardEntry>> {
        announced::query_leaderboard(&self.connect(), guild_id, start, end, limit)
    }

    fn count_announced_since(&self, member_id: u64, guild_id: u64, since: i64) -> DBResult<u64> {
        announced::count_announced_since(&self.connect(), member_id, guild_id, since)
    }

    fn query_member_history(&self, member_id: u64, guild_id: u64) -> DBResult<Vec<models::AnnouncedEvent>> {
        announced::query_member_history(&self.connect(), member_id, guild_id)
    }
}
