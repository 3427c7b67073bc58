use rusqlite::Connection;

use crate::lcdb::DBResult;

pub const TRACKED_ACCOUNTS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS TrackedAccounts (
        member_id      INTEGER     NOT NULL,
        guild_id       INTEGER     NOT NULL,

        username       TEXT        NOT NULL,
        last_seen      INTEGER     NOT NULL    DEFAULT 0,

        total_solved   INTEGER     NOT NULL    DEFAULT 0,
        streak         INTEGER     NOT NULL    DEFAULT 0,

        PRIMARY KEY (member_id, guild_id)
    )";

pub const GUILD_SETTINGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS GuildSettings (
        guild_id       INTEGER     PRIMARY KEY,
        channel_id     INTEGER
    )";

pub const ANNOUNCED_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Announced (
        member_id      INTEGER     NOT NULL,
        guild_id       INTEGER     NOT NULL,
        problem_slug   TEXT        NOT NULL,

        problem_title  TEXT        NOT NULL,
        difficulty     TEXT        NOT NULL,
        solved_at      INTEGER     NOT NULL,

        UNIQUE (member_id, guild_id, problem_slug)
    )";

pub const ANNOUNCED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_announced_guild_solved_at
        ON Announced (guild_id, solved_at)";

/// Creates every table the bot needs, leaving existing ones untouched.
pub fn initialize_db(connection: &Connection) -> DBResult<()> {
    log::debug!("[initialize_db] creating TrackedAccounts table...");
    connection.execute(TRACKED_ACCOUNTS_SCHEMA, [])?;

    log::debug!("[initialize_db] creating GuildSettings table...");
    connection.execute(GUILD_SETTINGS_SCHEMA, [])?;

    log::debug!("[initialize_db] creating Announced table...");
    connection.execute(ANNOUNCED_SCHEMA, [])?;
    connection.execute(ANNOUNCED_INDEX, [])?;

    Ok(())
}
