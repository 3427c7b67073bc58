use rusqlite::Connection;

use crate::{lcdb::DBResult, models};

/////*============== TRACKED ACCOUNT QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::TrackedAccount {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            member_id: row.get("member_id")?,
            guild_id: row.get("guild_id")?,
            username: row.get("username")?,
            last_seen: row.get("last_seen")?,
            total_solved: row.get("total_solved")?,
            streak: row.get("streak")?,
        })
    }
}

/// Gathers every tracked account across all guilds.
pub fn query_tracked_accounts(connection: &Connection) -> DBResult<Vec<models::TrackedAccount>> {
    log::trace!("[query_tracked_accounts] Querying all tracked accounts.");

    connection
        .prepare(
            "SELECT * FROM TrackedAccounts
             ORDER BY username, guild_id, member_id",
        )?
        .query_map([], |row| models::TrackedAccount::try_from(row))?
        .collect()
}

/// Gathers the tracked accounts of a single guild.
pub fn query_guild_accounts(
    connection: &Connection,
    guild_id: u64,
) -> DBResult<Vec<models::TrackedAccount>> {
    log::trace!("[query_guild_accounts] Querying tracked accounts for guild {guild_id}.");

    connection
        .prepare(
            "SELECT * FROM TrackedAccounts
             WHERE guild_id = :guild_id
             ORDER BY username, member_id",
        )?
        .query_map(rusqlite::named_params! { ":guild_id": guild_id }, |row| {
            models::TrackedAccount::try_from(row)
        })?
        .collect()
}

/// Links a member to a LeetCode account, replacing any previous link in that guild.
///
/// The watermark always starts over at 0, so the first poll after (re)linking is a
/// baseline pass and never announces older solves.
pub fn link_account(
    connection: &Connection,
    member_id: u64,
    guild_id: u64,
    username: &str,
    profile: Option<&models::Profile>,
) -> DBResult<()> {
    log::trace!("[link_account] Linking member {member_id} in guild {guild_id} to {username}...");

    let query_params = rusqlite::named_params! {
            ":member_id":    member_id,
            ":guild_id":     guild_id,
            ":username":     username,
            ":total_solved": profile.map_or(0, |p| p.total_solved),
            ":streak":       profile.map_or(0, |p| p.streak),
    };

    connection
        .prepare(
            "INSERT INTO TrackedAccounts ( member_id,  guild_id,  username,  last_seen,
                                           total_solved,  streak)
             VALUES                      (:member_id, :guild_id, :username, 0,
                                          :total_solved, :streak)
             ON CONFLICT (member_id, guild_id) DO UPDATE SET
                username     = excluded.username,
                last_seen    = 0,
                total_solved = excluded.total_solved,
                streak       = excluded.streak",
        )?
        .execute(query_params)
        .inspect_err(|err| log::error!("[link_account] Could not link {username}: {err}"))?;

    log::info!("Member {member_id} in guild {guild_id} is now linked to {username}.");
    Ok(())
}

/// Removes a member's link in a guild. Returns `true` if there was one.
pub fn unlink_account(connection: &Connection, member_id: u64, guild_id: u64) -> DBResult<bool> {
    let removed = connection
        .prepare("DELETE FROM TrackedAccounts WHERE member_id = :member_id AND guild_id = :guild_id")?
        .execute(rusqlite::named_params! { ":member_id": member_id, ":guild_id": guild_id })?;

    if removed > 0 {
        log::info!("Member {member_id} in guild {guild_id} has been unlinked.");
    }

    Ok(removed > 0)
}

pub fn update_watermark(
    connection: &Connection,
    account: &models::TrackedAccount,
    last_seen: i64,
) -> DBResult<()> {
    log::trace!(
        "[update_watermark] {} ({}/{}): {} -> {last_seen}",
        account.username, account.guild_id, account.member_id, account.last_seen
    );

    // MAX() keeps the watermark from ever moving backwards
    connection
        .prepare(
            "UPDATE TrackedAccounts SET last_seen = MAX(last_seen, :last_seen)
             WHERE member_id = :member_id AND guild_id = :guild_id",
        )?
        .execute(rusqlite::named_params! {
            ":member_id": account.member_id,
            ":guild_id":  account.guild_id,
            ":last_seen": last_seen,
        })?;

    Ok(())
}

pub fn update_cached_stats(
    connection: &Connection,
    account: &models::TrackedAccount,
    total_solved: u64,
    streak: u64,
) -> DBResult<()> {
    connection
        .prepare(
            "UPDATE TrackedAccounts SET total_solved = :total_solved, streak = :streak
             WHERE member_id = :member_id AND guild_id = :guild_id",
        )?
        .execute(rusqlite::named_params! {
            ":member_id":    account.member_id,
            ":guild_id":     account.guild_id,
            ":total_solved": total_solved,
            ":streak":       streak,
        })?;

    Ok(())
}
