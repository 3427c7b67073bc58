use rusqlite::Connection;

use crate::{lcdb::DBResult, models};

/////*============== ANNOUNCEMENT LEDGER QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::AnnouncedEvent {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            member_id: row.get("member_id")?,
            guild_id: row.get("guild_id")?,
            problem_slug: row.get("problem_slug")?,
            problem_title: row.get("problem_title")?,
            difficulty: row.get("difficulty")?,
            solved_at: row.get("solved_at")?,
        })
    }
}

/// Adds the (member, guild, problem) entry into the ledger if it doesn't exist.
/// Returns `true` if it was newly added, false otherwise.
///
/// The UNIQUE constraint does the existence check, so two overlapping callers can
/// never both see `true` for the same entry.
pub fn insert_announced(connection: &Connection, event: &models::AnnouncedEvent) -> DBResult<bool> {
    log::trace!(
        "[insert_announced] Inserting {} for member {} in guild {}...",
        event.problem_slug, event.member_id, event.guild_id
    );

    let query_params = rusqlite::named_params! {
            ":member_id":     event.member_id,
            ":guild_id":      event.guild_id,
            ":problem_slug":  event.problem_slug,
            ":problem_title": event.problem_title,
            ":difficulty":    event.difficulty,
            ":solved_at":     event.solved_at,
    };

    connection
        .prepare(
            "INSERT INTO Announced ( member_id,  guild_id,  problem_slug,  problem_title,
                                     difficulty,  solved_at)
             VALUES                (:member_id, :guild_id, :problem_slug, :problem_title,
                                    :difficulty, :solved_at)",
        )?
        .execute(query_params)
        .map_or_else(crate::lcdb::swallow_constraint_violation, |_| Ok(true))
}

/// Ranks a guild's members by how many ledger entries fall in `[start, end)`.
pub fn query_leaderboard(
    connection: &Connection,
    guild_id: u64,
    start: i64,
    end: i64,
    limit: usize,
) -> DBResult<Vec<models::LeaderboardEntry>> {
    log::trace!("[query_leaderboard] Ranking guild {guild_id} over [{start}, {end})...");

    let query_params = rusqlite::named_params! {
            ":guild_id": guild_id,
            ":start":    start,
            ":end":      end,
            ":limit":    limit,
    };

    connection
        .prepare(
            "SELECT member_id, COUNT(*) AS solved
             FROM Announced
             WHERE guild_id = :guild_id
               AND solved_at >= :start
               AND solved_at < :end
             GROUP BY member_id
             ORDER BY solved DESC, member_id ASC
             LIMIT :limit",
        )?
        .query_map(query_params, |row| {
            Ok(models::LeaderboardEntry {
                member_id: row.get("member_id")?,
                solved: row.get("solved")?,
            })
        })?
        .collect()
}

/// Counts a member's ledger entries in a guild with `solved_at >= since`.
pub fn count_announced_since(
    connection: &Connection,
    member_id: u64,
    guild_id: u64,
    since: i64,
) -> DBResult<u64> {
    connection
        .prepare(
            "SELECT COUNT(*) FROM Announced
             WHERE member_id = :member_id
               AND guild_id = :guild_id
               AND solved_at >= :since",
        )?
        .query_row(
            rusqlite::named_params! { ":member_id": member_id, ":guild_id": guild_id, ":since": since },
            |row| row.get(0),
        )
}

/// Every ledger entry of a member in a guild, oldest first.
pub fn query_member_history(
    connection: &Connection,
    member_id: u64,
    guild_id: u64,
) -> DBResult<Vec<models::AnnouncedEvent>> {
    connection
        .prepare(
            "SELECT * FROM Announced
             WHERE member_id = :member_id AND guild_id = :guild_id
             ORDER BY solved_at ASC",
        )?
        .query_map(
            rusqlite::named_params! { ":member_id": member_id, ":guild_id": guild_id },
            |row| models::AnnouncedEvent::try_from(row),
        )?
        .collect()
}
