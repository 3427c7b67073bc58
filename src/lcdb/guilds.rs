use rusqlite::{Connection, OptionalExtension};

use crate::{lcdb::DBResult, models};

/////*============== GUILD SETTINGS QUERIES ==============*/
pub fn set_destination(connection: &Connection, guild_id: u64, channel_id: Option<u64>) -> DBResult<()> {
    connection
        .prepare(
            "INSERT INTO GuildSettings ( guild_id,  channel_id)
             VALUES                    (:guild_id, :channel_id)
             ON CONFLICT (guild_id) DO UPDATE SET channel_id = excluded.channel_id",
        )?
        .execute(rusqlite::named_params! { ":guild_id": guild_id, ":channel_id": channel_id })?;

    match channel_id {
        Some(channel_id) => log::info!("Guild {guild_id} now announces in channel {channel_id}."),
        None => log::info!("Guild {guild_id} no longer has an announcement channel."),
    }

    Ok(())
}

/// Returns the announcement channel of a guild, if one is configured.
pub fn query_destination(connection: &Connection, guild_id: u64) -> DBResult<Option<u64>> {
    connection
        .prepare("SELECT channel_id FROM GuildSettings WHERE guild_id = :guild_id")?
        .query_row(rusqlite::named_params! { ":guild_id": guild_id }, |row| {
            row.get::<_, Option<u64>>("channel_id")
        })
        .optional()
        .map(Option::flatten)
}

pub fn query_destinations(connection: &Connection) -> DBResult<Vec<models::GuildDestination>> {
    connection
        .prepare(
            "SELECT guild_id, channel_id FROM GuildSettings
             WHERE channel_id IS NOT NULL
             ORDER BY guild_id",
        )?
        .query_map([], |row| {
            Ok(models::GuildDestination {
                guild_id: row.get("guild_id")?,
                channel_id: row.get("channel_id")?,
            })
        })?
        .collect()
}
