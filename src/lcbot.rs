use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, Http, Timestamp};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;

use anyhow::{Context, Result};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::lcapi::{ActivitySource, LeetCodeClient};
use crate::lcdb::{LeekDb, TrackingStore};
use crate::monitor::ActivityMonitor;
use crate::notify::{Announcement, NotificationSink};
use crate::scheduler::ReportScheduler;

pub mod commands;

use commands::Commands;

pub async fn run_leekbot(config: Config) -> Result<()> {
    let store: Arc<dyn TrackingStore> = Arc::new(
        LeekDb::open(&config.db_path)
            .with_context(|| format!("Couldn't open database at {}", config.db_path))?,
    );
    let source: Arc<dyn ActivitySource> = Arc::new(LeetCodeClient::new(config.http_timeout)?);

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let token = config.discord_token.clone();
    let handler = LeekHandler { store, source, config, started: AtomicBool::new(false) };

    let mut client =
        Client::builder(&token, intents).event_handler(handler).await
            .context("Error creating client.")?;

    client.start().await?;

    Ok(())
}

/// Posts announcements as Discord embeds.
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn build_embed(announcement: &Announcement) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&announcement.title)
        .description(&announcement.description);

    if let Some(url) = &announcement.url {
        embed = embed.url(url);
    }
    if let Some(colour) = announcement.colour {
        embed = embed.colour(colour);
    }
    if let Some(thumbnail) = &announcement.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(footer) = &announcement.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(timestamp) = announcement.timestamp.and_then(|ts| Timestamp::from_unix_timestamp(ts).ok()) {
        embed = embed.timestamp(timestamp);
    }

    embed
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn post(&self, channel_id: u64, announcement: &Announcement) -> Result<()> {
        ChannelId::new(channel_id)
            .send_message(self.http.as_ref(), CreateMessage::new().embed(build_embed(announcement)))
            .await
            .with_context(|| format!("Couldn't send announcement to channel {channel_id}"))?;

        Ok(())
    }
}

struct LeekHandler {
    store: Arc<dyn TrackingStore>,
    source: Arc<dyn ActivitySource>,
    config: Config,

    /// `ready` fires again on every reconnect; the background tasks start only once.
    started: AtomicBool,
}

#[async_trait]
impl EventHandler for LeekHandler {
    async fn ready(&self, ctx: serenity::client::Context, _ready: Ready) {
        if self.started.swap(true, Ordering::SeqCst) {
            log::info!("Bot has reconnected.");
            return;
        }
        log::info!("Bot is connected and ready!");

        let sink: Arc<dyn NotificationSink> = Arc::new(DiscordSink::new(ctx.http.clone()));

        let monitor = Arc::new(ActivityMonitor::new(
            self.source.clone(),
            self.store.clone(),
            sink.clone(),
            self.config.monitor.clone(),
        ));
        tokio::spawn(monitor.run());

        let scheduler = ReportScheduler::new(
            self.source.clone(),
            self.store.clone(),
            sink,
            self.config.scheduler.clone(),
        );
        tokio::spawn(scheduler.run());
    }

    async fn message(&self, ctx: serenity::client::Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let channel = msg.channel_id;
        let content = msg.content.clone();

        // Commands
        if content.starts_with(self.config.call_token) && content.len() > 1 {
            let commands = Commands {
                store: self.store.as_ref(),
                source: self.source.as_ref(),
                call_token: self.config.call_token,
            };

            let response = match commands.run_command(&ctx, &msg).await {
                Ok(message) => { message }
                Err(err) => { format!("Error: {}", err) }
            };

            // Discord doesn't like sending empty messages.
            // If everything is ok and the bot doesn't have anything to say, return early.
            if response.is_empty() { return; }

            // If the response can't be sent, try to at least say something went wrong.
            if let Err(why) = channel.say(&ctx.http, response).await {
                let _ = channel.say(&ctx.http, "Oops, internal error.").await;
                log::error!("Error sending message: {why:?}");
            }
        }
    }
}
