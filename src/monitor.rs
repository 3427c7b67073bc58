//! Polls LeetCode for every tracked account and announces new accepted solves.
//!
//! One cycle makes exactly one submissions request per distinct username, no
//! matter how many members or guilds share it. Each account then moves its
//! own watermark forward, records new solves in the ledger and announces the
//! ones the ledger reports as new.

use anyhow::{Context, Result};
use itertools::Itertools;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, sleep};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::lcapi::ActivitySource;
use crate::lcdb::TrackingStore;
use crate::models::{AnnouncedEvent, Difficulty, Profile, Submission, TrackedAccount};
use crate::notify::{Announcement, NotificationSink};

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// What one account's batch means relative to its watermark.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchDiff<'a> {
    /// Never polled before: adopt the batch maximum, announce nothing.
    Baseline { watermark: i64 },
    /// Nothing accepted past the watermark; leave the account untouched.
    Unchanged,
    /// Accepted solves newer than the watermark, oldest first.
    NewSolves { watermark: i64, solves: Vec<&'a Submission> },
}

/// Compares a batch of submissions against an account's watermark.
///
/// The new watermark is the maximum over the whole batch, rejected submissions
/// included, so they are not inspected again next cycle.
pub fn diff_batch(last_seen: i64, batch: &[Submission]) -> BatchDiff<'_> {
    let newest = batch.iter().map(|sub| sub.timestamp).max();

    if last_seen == 0 {
        return match newest {
            Some(watermark) => BatchDiff::Baseline { watermark },
            None => BatchDiff::Unchanged,
        };
    }

    let solves = batch
        .iter()
        .filter(|sub| sub.is_accepted() && sub.timestamp > last_seen)
        .sorted_by_key(|sub| sub.timestamp)
        .collect::<Vec<_>>();

    match newest {
        Some(newest) if !solves.is_empty() => BatchDiff::NewSolves {
            watermark: newest.max(last_seen),
            solves,
        },
        _ => BatchDiff::Unchanged,
    }
}

/// Summary of one monitor cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub usernames: usize,
    pub accounts: usize,
    pub fetch_failures: usize,
    pub recorded: usize,
    pub announced: usize,
}

pub struct ActivityMonitor {
    source: Arc<dyn ActivitySource>,
    store: Arc<dyn TrackingStore>,
    sink: Arc<dyn NotificationSink>,
    config: MonitorConfig,

    /// Held for the duration of a cycle; a second trigger finding it taken is skipped.
    in_flight: Mutex<()>,
}

impl ActivityMonitor {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        store: Arc<dyn TrackingStore>,
        sink: Arc<dyn NotificationSink>,
        config: MonitorConfig,
    ) -> Self {
        Self { source, store, sink, config, in_flight: Mutex::new(()) }
    }

    /// Runs forever: first cycle after the startup delay, then one per poll interval.
    pub async fn run(self: Arc<Self>) {
        log::info!(
            "[monitor] Starting in {:?}, polling every {:?}.",
            self.config.startup_delay, self.config.poll_interval
        );

        let start = Instant::now() + self.config.startup_delay;
        let mut interval = tokio::time::interval_at(start, self.config.poll_interval.max(MIN_PERIOD));
        // A cycle that overruns the period swallows the ticks it missed
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match self.run_cycle().await {
                Ok(Some(report)) => log::debug!("[monitor] Cycle finished: {report:?}"),
                Ok(None) => {}
                Err(err) => log::error!("[monitor] Cycle aborted: {err:#}"),
            }
        }
    }

    /// Runs one polling cycle. Returns `Ok(None)` if another cycle is still in flight.
    pub async fn run_cycle(&self) -> Result<Option<CycleReport>> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            log::warn!("[run_cycle] Previous cycle still running, skipping this one.");
            return Ok(None);
        };

        let accounts = self.store
            .query_tracked_accounts()
            .context("Couldn't load tracked accounts")?;

        // Rebuilt every cycle: links can change between cycles
        let by_username = accounts.into_iter().into_group_map_by(|account| account.username.clone());

        let mut report = CycleReport { usernames: by_username.len(), ..Default::default() };
        let mut difficulties = HashMap::new();

        for (i, (username, accounts)) in by_username.iter().sorted_by_key(|(name, _)| *name).enumerate() {
            if i > 0 {
                sleep(self.config.user_delay).await;
            }

            let batch = match self.source
                .fetch_recent_submissions(username, self.config.submission_limit)
                .await
            {
                Ok(batch) => batch,
                Err(err) => {
                    log::error!("[run_cycle] Couldn't fetch submissions for {username}: {err:#}");
                    report.fetch_failures += 1;
                    continue;
                }
            };

            for account in accounts {
                report.accounts += 1;
                match self.process_account(account, &batch, &mut difficulties).await {
                    Ok((recorded, announced)) => {
                        report.recorded += recorded;
                        report.announced += announced;
                    }
                    Err(err) => log::error!(
                        "[run_cycle] Couldn't process {username} for member {} in guild {}: {err:#}",
                        account.member_id, account.guild_id
                    ),
                }
            }
        }

        if report.announced > 0 {
            log::info!("[run_cycle] Announced {} new solves.", report.announced);
        }

        Ok(Some(report))
    }

    /// Applies one batch to one account. Returns (ledger rows added, announcements sent).
    async fn process_account(
        &self,
        account: &TrackedAccount,
        batch: &[Submission],
        difficulties: &mut HashMap<String, Difficulty>,
    ) -> Result<(usize, usize)> {
        let (watermark, solves) = match diff_batch(account.last_seen, batch) {
            BatchDiff::Unchanged => return Ok((0, 0)),
            BatchDiff::Baseline { watermark } => {
                log::info!(
                    "[process_account] Baseline for {} in guild {}: watermark {watermark}",
                    account.username, account.guild_id
                );
                self.store.update_watermark(account, watermark)?;
                return Ok((0, 0));
            }
            BatchDiff::NewSolves { watermark, solves } => (watermark, solves),
        };

        // Persisted before anything is announced, so a crash mid-announcement
        // can't make the next cycle see these solves as new again.
        self.store.update_watermark(account, watermark)?;

        let destination = self.store.query_destination(account.guild_id)?;
        let profile = match destination {
            Some(_) => self.refresh_profile(account).await,
            None => None,
        };

        let mut recorded = 0;
        let mut announced = 0;

        for submission in solves {
            let difficulty = self.resolve_difficulty(&submission.slug, difficulties).await;
            let event = AnnouncedEvent::new(account, submission, difficulty);

            if !self.store.insert_announced(&event)? {
                log::trace!(
                    "[process_account] {} already recorded for {} in guild {}",
                    submission.slug, account.username, account.guild_id
                );
                continue;
            }
            recorded += 1;

            let Some(channel_id) = destination else { continue };

            let announcement = Announcement::solve(account, submission, difficulty, profile.as_ref());
            match self.sink.post(channel_id, &announcement).await {
                Ok(()) => announced += 1,
                Err(err) => log::error!(
                    "[process_account] Couldn't announce {} to channel {channel_id}: {err:#}",
                    submission.slug
                ),
            }
        }

        Ok((recorded, announced))
    }

    /// Best effort: fetches the latest profile and caches its stats on the account.
    async fn refresh_profile(&self, account: &TrackedAccount) -> Option<Profile> {
        let profile = match self.source.fetch_profile(&account.username).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                log::warn!("[refresh_profile] LeetCode no longer knows {}", account.username);
                return None;
            }
            Err(err) => {
                log::warn!("[refresh_profile] Couldn't refresh {}: {err:#}", account.username);
                return None;
            }
        };

        if let Err(err) = self.store.update_cached_stats(account, profile.total_solved, profile.streak) {
            log::warn!("[refresh_profile] Couldn't cache stats for {}: {err}", account.username);
        }

        Some(profile)
    }

    /// Best effort, memoised for the cycle: a failed lookup is `Unknown`.
    async fn resolve_difficulty(&self, slug: &str, cache: &mut HashMap<String, Difficulty>) -> Difficulty {
        if let Some(&difficulty) = cache.get(slug) {
            return difficulty;
        }

        let difficulty = self.source
            .fetch_problem_difficulty(slug)
            .await
            .unwrap_or_else(|err| {
                log::warn!("[resolve_difficulty] Couldn't look up {slug}: {err:#}");
                Difficulty::Unknown
            });

        // Failures aren't cached so a later account in this cycle can retry
        if difficulty != Difficulty::Unknown {
            cache.insert(slug.to_string(), difficulty);
        }

        difficulty
    }
}
