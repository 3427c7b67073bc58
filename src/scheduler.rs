//! Wall-clock driven daily reports: a morning recap of yesterday's solves and
//! an evening nudge for members whose streak is about to lapse.
//!
//! There is no durable cron. Each job has an in-memory latch remembering the
//! last date it fired for, and fires when the local hour falls inside its
//! window and the latch isn't already set for today. A restart inside a window
//! can therefore fire a job twice on one day, and a window that passes while
//! the process is down is skipped for that day.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use itertools::Itertools;
use tokio::time::{MissedTickBehavior, sleep};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{SchedulerConfig, TriggerWindow};
use crate::lcapi::ActivitySource;
use crate::lcdb::TrackingStore;
use crate::notify::{Announcement, NotificationSink};

/// Unix timestamp of local midnight at the start of `date`.
pub fn day_start(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump; UTC is close enough for a day boundary
        .map_or_else(|| midnight.and_utc().timestamp(), |dt| dt.timestamp())
}

/// Fires at most once per calendar day, and only inside its window.
#[derive(Debug, Clone)]
pub struct DailyLatch {
    window: TriggerWindow,
    fired_for: Option<NaiveDate>,
}

impl DailyLatch {
    pub fn new(window: TriggerWindow) -> Self {
        Self { window, fired_for: None }
    }

    /// Returns `true` (and latches for today) if the job should run at `now`.
    pub fn poll(&mut self, now: NaiveDateTime) -> bool {
        let today = now.date();
        if !self.window.contains(now.hour()) || self.fired_for == Some(today) {
            return false;
        }

        self.fired_for = Some(today);
        true
    }

    pub fn fired_for(&self) -> Option<NaiveDate> {
        self.fired_for
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DueJobs {
    pub recap: bool,
    pub nudge: bool,
}

pub struct ReportScheduler {
    source: Arc<dyn ActivitySource>,
    store: Arc<dyn TrackingStore>,
    sink: Arc<dyn NotificationSink>,
    config: SchedulerConfig,

    recap: DailyLatch,
    nudge: DailyLatch,
}

impl ReportScheduler {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        store: Arc<dyn TrackingStore>,
        sink: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
    ) -> Self {
        let recap = DailyLatch::new(config.recap_window);
        let nudge = DailyLatch::new(config.nudge_window);
        Self { source, store, sink, config, recap, nudge }
    }

    pub async fn run(mut self) {
        log::info!(
            "[scheduler] Recap window {:?}, nudge window {:?}, ticking every {:?}.",
            self.config.recap_window, self.config.nudge_window, self.config.tick_interval
        );

        let mut interval = tokio::time::interval(self.config.tick_interval.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.tick(Local::now().naive_local()).await;
        }
    }

    /// Advances both latches to `now` and reports which jobs are due.
    pub fn due_jobs(&mut self, now: NaiveDateTime) -> DueJobs {
        DueJobs {
            recap: self.recap.poll(now),
            nudge: self.nudge.poll(now),
        }
    }

    /// One scheduler tick. Job failures are logged; the latch stays set either way.
    pub async fn tick(&mut self, now: NaiveDateTime) -> DueJobs {
        let due = self.due_jobs(now);
        let today = now.date();

        if due.recap {
            log::info!("[tick] Running daily recap for {today}.");
            match self.run_recap(today).await {
                Ok(posted) => log::info!("[tick] Recap posted to {posted} guilds."),
                Err(err) => log::error!("[tick] Recap failed: {err:#}"),
            }
        }

        if due.nudge {
            log::info!("[tick] Running streak nudge for {today}.");
            match self.run_nudge(today).await {
                Ok(posted) => log::info!("[tick] Nudge posted to {posted} guilds."),
                Err(err) => log::error!("[tick] Nudge failed: {err:#}"),
            }
        }

        due
    }

    /// Posts yesterday's leaderboard to every guild with a destination and at
    /// least one solve. Returns how many guilds were posted to.
    pub async fn run_recap(&self, today: NaiveDate) -> Result<usize> {
        let end = day_start(today);
        let start = today.pred_opt().map_or(end - 86_400, day_start);

        let destinations = self.store.query_destinations().context("Couldn't load destinations")?;
        let mut posted = 0;

        for destination in destinations {
            let leaderboard = match self.store.query_leaderboard(
                destination.guild_id, start, end, self.config.recap_size,
            ) {
                Ok(leaderboard) => leaderboard,
                Err(err) => {
                    log::error!("[run_recap] Couldn't rank guild {}: {err}", destination.guild_id);
                    continue;
                }
            };

            if leaderboard.is_empty() {
                log::debug!("[run_recap] No solves yesterday in guild {}", destination.guild_id);
                continue;
            }

            match self.sink.post(destination.channel_id, &Announcement::recap(&leaderboard)).await {
                Ok(()) => posted += 1,
                Err(err) => log::error!(
                    "[run_recap] Couldn't post recap to channel {}: {err:#}", destination.channel_id
                ),
            }
        }

        Ok(posted)
    }

    /// Warns, once per guild, every member with a live streak and nothing
    /// recorded today. Returns how many guilds were posted to.
    pub async fn run_nudge(&self, today: NaiveDate) -> Result<usize> {
        let since = day_start(today);

        let destinations = self.store.query_destinations().context("Couldn't load destinations")?;
        let mut posted = 0;

        for destination in destinations {
            match self.at_risk_members(destination.guild_id, since).await {
                Ok(at_risk) if at_risk.is_empty() => {
                    log::debug!("[run_nudge] Nobody at risk in guild {}", destination.guild_id);
                }
                Ok(at_risk) => {
                    match self.sink.post(destination.channel_id, &Announcement::nudge(&at_risk)).await {
                        Ok(()) => posted += 1,
                        Err(err) => log::error!(
                            "[run_nudge] Couldn't post nudge to channel {}: {err:#}",
                            destination.channel_id
                        ),
                    }
                }
                Err(err) => log::error!(
                    "[run_nudge] Couldn't check streaks in guild {}: {err:#}", destination.guild_id
                ),
            }
        }

        Ok(posted)
    }

    /// Members of `guild_id` with a nonzero streak and no ledger rows since `since`.
    async fn at_risk_members(&self, guild_id: u64, since: i64) -> Result<Vec<u64>> {
        let accounts = self.store.query_guild_accounts(guild_id)?;
        let by_username = accounts.into_iter().into_group_map_by(|account| account.username.clone());

        let mut at_risk = Vec::new();

        for (i, (username, accounts)) in by_username.iter().sorted_by_key(|(name, _)| *name).enumerate() {
            if i > 0 {
                sleep(self.config.nudge_user_delay).await;
            }

            let streak = match self.source.fetch_profile(username).await {
                Ok(Some(profile)) => profile.streak,
                Ok(None) => {
                    log::warn!("[at_risk_members] LeetCode no longer knows {username}");
                    continue;
                }
                Err(err) => {
                    log::warn!("[at_risk_members] Couldn't fetch streak for {username}: {err:#}");
                    continue;
                }
            };

            if streak == 0 {
                continue;
            }

            for account in accounts {
                if self.store.count_announced_since(account.member_id, guild_id, since)? == 0 {
                    at_risk.push(account.member_id);
                }
            }
        }

        at_risk.sort_unstable();
        at_risk.dedup();
        Ok(at_risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn latch_fires_once_per_day_inside_window() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let mut latch = DailyLatch::new(TriggerWindow::new(9, 12));

        let start = at(day, 9, 0);
        let fired = (0..180)
            .filter(|&minute| latch.poll(start + Duration::minutes(minute)))
            .count();

        assert_eq!(fired, 1);
        assert_eq!(latch.fired_for(), Some(day));
    }

    #[test]
    fn latch_ignores_ticks_outside_window() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let mut latch = DailyLatch::new(TriggerWindow::new(9, 12));

        assert!(!latch.poll(at(day, 8, 59)));
        assert!(!latch.poll(at(day, 12, 0)));
        assert_eq!(latch.fired_for(), None);
        assert!(latch.poll(at(day, 11, 59)));
    }

    #[test]
    fn latch_rearms_the_next_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let next = day.succ_opt().unwrap();
        let mut latch = DailyLatch::new(TriggerWindow::new(20, 23));

        assert!(latch.poll(at(day, 20, 5)));
        assert!(!latch.poll(at(day, 22, 0)));
        assert!(latch.poll(at(next, 21, 30)));
    }

    #[test]
    fn day_start_is_24_hours_apart_on_ordinary_days() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let next = day.succ_opt().unwrap();
        let delta = day_start(next) - day_start(day);
        // DST transitions shift a day by an hour either way
        assert!((82_800..=90_000).contains(&delta));
    }
}
