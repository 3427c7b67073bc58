use anyhow::{Context, Result, anyhow};

use std::str::FromStr;
use std::time::Duration;

/// Hours of the local day in which a daily job may fire: `start <= hour < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TriggerWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

impl FromStr for TriggerWindow {
    type Err = anyhow::Error;

    /// Parses `"9-12"`.
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s.split_once('-')
            .with_context(|| format!("Expected an hour range like `9-12`, got `{s}`"))?;
        let start_hour: u32 = start.trim().parse().context("Bad start hour")?;
        let end_hour: u32 = end.trim().parse().context("Bad end hour")?;

        if start_hour >= end_hour || end_hour > 24 {
            return Err(anyhow!("Hour range `{s}` must satisfy start < end <= 24"));
        }

        Ok(Self { start_hour, end_hour })
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub startup_delay: Duration,
    pub poll_interval: Duration,
    /// Pause between two usernames within a cycle.
    pub user_delay: Duration,
    pub submission_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(120),
            user_delay: Duration::from_millis(2000),
            submission_limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub recap_window: TriggerWindow,
    pub nudge_window: TriggerWindow,
    pub nudge_user_delay: Duration,
    pub recap_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            recap_window: TriggerWindow::new(9, 12),
            nudge_window: TriggerWindow::new(20, 23),
            nudge_user_delay: Duration::from_millis(500),
            recap_size: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub call_token: char,
    pub db_path: String,
    pub http_timeout: Duration,
    pub monitor: MonitorConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Reads the configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = lookup("DISCORD_TOKEN")
            .context("Expected 'DISCORD_TOKEN=<token>' in .env in project root.")?;

        let call_token = match lookup("BOT_CALL_TOKEN") {
            Some(env_token) => {
                let token = env_token.chars().next().context("BOT_CALL_TOKEN is empty.")?;
                if env_token.chars().count() > 1 {
                    log::warn!("$BOT_CALL_TOKEN not a single character. Truncating to {token}");
                }
                token
            }
            None => '$',
        };

        let parse = |key: &str, default: u64| -> Result<u64> {
            lookup(key).map_or(Ok(default), |value| {
                value.trim().parse().with_context(|| format!("{key} must be an integer, got `{value}`"))
            })
        };
        let window = |key: &str, default: TriggerWindow| -> Result<TriggerWindow> {
            lookup(key).map_or(Ok(default), |value| value.parse().with_context(|| format!("Invalid {key}")))
        };

        let monitor_defaults = MonitorConfig::default();
        let scheduler_defaults = SchedulerConfig::default();

        Ok(Self {
            discord_token,
            call_token,
            db_path: lookup("LEEK_DB_PATH").unwrap_or_else(|| String::from("leek.db")),
            http_timeout: Duration::from_secs(parse("LEEK_HTTP_TIMEOUT_SECS", 10)?),
            monitor: MonitorConfig {
                startup_delay: Duration::from_secs(
                    parse("LEEK_STARTUP_DELAY_SECS", monitor_defaults.startup_delay.as_secs())?),
                poll_interval: Duration::from_secs(
                    parse("LEEK_POLL_INTERVAL_SECS", monitor_defaults.poll_interval.as_secs())?),
                user_delay: Duration::from_millis(
                    parse("LEEK_USER_DELAY_MS", monitor_defaults.user_delay.as_millis() as u64)?),
                submission_limit: parse("LEEK_SUBMISSION_LIMIT", monitor_defaults.submission_limit as u64)?
                    as usize,
            },
            scheduler: SchedulerConfig {
                tick_interval: Duration::from_secs(
                    parse("LEEK_SCHEDULER_TICK_SECS", scheduler_defaults.tick_interval.as_secs())?),
                recap_window: window("LEEK_RECAP_HOURS", scheduler_defaults.recap_window)?,
                nudge_window: window("LEEK_NUDGE_HOURS", scheduler_defaults.nudge_window)?,
                nudge_user_delay: Duration::from_millis(
                    parse("LEEK_NUDGE_USER_DELAY_MS", scheduler_defaults.nudge_user_delay.as_millis() as u64)?),
                recap_size: scheduler_defaults.recap_size,
            },
        })
    }
}
