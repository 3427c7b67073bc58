//! Structured announcements and the capability to deliver them.
//!
//! The core never renders chat messages itself; it builds an [`Announcement`]
//! and hands it to a [`NotificationSink`], which owns the platform specifics.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Difficulty, LeaderboardEntry, Profile, Submission, TrackedAccount};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(&self, channel_id: u64, announcement: &Announcement) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub colour: Option<u32>,
    pub thumbnail: Option<String>,
    pub footer: Option<String>,
    /// Unix seconds.
    pub timestamp: Option<i64>,
}

const RECAP_COLOUR: u32 = 0xFFA116;
const NUDGE_COLOUR: u32 = 0xEF4743;

fn mention(member_id: u64) -> String {
    format!("<@{member_id}>")
}

impl Announcement {
    /// A single new accepted solve.
    ///
    /// `profile` is the freshly refreshed profile, if the refresh worked; otherwise
    /// the account's cached stats are shown.
    pub fn solve(
        account: &TrackedAccount,
        submission: &Submission,
        difficulty: Difficulty,
        profile: Option<&Profile>,
    ) -> Self {
        let (total_solved, streak) = profile
            .map_or((account.total_solved, account.streak), |p| (p.total_solved, p.streak));

        Self {
            title: format!("{} solved {}!", account.username, submission.title),
            description: format!(
                "{} just solved **{}** ({difficulty}) in `{}`.",
                mention(account.member_id),
                submission.title,
                submission.language
            ),
            url: Some(submission.problem_url()),
            colour: difficulty.colour(),
            thumbnail: profile.and_then(|p| p.avatar_url.clone()),
            footer: Some(format!("Total solved: {total_solved} | Streak: {streak}")),
            timestamp: Some(submission.timestamp),
        }
    }

    /// Yesterday's ranking. Callers skip empty leaderboards.
    pub fn recap(leaderboard: &[LeaderboardEntry]) -> Self {
        let lines = leaderboard
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let marker = match i {
                    0 => String::from("🥇"),
                    1 => String::from("🥈"),
                    2 => String::from("🥉"),
                    _ => format!("{}.", i + 1),
                };
                let noun = if entry.solved == 1 { "problem" } else { "problems" };
                format!("{marker} {} with {} {noun}", mention(entry.member_id), entry.solved)
            })
            .collect::<Vec<_>>();

        Self {
            title: String::from("Yesterday's top solvers"),
            description: lines.join("\n"),
            colour: Some(RECAP_COLOUR),
            ..Default::default()
        }
    }

    /// One combined warning for every member whose streak is about to lapse.
    pub fn nudge(at_risk: &[u64]) -> Self {
        let mentions = at_risk.iter().map(|&member| mention(member)).collect::<Vec<_>>();

        Self {
            title: String::from("Streaks at risk!"),
            description: format!(
                "{}\nYou haven't solved anything today. Keep your streak alive!",
                mentions.join(" ")
            ),
            colour: Some(NUDGE_COLOUR),
            ..Default::default()
        }
    }
}
