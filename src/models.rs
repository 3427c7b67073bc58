use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const PROBLEM_URL_PREFIX: &str = "https://leetcode.com/problems";

/// A Discord member's link to a LeetCode account, scoped to one guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAccount {
    pub member_id: u64,
    pub guild_id: u64,

    pub username: String,

    /// Unix seconds of the newest submission already inspected. 0 means never polled.
    pub last_seen: i64,

    pub total_solved: u64,
    pub streak: u64,
}

impl TrackedAccount {
    pub fn is_baseline(&self) -> bool {
        self.last_seen == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Unknown,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Unknown => "Unknown",
        }
    }

    /// Accent colour LeetCode uses for the difficulty label.
    pub fn colour(&self) -> Option<u32> {
        match self {
            Difficulty::Easy => Some(0x00B8A3),
            Difficulty::Medium => Some(0xFFC01E),
            Difficulty::Hard => Some(0xFF375F),
            Difficulty::Unknown => None,
        }
    }
}

impl FromStr for Difficulty {
    type Err = std::convert::Infallible;

    /// Never fails: anything unrecognised is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Unknown,
        })
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub ranking: u64,
    pub avatar_url: Option<String>,
    pub streak: u64,

    pub easy_solved: u64,
    pub medium_solved: u64,
    pub hard_solved: u64,
    pub total_solved: u64,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**User Stats for {}:**\n\
             \tEasy Solved: {}\n\
             \tMedium Solved: {}\n\
             \tHard Solved: {}\n\
             \tTotal Solved: {}\n\
             \tRanking: {}\n\
             \tStreak: {}",
            self.username, self.easy_solved, self.medium_solved, self.hard_solved,
            self.total_solved, self.ranking, self.streak
        )
    }
}

pub const ACCEPTED_STATUS: &str = "Accepted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub title: String,
    pub slug: String,
    pub timestamp: i64,
    pub status: String,
    pub language: String,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        self.status == ACCEPTED_STATUS
    }

    pub fn problem_url(&self) -> String {
        format!("{PROBLEM_URL_PREFIX}/{}/", self.slug)
    }
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**Submission**: {}\n\
            {}\n\
            \tStatus: *{}*\n\
            \tTimestamp: {}\n\
            \tLanguage: `{}`",
            self.title,
            self.problem_url(),
            self.status,
            chrono::DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default(),
            self.language
        )
    }
}

/// One row of the dedupe ledger: a solve that has been recorded (and, where a
/// destination exists, announced) for a member in a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncedEvent {
    pub member_id: u64,
    pub guild_id: u64,
    pub problem_slug: String,
    pub problem_title: String,
    pub difficulty: Difficulty,
    pub solved_at: i64,
}

impl AnnouncedEvent {
    pub fn new(account: &TrackedAccount, submission: &Submission, difficulty: Difficulty) -> Self {
        Self {
            member_id: account.member_id,
            guild_id: account.guild_id,
            problem_slug: submission.slug.clone(),
            problem_title: submission.title.clone(),
            difficulty,
            solved_at: submission.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub member_id: u64,
    pub solved: u64,
}

/// A guild with a configured announcement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuildDestination {
    pub guild_id: u64,
    pub channel_id: u64,
}
