//! Shared fakes for the monitor and scheduler tests.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use leekwatch::lcapi::ActivitySource;
use leekwatch::lcdb::{LeekDb, TrackingStore};
use leekwatch::models::{Difficulty, Profile, Submission, TrackedAccount};
use leekwatch::notify::{Announcement, NotificationSink};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Scripted LeetCode that records every call it receives.
#[derive(Default)]
pub struct MockSource {
    submissions: Mutex<HashMap<String, Vec<Submission>>>,
    profiles: Mutex<HashMap<String, Profile>>,
    difficulties: Mutex<HashMap<String, Difficulty>>,
    failing_users: Mutex<HashSet<String>>,
    failing_profiles: Mutex<bool>,
    failing_difficulties: Mutex<bool>,

    pub submission_calls: Mutex<Vec<String>>,
    pub profile_calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submissions(self, username: &str, batch: Vec<Submission>) -> Self {
        self.submissions.lock().unwrap().insert(username.to_string(), batch);
        self
    }

    pub fn with_profile(self, username: &str, total_solved: u64, streak: u64) -> Self {
        self.profiles.lock().unwrap().insert(username.to_string(), profile(username, total_solved, streak));
        self
    }

    pub fn with_difficulty(self, slug: &str, difficulty: Difficulty) -> Self {
        self.difficulties.lock().unwrap().insert(slug.to_string(), difficulty);
        self
    }

    pub fn with_failing_user(self, username: &str) -> Self {
        self.failing_users.lock().unwrap().insert(username.to_string());
        self
    }

    pub fn with_failing_profiles(self) -> Self {
        *self.failing_profiles.lock().unwrap() = true;
        self
    }

    pub fn with_failing_difficulties(self) -> Self {
        *self.failing_difficulties.lock().unwrap() = true;
        self
    }

    pub fn submission_calls_for(&self, username: &str) -> usize {
        self.submission_calls.lock().unwrap().iter().filter(|u| *u == username).count()
    }
}

#[async_trait]
impl ActivitySource for MockSource {
    async fn fetch_profile(&self, username: &str) -> Result<Option<Profile>> {
        self.profile_calls.lock().unwrap().push(username.to_string());
        if *self.failing_profiles.lock().unwrap() {
            return Err(anyhow!("Mock profile failure"));
        }
        Ok(self.profiles.lock().unwrap().get(username).cloned())
    }

    async fn fetch_recent_submissions(&self, username: &str, _limit: usize) -> Result<Vec<Submission>> {
        self.submission_calls.lock().unwrap().push(username.to_string());
        // Give other tasks a chance to run, like a real network call would
        tokio::task::yield_now().await;

        if self.failing_users.lock().unwrap().contains(username) {
            return Err(anyhow!("Mock network failure for {username}"));
        }
        Ok(self.submissions.lock().unwrap().get(username).cloned().unwrap_or_default())
    }

    async fn fetch_problem_difficulty(&self, slug: &str) -> Result<Difficulty> {
        if *self.failing_difficulties.lock().unwrap() {
            return Err(anyhow!("Mock difficulty failure"));
        }
        Ok(self.difficulties.lock().unwrap().get(slug).copied().unwrap_or_default())
    }
}

/// Sink that remembers what it was asked to post.
#[derive(Default)]
pub struct RecordingSink {
    pub posts: Mutex<Vec<(u64, Announcement)>>,
    failing_channels: HashSet<u64>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(channels: &[u64]) -> Self {
        Self { failing_channels: channels.iter().copied().collect(), ..Default::default() }
    }

    pub fn posts(&self) -> Vec<(u64, Announcement)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn posts_to(&self, channel_id: u64) -> Vec<Announcement> {
        self.posts()
            .into_iter()
            .filter(|(channel, _)| *channel == channel_id)
            .map(|(_, announcement)| announcement)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn post(&self, channel_id: u64, announcement: &Announcement) -> Result<()> {
        if self.failing_channels.contains(&channel_id) {
            return Err(anyhow!("Mock delivery failure"));
        }
        self.posts.lock().unwrap().push((channel_id, announcement.clone()));
        Ok(())
    }
}

pub fn profile(username: &str, total_solved: u64, streak: u64) -> Profile {
    Profile {
        username: username.to_string(),
        ranking: 1000,
        avatar_url: Some(format!("https://assets.leetcode.com/{username}.png")),
        streak,
        easy_solved: total_solved,
        medium_solved: 0,
        hard_solved: 0,
        total_solved,
    }
}

pub fn submission(slug: &str, timestamp: i64, status: &str) -> Submission {
    Submission {
        title: slug.replace('-', " "),
        slug: slug.to_string(),
        timestamp,
        status: status.to_string(),
        language: String::from("rust"),
    }
}

pub fn store() -> Arc<LeekDb> {
    Arc::new(LeekDb::open_in_memory().unwrap())
}

/// Links an account and moves its watermark to `last_seen`.
pub fn track(store: &LeekDb, member_id: u64, guild_id: u64, username: &str, last_seen: i64) {
    store.link_account(member_id, guild_id, username, None).unwrap();
    if last_seen > 0 {
        let account = account(store, member_id, guild_id);
        store.update_watermark(&account, last_seen).unwrap();
    }
}

pub fn account(store: &LeekDb, member_id: u64, guild_id: u64) -> TrackedAccount {
    store
        .query_guild_accounts(guild_id)
        .unwrap()
        .into_iter()
        .find(|account| account.member_id == member_id)
        .unwrap()
}
