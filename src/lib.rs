//! Turns LeetCode's pull-only API into a push-style Discord activity feed.
//!
//! [`monitor::ActivityMonitor`] polls every tracked account and announces new
//! accepted solves exactly once per (member, guild, problem);
//! [`scheduler::ReportScheduler`] posts the daily recap and the evening streak
//! nudge. Both talk to the outside world only through [`lcapi::ActivitySource`],
//! [`lcdb::TrackingStore`] and [`notify::NotificationSink`].

pub mod config;
pub mod lcapi;
pub mod lcbot;
pub mod lcdb;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod scheduler;
