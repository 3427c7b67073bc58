//! Polling cycle behaviour against an in-memory store and scripted LeetCode.

mod common;

use common::{MockSource, RecordingSink, account, store, submission, track};
use leekwatch::config::MonitorConfig;
use leekwatch::lcdb::{LeekDb, TrackingStore};
use leekwatch::models::Difficulty;
use leekwatch::monitor::ActivityMonitor;

use std::sync::Arc;
use std::time::Duration;

fn config() -> MonitorConfig {
    MonitorConfig {
        startup_delay: Duration::ZERO,
        poll_interval: Duration::from_secs(60),
        user_delay: Duration::ZERO,
        submission_limit: 10,
    }
}

fn monitor(source: &Arc<MockSource>, store: &Arc<LeekDb>, sink: &Arc<RecordingSink>) -> ActivityMonitor {
    ActivityMonitor::new(source.clone(), store.clone(), sink.clone(), config())
}

#[tokio::test]
async fn scenario_announces_only_the_new_accepted_solve() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let source = Arc::new(
        MockSource::new()
            .with_submissions("ada", vec![
                submission("two-sum", 1500, "Accepted"),
                submission("three-sum", 900, "Accepted"),
                submission("x", 2000, "Wrong Answer"),
            ])
            .with_profile("ada", 41, 3)
            .with_difficulty("two-sum", Difficulty::Easy),
    );
    let sink = Arc::new(RecordingSink::new());

    let report = monitor(&source, &store, &sink).run_cycle().await.unwrap().unwrap();

    assert_eq!(account(&store, 1, 9).last_seen, 2000);

    let history = store.query_member_history(1, 9).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].problem_slug, "two-sum");
    assert_eq!(history[0].difficulty, Difficulty::Easy);
    assert_eq!(history[0].solved_at, 1500);

    let posts = sink.posts_to(900);
    assert_eq!(posts.len(), 1);
    assert!(posts[0].title.contains("two sum"));
    assert_eq!(posts[0].colour, Difficulty::Easy.colour());
    assert_eq!(report.announced, 1);

    // Profile refresh was cached on the account
    assert_eq!(account(&store, 1, 9).total_solved, 41);
    assert_eq!(account(&store, 1, 9).streak, 3);
}

#[tokio::test]
async fn one_fetch_per_username_across_members_and_guilds() {
    let store = store();
    track(&store, 1, 9, "ada", 1000);
    track(&store, 1, 10, "ada", 1000);
    track(&store, 2, 11, "ada", 1000);
    track(&store, 3, 9, "bob", 1000);

    let source = Arc::new(
        MockSource::new()
            .with_submissions("ada", vec![submission("two-sum", 1500, "Accepted")])
            .with_submissions("bob", vec![submission("two-sum", 1500, "Accepted")]),
    );
    let sink = Arc::new(RecordingSink::new());

    let report = monitor(&source, &store, &sink).run_cycle().await.unwrap().unwrap();

    assert_eq!(source.submission_calls_for("ada"), 1);
    assert_eq!(source.submission_calls_for("bob"), 1);
    assert_eq!(report.usernames, 2);
    assert_eq!(report.accounts, 4);

    // Each row is still updated independently
    for (member, guild) in [(1, 9), (1, 10), (2, 11), (3, 9)] {
        assert_eq!(account(&store, member, guild).last_seen, 1500);
        assert_eq!(store.query_member_history(member, guild).unwrap().len(), 1);
    }
}

#[tokio::test]
async fn first_poll_sets_baseline_without_announcing() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 0);

    let source = Arc::new(MockSource::new().with_submissions("ada", vec![
        submission("two-sum", 1500, "Accepted"),
        submission("x", 2000, "Wrong Answer"),
        submission("three-sum", 1200, "Accepted"),
    ]));
    let sink = Arc::new(RecordingSink::new());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    assert_eq!(account(&store, 1, 9).last_seen, 2000);
    assert!(sink.posts().is_empty());
    assert!(store.query_member_history(1, 9).unwrap().is_empty());
}

#[tokio::test]
async fn baseline_with_no_history_stays_unpolled() {
    let store = store();
    track(&store, 1, 9, "ada", 0);

    let source = Arc::new(MockSource::new());
    let sink = Arc::new(RecordingSink::new());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    assert_eq!(account(&store, 1, 9).last_seen, 0);
}

#[tokio::test]
async fn watermark_advances_on_following_cycles() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let sink = Arc::new(RecordingSink::new());

    let first = Arc::new(MockSource::new().with_submissions("ada", vec![submission("a", 1500, "Accepted")]));
    monitor(&first, &store, &sink).run_cycle().await.unwrap();
    assert_eq!(account(&store, 1, 9).last_seen, 1500);

    // Same batch again: nothing new, nothing mutated
    monitor(&first, &store, &sink).run_cycle().await.unwrap();
    assert_eq!(account(&store, 1, 9).last_seen, 1500);
    assert_eq!(sink.posts().len(), 1);

    let second = Arc::new(MockSource::new().with_submissions("ada", vec![
        submission("b", 1800, "Accepted"),
        submission("a", 1500, "Accepted"),
    ]));
    monitor(&second, &store, &sink).run_cycle().await.unwrap();
    assert_eq!(account(&store, 1, 9).last_seen, 1800);
    assert_eq!(sink.posts().len(), 2);
}

#[tokio::test]
async fn resubmitting_a_solved_problem_is_announced_once() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let source = Arc::new(MockSource::new().with_submissions("ada", vec![
        submission("two-sum", 1600, "Accepted"),
        submission("two-sum", 1500, "Accepted"),
    ]));
    let sink = Arc::new(RecordingSink::new());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    let history = store.query_member_history(1, 9).unwrap();
    assert_eq!(history.len(), 1);
    // The oldest solve wins
    assert_eq!(history[0].solved_at, 1500);
    assert_eq!(sink.posts().len(), 1);
}

#[tokio::test]
async fn solves_already_in_the_ledger_are_not_announced_again() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let batch = vec![submission("two-sum", 1500, "Accepted")];
    let source = Arc::new(MockSource::new().with_submissions("ada", batch.clone()));
    let sink = Arc::new(RecordingSink::new());

    // An earlier solve of the same problem, recorded in an earlier life
    let earlier = leekwatch::models::AnnouncedEvent::new(
        &account(&store, 1, 9),
        &submission("two-sum", 500, "Accepted"),
        Difficulty::Easy,
    );
    assert!(store.insert_announced(&earlier).unwrap());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    assert!(sink.posts().is_empty());
    assert_eq!(store.query_member_history(1, 9).unwrap().len(), 1);
    assert_eq!(account(&store, 1, 9).last_seen, 1500);
}

#[tokio::test]
async fn guild_without_destination_records_silently() {
    let store = store();
    track(&store, 1, 9, "ada", 1000);

    let source = Arc::new(MockSource::new().with_submissions("ada", vec![submission("two-sum", 1500, "Accepted")]));
    let sink = Arc::new(RecordingSink::new());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    assert!(sink.posts().is_empty());
    assert_eq!(account(&store, 1, 9).last_seen, 1500);
    assert_eq!(store.query_member_history(1, 9).unwrap().len(), 1);
    // No announcement, so no profile refresh either
    assert!(source.profile_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn several_new_solves_are_announced_oldest_first() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let source = Arc::new(MockSource::new().with_submissions("ada", vec![
        submission("third", 1300, "Accepted"),
        submission("first", 1100, "Accepted"),
        submission("second", 1200, "Accepted"),
    ]));
    let sink = Arc::new(RecordingSink::new());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    let timestamps = sink.posts_to(900).iter().map(|post| post.timestamp).collect::<Vec<_>>();
    assert_eq!(timestamps, [Some(1100), Some(1200), Some(1300)]);
}

#[tokio::test]
async fn fetch_failure_is_isolated_to_its_username() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);
    track(&store, 2, 9, "broken", 1000);

    let source = Arc::new(
        MockSource::new()
            .with_submissions("ada", vec![submission("two-sum", 1500, "Accepted")])
            .with_failing_user("broken"),
    );
    let sink = Arc::new(RecordingSink::new());

    let report = monitor(&source, &store, &sink).run_cycle().await.unwrap().unwrap();

    assert_eq!(report.fetch_failures, 1);
    assert_eq!(sink.posts().len(), 1);
    assert_eq!(account(&store, 1, 9).last_seen, 1500);
    assert_eq!(account(&store, 2, 9).last_seen, 1000);
}

#[tokio::test]
async fn sink_failure_is_isolated_to_its_guild() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    store.set_destination(10, Some(1000)).unwrap();
    track(&store, 1, 9, "ada", 1000);
    track(&store, 1, 10, "ada", 1000);

    let source = Arc::new(MockSource::new().with_submissions("ada", vec![submission("two-sum", 1500, "Accepted")]));
    let sink = Arc::new(RecordingSink::failing_on(&[900]));

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    assert_eq!(sink.posts_to(1000).len(), 1);
    // The failed delivery is not retried: the ledger already has the row
    assert_eq!(store.query_member_history(1, 9).unwrap().len(), 1);
    assert_eq!(account(&store, 1, 9).last_seen, 1500);
}

#[tokio::test]
async fn best_effort_lookups_do_not_block_announcements() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let source = Arc::new(
        MockSource::new()
            .with_submissions("ada", vec![submission("two-sum", 1500, "Accepted")])
            .with_failing_profiles()
            .with_failing_difficulties(),
    );
    let sink = Arc::new(RecordingSink::new());

    monitor(&source, &store, &sink).run_cycle().await.unwrap();

    let posts = sink.posts_to(900);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].colour, None);
    assert_eq!(posts[0].footer.as_deref(), Some("Total solved: 0 | Streak: 0"));
    assert_eq!(store.query_member_history(1, 9).unwrap()[0].difficulty, Difficulty::Unknown);
}

#[tokio::test]
async fn overlapping_cycles_are_skipped() {
    let store = store();
    store.set_destination(9, Some(900)).unwrap();
    track(&store, 1, 9, "ada", 1000);

    let source = Arc::new(MockSource::new().with_submissions("ada", vec![submission("two-sum", 1500, "Accepted")]));
    let sink = Arc::new(RecordingSink::new());
    let monitor = monitor(&source, &store, &sink);

    let (first, second) = tokio::join!(monitor.run_cycle(), monitor.run_cycle());
    let ran = [first.unwrap(), second.unwrap()].into_iter().flatten().count();

    assert_eq!(ran, 1);
    assert_eq!(source.submission_calls_for("ada"), 1);
    assert_eq!(sink.posts().len(), 1);
}
