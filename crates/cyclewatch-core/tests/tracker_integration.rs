//! Integration tests for the refresh loop and notification timing.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use cyclewatch_core::cycle::ids;
use cyclewatch_core::schedule::{self, InlineSource};
use cyclewatch_core::{
    CycleEvent, CycleNotificationPreference, CycleState, CycleTracker, ManualClock,
    NotificationPreferences, TrackerConfig,
};

fn canonical_tracker(clock: &ManualClock, prefs: NotificationPreferences) -> CycleTracker {
    let loaded = schedule::load(&InlineSource::empty()).unwrap();
    CycleTracker::with_options(loaded, prefs, TrackerConfig::default(), Arc::new(clock.clone()))
        .unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn stop_requires_matching_calls() {
    let clock = ManualClock::at(1, 0, 0);
    let tracker = canonical_tracker(&clock, NotificationPreferences::default());

    tracker.start().unwrap();
    tracker.start().unwrap();
    tracker.start().unwrap();
    settle().await;
    assert_eq!(tracker.start_count(), 3);
    assert_eq!(
        tracker.state(ids::VERDANT_BRINK_DAY).unwrap().state,
        CycleState::Active
    );

    tracker.stop();
    tracker.stop();
    assert!(tracker.is_running());

    // Still ticking with one outstanding start.
    clock.set_hms(23, 50, 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        tracker.state(ids::VERDANT_BRINK_DAY).unwrap().state,
        CycleState::Inactive
    );

    tracker.stop();
    assert!(!tracker.is_running());
    assert_eq!(tracker.start_count(), 0);

    // A stopped loop never mutates state.
    clock.set_hms(1, 0, 0);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        tracker.state(ids::VERDANT_BRINK_DAY).unwrap().state,
        CycleState::Inactive
    );
}

#[tokio::test(start_paused = true)]
async fn unmatched_stop_is_ignored() {
    let clock = ManualClock::at(1, 0, 0);
    let tracker = canonical_tracker(&clock, NotificationPreferences::default());
    tracker.stop();
    assert_eq!(tracker.start_count(), 0);
    tracker.start().unwrap();
    assert_eq!(tracker.start_count(), 1);
    assert!(tracker.is_running());
    tracker.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_halts_regardless_of_references() {
    let clock = ManualClock::at(1, 0, 0);
    let tracker = canonical_tracker(&clock, NotificationPreferences::default());
    for _ in 0..4 {
        tracker.start().unwrap();
    }
    settle().await;

    tracker.shutdown();
    assert!(!tracker.is_running());
    assert_eq!(tracker.start_count(), 0);

    clock.set_hms(23, 50, 0);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        tracker.state(ids::VERDANT_BRINK_DAY).unwrap().state,
        CycleState::Active
    );
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_ticking() {
    let clock = ManualClock::at(1, 0, 0);
    let tracker = canonical_tracker(&clock, NotificationPreferences::default());
    tracker.start().unwrap();
    settle().await;
    tracker.stop();

    clock.set_hms(0, 20, 0);
    tracker.start().unwrap();
    settle().await;
    assert_eq!(
        tracker.state(ids::VERDANT_BRINK_DAY).unwrap().state,
        CycleState::Preparation
    );
    assert_eq!(
        tracker.state(ids::VERDANT_BRINK_DAY).unwrap().time_until_active,
        Some(TimeDelta::minutes(10))
    );
    tracker.shutdown();
}

#[tokio::test(start_paused = true)]
async fn loop_notifies_once_and_auto_dismisses() {
    let clock = ManualClock::at(0, 24, 59);
    let mut prefs = NotificationPreferences::default();
    prefs.auto_dismiss_secs = 10;
    prefs.set_cycle(
        ids::VERDANT_BRINK_DAY,
        CycleNotificationPreference::new(true, TimeDelta::minutes(5)).unwrap(),
    );
    // Keep the other cycles quiet.
    for id in [
        ids::VERDANT_BRINK_NIGHT_BOSSES,
        ids::TANGLED_DEPTHS_PREP,
        ids::TANGLED_DEPTHS_GERENT,
        ids::AURIC_BASIN_CHALLENGES,
        ids::DRY_TOP_CRASH,
        ids::DRY_TOP_SANDSTORM,
    ] {
        prefs.set_cycle(id, CycleNotificationPreference::new(false, TimeDelta::zero()).unwrap());
    }

    let tracker = canonical_tracker(&clock, prefs);
    let mut events = tracker.subscribe();
    tracker.start().unwrap();
    settle().await;
    assert!(tracker.active_notifications().is_empty());

    clock.set_hms(0, 25, 0);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(tracker.active_notifications(), vec![ids::VERDANT_BRINK_DAY]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(
        tracker
            .state(ids::VERDANT_BRINK_DAY)
            .unwrap()
            .notification_dismissing
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(tracker.active_notifications().is_empty());

    // Ticks keep running inside the lead window without re-notifying.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(tracker.active_notifications().is_empty());
    tracker.shutdown();

    let notified: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, CycleEvent::NotificationAdded { .. }))
        .collect();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].cycle_id(), Some(ids::VERDANT_BRINK_DAY));
}

#[tokio::test(start_paused = true)]
async fn snapshots_cover_every_cycle() {
    let clock = ManualClock::at(12, 0, 0);
    let tracker = canonical_tracker(&clock, NotificationPreferences::default());
    tracker.tick_now().unwrap();
    let snapshots = tracker.snapshots();
    assert_eq!(snapshots.len(), 13);
    assert!(snapshots.iter().all(|s| s.state != CycleState::Unknown));
    // Dry Top Crash: hourly from 00:00, active 40 minutes.
    let crash = tracker.snapshot(ids::DRY_TOP_CRASH).unwrap();
    assert_eq!(crash.state, CycleState::Active);
    assert_eq!(crash.timer_value_ms, Some(0));
}
