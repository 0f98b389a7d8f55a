use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use maturity_core::AssessmentKey;
use maturity_storage::BoxFuture;
use maturity_sync::scheduler::Tick;
use maturity_sync::{ActiveEditTracker, Cadence, SyncScheduler};

fn counting_tick(count: &Arc<AtomicUsize>, continue_until: usize) -> Tick {
    let count = count.clone();
    Arc::new(move || -> BoxFuture<'static, bool> {
        let count = count.clone();
        Box::pin(async move { count.fetch_add(1, Ordering::SeqCst) + 1 < continue_until })
    })
}

#[tokio::test(start_paused = true)]
async fn edit_window_expires_after_idle_timeout() {
    let tracker = ActiveEditTracker::default();
    let key = AssessmentKey::new("App", None);
    assert!(!tracker.is_active());

    tracker.mark_editing(key.clone());
    assert!(tracker.is_editing("App", None));
    assert!(tracker.is_editing("App", Some("App")));
    assert!(!tracker.is_editing("App", Some("Other")));

    tokio::time::advance(Duration::from_secs(4)).await;
    tracker.mark_editing(key.clone());
    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(tracker.is_editing_key(&key), "a new edit restarts the window");

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!tracker.is_active());
    assert!(!tracker.is_editing_key(&key));
}

#[tokio::test(start_paused = true)]
async fn polling_is_slower_while_editing() {
    let tracker = ActiveEditTracker::default();
    assert_eq!(tracker.poll_interval(), Duration::from_secs(10));

    tracker.mark_editing(AssessmentKey::new("App", None));
    assert_eq!(tracker.poll_interval(), Duration::from_secs(30));

    tracker.clear();
    assert_eq!(tracker.poll_interval(), Duration::from_secs(10));
    assert_eq!(tracker.cadence(), Cadence::default());
}

#[tokio::test(start_paused = true)]
async fn scheduler_follows_the_idle_cadence() {
    let tracker = Arc::new(ActiveEditTracker::default());
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = SyncScheduler::new();
    scheduler.start(tracker, counting_tick(&count, usize::MAX));

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(scheduler.is_running());

    scheduler.stop().unwrap().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn scheduler_rereads_the_interval_each_cycle() {
    let tracker = Arc::new(ActiveEditTracker::default());
    tracker.mark_editing(AssessmentKey::new("App", None));
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = SyncScheduler::new();
    scheduler.start(tracker, counting_tick(&count, usize::MAX));

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Edit window long gone: back to the idle interval.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn tick_can_end_the_schedule() {
    let tracker = Arc::new(ActiveEditTracker::default());
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = SyncScheduler::new();
    scheduler.start(tracker, counting_tick(&count, 2));

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn edit_windows_are_tracked_per_assessment() {
    let tracker = ActiveEditTracker::default();
    let a = AssessmentKey::new("A", None);
    let b = AssessmentKey::new("B", Some("Night"));

    tracker.mark_editing(a.clone());
    tokio::time::advance(Duration::from_secs(3)).await;
    tracker.mark_editing(b.clone());
    assert!(tracker.is_editing_key(&a));
    assert!(tracker.is_editing("B", Some("Night")));
    assert!(!tracker.is_editing("B", None));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(!tracker.is_editing_key(&a));
    assert!(tracker.is_editing_key(&b));
    assert_eq!(tracker.poll_interval(), Duration::from_secs(30));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(!tracker.is_active());
}
