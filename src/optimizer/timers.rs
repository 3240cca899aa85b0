//! # Job Timers
//!
//! The two recurring timers that run next to the blocking engine call:
//! - the progress poller, which hands the current percentage to the caller
//!   through the completion context (first tick immediately)
//! - the statistics sampler, which turns the engine's elapsed encode time
//!   into a percentage (first tick after a delay, so encoding has started)

use crate::engine::EngineSession;
use crate::optimizer::completion::CompletionContext;
use crate::optimizer::progress_tracker::ProgressTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Progress handler, receives a percentage in [0, 99]
pub type OnProgress = Arc<dyn Fn(u8) + Send + Sync + 'static>;

/// A running timer task
pub struct TimerHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer and wait until its task is gone: no tick runs after this returns
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
        debug!("{} timer stopped", self.name);
    }
}

pub fn spawn_progress_poller(
    runtime: &Handle,
    tracker: Arc<ProgressTracker>,
    on_progress: OnProgress,
    context: Arc<dyn CompletionContext>,
    period: Duration,
) -> TimerHandle {
    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let percentage = tracker.get();
            let on_progress = on_progress.clone();
            context.execute(Box::new(move || on_progress(percentage)));
        }
    });

    TimerHandle {
        name: "Progress poller",
        handle,
    }
}

/// `total_duration_secs` is probed once before the sampler starts; without
/// it no percentage is ever published
pub fn spawn_statistics_sampler(
    runtime: &Handle,
    tracker: Arc<ProgressTracker>,
    session: Arc<EngineSession>,
    total_duration_secs: Option<u64>,
    delay: Duration,
    period: Duration,
) -> TimerHandle {
    let total = total_duration_secs.unwrap_or(0);

    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let elapsed = session.elapsed_ms();
            if let Some(percentage) = tracker.sample(elapsed, total) {
                debug!(
                    "Encoded {} ms ({} frames) of {} s -> {}%",
                    elapsed,
                    session.frame(),
                    total,
                    percentage
                );
            }
        }
    });

    TimerHandle {
        name: "Statistics sampler",
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::completion::InlineContext;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_poller_reports_tracker_value_until_stopped() {
        let tracker = Arc::new(ProgressTracker::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let poller = spawn_progress_poller(
            &Handle::current(),
            tracker.clone(),
            Arc::new(move |p| sink.lock().unwrap().push(p)),
            Arc::new(InlineContext),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        tracker.sample(20_000, 40);
        tokio::time::sleep(Duration::from_millis(30)).await;
        poller.stop().await;

        let count = seen.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), count, "no tick after stop");
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&50));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_sampler_feeds_tracker_from_session() {
        let tracker = Arc::new(ProgressTracker::new());
        let session = Arc::new(EngineSession::new());
        session.record_time(3_000);

        let sampler = spawn_statistics_sampler(
            &Handle::current(),
            tracker.clone(),
            session.clone(),
            Some(10),
            Duration::from_millis(5),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.get(), 30);

        session.record_time(7_500);
        tokio::time::sleep(Duration::from_millis(50)).await;
        sampler.stop().await;
        assert_eq!(tracker.get(), 75);
    }

    #[tokio::test]
    async fn test_sampler_without_duration_stays_at_zero() {
        let tracker = Arc::new(ProgressTracker::new());
        let session = Arc::new(EngineSession::new());
        session.record_time(3_000);

        let sampler = spawn_statistics_sampler(
            &Handle::current(),
            tracker.clone(),
            session,
            None,
            Duration::ZERO,
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        sampler.stop().await;
        assert_eq!(tracker.get(), 0);
    }
}
