//! Live driver - ticks an intersection on a fixed interval
//!
//! Each interval the driver pulls one batch of observations from its source,
//! applies it, and ticks the scheduler with the clock's current time. The
//! loop runs as a tokio task until [`LiveDriver::stop`] is called.

use std::time::Duration;

use junction_core::{LaneId, Observation, Timestamp};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::Intersection;

/// Source of lane observations, sampled once per driver tick
pub trait ObservationSource: Send + 'static {
    fn sample(&mut self) -> Vec<(LaneId, Observation)>;
}

impl<F> ObservationSource for F
where
    F: FnMut() -> Vec<(LaneId, Observation)> + Send + 'static,
{
    fn sample(&mut self) -> Vec<(LaneId, Observation)> {
        self()
    }
}

/// Time source for scheduler ticks
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

impl<F> Clock for F
where
    F: Fn() -> Timestamp + Send + Sync + 'static,
{
    fn now(&self) -> Timestamp {
        self()
    }
}

/// System wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Counters for one driver run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks: u64,
    pub transitions: u64,
    /// Batches rejected because they named an unknown lane
    pub rejected_samples: u64,
    pub log_failures: u64,
}

/// Handle to a running driver task
pub struct LiveDriver {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<DriverStats>,
}

impl LiveDriver {
    /// Spawn the driver loop; must be called inside a tokio runtime
    pub fn start<C, S>(intersection: Intersection, period: Duration, clock: C, mut source: S) -> Self
    where
        C: Clock,
        S: ObservationSource,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut stats = DriverStats::default();
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(?period, "live driver started");

            loop {
                tokio::select! {
                    // Also fires when the handle is dropped
                    _ = stop_rx.changed() => break,

                    _ = ticker.tick() => {
                        let samples = source.sample();
                        if !samples.is_empty() {
                            if let Err(e) = intersection.observe_all(&samples) {
                                stats.rejected_samples += 1;
                                warn!(error = %e, "observation batch rejected");
                            }
                        }

                        let outcome = intersection.tick(clock.now());
                        stats.ticks += 1;
                        stats.transitions += outcome.transitions.len() as u64;
                        if outcome.log_error.is_some() {
                            stats.log_failures += 1;
                        }
                        for t in &outcome.transitions {
                            debug!(lane = %t.lane_id, phase = %t.phase, cause = ?t.cause, "transition");
                        }
                    }
                }
            }

            info!(ticks = stats.ticks, transitions = stats.transitions, "live driver stopped");
            stats
        });

        LiveDriver { stop_tx, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the loop to exit and wait for it
    pub async fn stop(self) -> DriverStats {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(stats) => stats,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => DriverStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::Phase;
    use junction_sched::SignalScheduler;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn intersection() -> Intersection {
        let lanes = (1..=4).map(LaneId::new);
        Intersection::new(SignalScheduler::with_default_config(lanes, Timestamp::ZERO).unwrap())
    }

    /// Advances one second per reading, then holds at `limit` seconds
    fn stepped_clock(limit: i64) -> impl Clock {
        let calls = Arc::new(AtomicI64::new(1));
        move || Timestamp::from_secs(calls.fetch_add(1, Ordering::Relaxed).min(limit))
    }

    async fn wait_for_ticks(intersection: &Intersection, ticks: u64) {
        for _ in 0..500 {
            if intersection.scheduler_stats().ticks >= ticks {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("driver did not reach {ticks} ticks");
    }

    #[tokio::test]
    async fn test_driver_applies_samples_and_ticks() {
        let intersection = intersection();
        let source = || vec![(LaneId::new(3), Observation::new(20, false))];
        let driver = LiveDriver::start(
            intersection.clone(),
            Duration::from_millis(2),
            stepped_clock(20),
            source,
        );

        wait_for_ticks(&intersection, 20).await;
        assert!(driver.is_running());
        let stats = driver.stop().await;

        assert!(stats.ticks >= 20);
        assert_eq!(stats.rejected_samples, 0);
        // Lane 4 expired at 10s, yellow until 13s, then lane 3 got 50s
        let status = intersection.status();
        assert_eq!(status.active_lane, LaneId::new(3));
        assert_eq!(status.lanes[2].phase, Phase::Green);
        assert_eq!(stats.transitions, 3);
    }

    #[tokio::test]
    async fn test_driver_counts_rejected_batches() {
        let intersection = intersection();
        let source = || vec![(LaneId::new(9), Observation::new(1, false))];
        let driver = LiveDriver::start(
            intersection.clone(),
            Duration::from_millis(2),
            stepped_clock(5),
            source,
        );

        wait_for_ticks(&intersection, 3).await;
        let stats = driver.stop().await;

        assert!(stats.rejected_samples >= 3);
        assert_eq!(stats.rejected_samples, stats.ticks);
    }

    #[tokio::test]
    async fn test_stop_ends_loop() {
        let intersection = intersection();
        let driver = LiveDriver::start(
            intersection.clone(),
            Duration::from_millis(1),
            WallClock,
            Vec::<(LaneId, Observation)>::new,
        );

        wait_for_ticks(&intersection, 1).await;
        driver.stop().await;
        let ticks = intersection.scheduler_stats().ticks;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(intersection.scheduler_stats().ticks, ticks);
    }
}
