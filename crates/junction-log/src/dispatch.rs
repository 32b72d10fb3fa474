//! Asynchronous log dispatch
//!
//! The scheduler's caller hands transitions to a [`LogDispatcher`], which
//! queues them on a bounded channel without waiting. A dedicated blocking
//! task drains the channel into the sink, so sink latency never delays a
//! tick. A full or closed queue is reported to the dispatching caller; the
//! scheduling decision that produced the record stands regardless.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use junction_core::{JunctionError, JunctionResult, Transition};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{EventLog, LogRecord};

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
}

/// Dispatcher counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records accepted onto the queue
    pub dispatched: u64,
    /// Records refused because the queue was full or closed
    pub dropped: u64,
    /// Records the sink accepted
    pub written: u64,
    /// Records the sink rejected
    pub failed: u64,
}

/// Fire-and-forget front end of a log sink
///
/// Must be created inside a tokio runtime. Clones share the same queue; the
/// writer stops once every clone is dropped.
#[derive(Clone, Debug)]
pub struct LogDispatcher {
    tx: mpsc::Sender<LogRecord>,
    counters: Arc<Counters>,
}

impl LogDispatcher {
    /// Start the writer task for `sink` with a queue of `capacity` records
    pub fn spawn(sink: Arc<dyn EventLog>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<LogRecord>(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let writer_counters = Arc::clone(&counters);

        let handle = tokio::task::spawn_blocking(move || {
            while let Some(record) = rx.blocking_recv() {
                match sink.append(&record) {
                    Ok(()) => {
                        writer_counters.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        writer_counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(lane = %record.lane_id, error = %e, "log sink rejected record");
                    }
                }
            }
            if let Err(e) = sink.flush() {
                warn!(error = %e, "log sink flush failed");
            }
            debug!("log writer stopped");
        });

        (LogDispatcher { tx, counters }, handle)
    }

    /// Queue one record per transition
    ///
    /// Every transition is attempted; the first failure is returned.
    pub fn dispatch(&self, transitions: &[Transition]) -> JunctionResult<()> {
        let mut first_error = None;
        for transition in transitions {
            if let Err(e) = self.dispatch_record(LogRecord::from(transition)) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Queue a single record without waiting
    pub fn dispatch_record(&self, record: LogRecord) -> JunctionResult<()> {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(lane = %record.lane_id, phase = %record.phase, "log queue full, record dropped");
                Err(JunctionError::LogSinkFailure("log queue full".into()))
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(JunctionError::LogSinkFailure("log writer stopped".into()))
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Drop this handle and wait for the writer to drain and flush
    ///
    /// The writer only stops once every clone of this dispatcher has been
    /// dropped. A clone kept alive elsewhere makes this wait forever; use
    /// [`LogDispatcher::shutdown_timeout`] when that cannot be ruled out.
    pub async fn shutdown(self, writer: JoinHandle<()>) -> JunctionResult<DispatchStats> {
        let counters = Arc::clone(&self.counters);
        drop(self);
        writer
            .await
            .map_err(|e| JunctionError::LogSinkFailure(format!("log writer panicked: {e}")))?;
        Ok(counters.snapshot())
    }

    /// [`LogDispatcher::shutdown`], giving up after `limit`
    ///
    /// On timeout the writer keeps running detached and drains once the
    /// remaining clones are dropped.
    pub async fn shutdown_timeout(
        self,
        writer: JoinHandle<()>,
        limit: Duration,
    ) -> JunctionResult<DispatchStats> {
        let counters = Arc::clone(&self.counters);
        drop(self);
        match tokio::time::timeout(limit, writer).await {
            Ok(joined) => {
                joined.map_err(|e| JunctionError::LogSinkFailure(format!("log writer panicked: {e}")))?;
                Ok(counters.snapshot())
            }
            Err(_) => {
                warn!(?limit, "log writer still has live handles");
                Err(JunctionError::LogSinkFailure(format!(
                    "log writer did not stop within {limit:?}"
                )))
            }
        }
    }
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLog;
    use junction_core::{LaneId, Phase, Timestamp, TransitionCause};
    use parking_lot::Mutex;

    fn transition(lane: u32, phase: Phase) -> Transition {
        Transition {
            lane_id: LaneId::new(lane),
            phase,
            vehicle_count: 1,
            has_ambulance: false,
            duration_allocated: Duration::from_secs(12),
            at: Timestamp::from_secs(1_700_000_000),
            cause: TransitionCause::Expiry,
        }
    }

    struct FailingLog;

    impl EventLog for FailingLog {
        fn append(&self, _record: &LogRecord) -> JunctionResult<()> {
            Err(JunctionError::LogSinkFailure("disk full".into()))
        }
    }

    struct GatedLog {
        gate: Mutex<()>,
        inner: MemoryLog,
    }

    impl EventLog for GatedLog {
        fn append(&self, record: &LogRecord) -> JunctionResult<()> {
            let _open = self.gate.lock();
            self.inner.append(record)
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_sink() {
        let sink = Arc::new(MemoryLog::new());
        let (dispatcher, writer) = LogDispatcher::spawn(sink.clone(), 16);

        dispatcher
            .dispatch(&[transition(4, Phase::Red), transition(1, Phase::Green)])
            .unwrap();
        let stats = dispatcher.shutdown(writer).await.unwrap();

        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.written, 2);
        let records = sink.records();
        assert_eq!(records[0].lane_id, LaneId::new(4));
        assert_eq!(records[1].phase, Phase::Green);
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted_not_propagated() {
        let (dispatcher, writer) = LogDispatcher::spawn(Arc::new(FailingLog), 4);

        assert!(dispatcher.dispatch(&[transition(1, Phase::Green)]).is_ok());
        let stats = dispatcher.shutdown(writer).await.unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.written, 0);
    }

    #[tokio::test]
    async fn test_full_queue_reports_failure() {
        let sink = Arc::new(GatedLog {
            gate: Mutex::new(()),
            inner: MemoryLog::new(),
        });
        let (dispatcher, writer) = LogDispatcher::spawn(sink.clone(), 1);

        let held = sink.gate.lock();
        let batch: Vec<_> = (1..=5).map(|lane| transition(lane, Phase::Green)).collect();
        let result = dispatcher.dispatch(&batch);
        drop(held);

        assert!(matches!(result, Err(JunctionError::LogSinkFailure(_))));
        // One record in the writer, at most one queued
        assert!(dispatcher.stats().dropped >= 3);

        let stats = dispatcher.shutdown(writer).await.unwrap();
        assert_eq!(stats.written as usize, sink.inner.len());
        assert_eq!(stats.dispatched + stats.dropped, 5);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_with_live_clone() {
        let sink = Arc::new(MemoryLog::new());
        let (dispatcher, writer) = LogDispatcher::spawn(sink.clone(), 8);
        let straggler = dispatcher.clone();

        dispatcher.dispatch(&[transition(2, Phase::Yellow)]).unwrap();
        let err = dispatcher
            .shutdown_timeout(writer, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, JunctionError::LogSinkFailure(_)));

        // The detached writer still drains once the last clone goes
        drop(straggler);
        for _ in 0..200 {
            if sink.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_completes_when_sole_handle() {
        let sink = Arc::new(MemoryLog::new());
        let (dispatcher, writer) = LogDispatcher::spawn(sink.clone(), 8);

        dispatcher
            .dispatch(&[transition(1, Phase::Green), transition(1, Phase::Yellow)])
            .unwrap();
        let stats = dispatcher
            .shutdown_timeout(writer, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(stats.written, 2);
    }
}
