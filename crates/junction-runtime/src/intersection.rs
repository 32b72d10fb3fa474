//! Intersection - serialized access to one signal scheduler
//!
//! All `observe`/`tick` calls go through one mutex, so exactly one writer
//! mutates scheduler state at a time. Readers take a snapshot under the same
//! lock and release it immediately. Transitions are queued on the log
//! dispatcher before the lock is released, so the log sees phase changes in
//! the order the scheduler made them. Queuing never blocks.

use std::sync::Arc;
use std::time::Duration;

use junction_core::{
    JunctionError, JunctionResult, LaneId, LaneState, Observation, Timestamp, Transition,
};
use junction_log::{DispatchStats, EventLog, LogDispatcher, LogQuery, LogRecord, QueryableLog};
use junction_sched::{SchedulerStats, SignalScheduler};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{Request, Response, RuntimeConfig, StatusResponse, UpdateRequest, UpdateResponse};

/// Result of one tick
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub transitions: Vec<Transition>,
    /// Set when the transitions could not be queued for logging
    pub log_error: Option<JunctionError>,
}

#[derive(Clone)]
struct LogHandle {
    dispatcher: LogDispatcher,
    history: Arc<dyn QueryableLog>,
}

/// Shared handle to an intersection
///
/// Cheap to clone; clones drive the same scheduler.
#[derive(Clone)]
pub struct Intersection {
    scheduler: Arc<Mutex<SignalScheduler>>,
    log: Option<LogHandle>,
}

impl Intersection {
    /// Intersection without a transition log
    pub fn new(scheduler: SignalScheduler) -> Self {
        Intersection {
            scheduler: Arc::new(Mutex::new(scheduler)),
            log: None,
        }
    }

    /// Intersection logging through `dispatcher`, with `history` answering queries
    pub fn with_log(
        scheduler: SignalScheduler,
        dispatcher: LogDispatcher,
        history: Arc<dyn QueryableLog>,
    ) -> Self {
        Intersection {
            scheduler: Arc::new(Mutex::new(scheduler)),
            log: Some(LogHandle {
                dispatcher,
                history,
            }),
        }
    }

    /// Build scheduler and log from configuration
    ///
    /// Must run inside a tokio runtime. The returned handle is the log
    /// writer; pass it to [`Intersection::shutdown`].
    pub fn start(config: &RuntimeConfig, start: Timestamp) -> JunctionResult<(Self, JoinHandle<()>)> {
        let scheduler = config.build_scheduler(start)?;
        let history = config.open_log()?;
        let sink: Arc<dyn EventLog> = Arc::new(Arc::clone(&history));
        let (dispatcher, writer) = LogDispatcher::spawn(sink, config.log_capacity);

        debug!(lanes = config.lanes.len(), "intersection started");
        Ok((Self::with_log(scheduler, dispatcher, history), writer))
    }

    pub fn observe(&self, lane_id: LaneId, vehicle_count: u32, has_ambulance: bool) -> JunctionResult<()> {
        self.scheduler.lock().observe(lane_id, vehicle_count, has_ambulance)
    }

    pub fn observe_all(&self, observations: &[(LaneId, Observation)]) -> JunctionResult<()> {
        self.scheduler.lock().observe_all(observations)
    }

    pub fn force_lane(&self, lane_id: LaneId) -> JunctionResult<()> {
        self.scheduler.lock().force_lane(lane_id)
    }

    /// Advance the scheduler to `now` and log any transitions
    ///
    /// The scheduling decision is never undone by a logging failure.
    pub fn tick(&self, now: Timestamp) -> TickOutcome {
        let mut scheduler = self.scheduler.lock();
        let transitions = scheduler.tick(now);
        let log_error = self.dispatch(&transitions).err();
        drop(scheduler);
        TickOutcome {
            transitions,
            log_error,
        }
    }

    /// Ordered lane snapshot
    pub fn states(&self) -> Vec<LaneState> {
        self.scheduler.lock().states()
    }

    pub fn status(&self) -> StatusResponse {
        status_of(&self.scheduler.lock())
    }

    /// Apply an update request: observe every listed lane, then tick once
    ///
    /// Lane ids are validated before anything is applied; an unknown id
    /// rejects the whole request.
    pub fn update(&self, request: &UpdateRequest, now: Timestamp) -> JunctionResult<UpdateResponse> {
        let (transitions, state, log_error) = {
            let mut scheduler = self.scheduler.lock();
            let mut observations = Vec::with_capacity(request.lanes.len());
            for (&lane_id, update) in &request.lanes {
                let lane = scheduler
                    .lane(lane_id)
                    .ok_or(JunctionError::InvalidLane(lane_id))?;
                let has_ambulance = update.ambulance.unwrap_or(lane.has_ambulance);
                observations.push((lane_id, Observation::new(update.vehicles, has_ambulance)));
            }
            scheduler.observe_all(&observations)?;
            let transitions = scheduler.tick(now);
            let log_error = self.dispatch(&transitions).err().map(|e| e.to_string());
            (transitions, status_of(&scheduler), log_error)
        };

        Ok(UpdateResponse {
            state,
            transitions,
            log_error,
        })
    }

    /// Logged transitions matching `query`; empty without a log
    pub fn history(&self, query: &LogQuery) -> JunctionResult<Vec<LogRecord>> {
        match &self.log {
            Some(log) => log.history.query_records(query),
            None => Ok(Vec::new()),
        }
    }

    /// Serve one request
    pub fn handle(&self, request: Request, now: Timestamp) -> JunctionResult<Response> {
        match request {
            Request::Status => Ok(Response::Status(self.status())),
            Request::Update(update) => self.update(&update, now).map(Response::Updated),
            Request::Force { lane } => {
                self.force_lane(lane)?;
                Ok(Response::Forced { lane })
            }
            Request::History(history) => {
                let query = LogQuery::from(history);
                let records = self.history(&query)?;
                Ok(Response::History { records })
            }
        }
    }

    /// Run `f` against the scheduler under the lock
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&SignalScheduler) -> R) -> R {
        let scheduler = self.scheduler.lock();
        f(&*scheduler)
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.lock().stats().clone()
    }

    pub fn log_stats(&self) -> Option<DispatchStats> {
        self.log.as_ref().map(|log| log.dispatcher.stats())
    }

    /// Drop this handle and wait for the log writer to drain
    ///
    /// Only completes once every clone of this intersection is gone,
    /// including clones held by a running [`crate::LiveDriver`]. Stop the
    /// driver first, or use [`Intersection::shutdown_timeout`].
    pub async fn shutdown(self, writer: JoinHandle<()>) -> JunctionResult<Option<DispatchStats>> {
        match self.log {
            Some(log) => log.dispatcher.shutdown(writer).await.map(Some),
            None => {
                writer.abort();
                Ok(None)
            }
        }
    }

    /// [`Intersection::shutdown`], failing with `LogSinkFailure` after `limit`
    pub async fn shutdown_timeout(
        self,
        writer: JoinHandle<()>,
        limit: Duration,
    ) -> JunctionResult<Option<DispatchStats>> {
        match self.log {
            Some(log) => log.dispatcher.shutdown_timeout(writer, limit).await.map(Some),
            None => {
                writer.abort();
                Ok(None)
            }
        }
    }

    fn dispatch(&self, transitions: &[Transition]) -> JunctionResult<()> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        if transitions.is_empty() {
            return Ok(());
        }
        log.dispatcher.dispatch(transitions).map_err(|e| {
            warn!(error = %e, count = transitions.len(), "transitions not logged");
            e
        })
    }
}

fn status_of(scheduler: &SignalScheduler) -> StatusResponse {
    StatusResponse {
        timestamp: scheduler.last_tick(),
        active_lane: scheduler.active_lane(),
        lanes: scheduler.states(),
    }
}
