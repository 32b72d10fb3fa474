//! Signal scheduler - the intersection state machine
//!
//! Per lane: `Red -> Green -> Yellow -> Red`. The scheduler is purely
//! call-driven: it has no timer, and its behaviour is a function of the
//! timestamp passed to [`SignalScheduler::tick`] and its prior state.
//!
//! Each tick runs, in order:
//! 1. Count down the active lane by the elapsed time (never negative)
//! 2. Preemption: an operator-forced lane, else the lowest-id Red lane with
//!    an ambulance, pulls right-of-way through a Yellow safety phase
//! 3. Normal expiry: Green -> Yellow, Yellow -> Red plus a skip-if-empty
//!    round-robin grant
//! 4. Record the tick time

use std::time::Duration;

use junction_core::{
    JunctionError, JunctionResult, Lane, LaneId, LaneState, Observation, Phase, Timestamp,
    Transition, TransitionCause,
};
use tracing::{debug, info};

use crate::{check_invariants, DurationPolicy, LaneRegistry, SchedulerConfig};

/// Scheduler counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub transitions: u64,
    pub preemptions: u64,
    pub forced_grants: u64,
    /// Ticks whose timestamp was earlier than the previous one
    pub clock_regressions: u64,
}

/// Intersection signal scheduler
///
/// The only writer of lane phases and countdowns. All mutation goes through
/// [`observe`](Self::observe), [`force_lane`](Self::force_lane) and
/// [`tick`](Self::tick); callers serialize access.
#[derive(Clone, Debug)]
pub struct SignalScheduler {
    registry: LaneRegistry,
    config: SchedulerConfig,
    policy: DurationPolicy,
    /// Lane currently in Yellow or Green
    active: LaneId,
    last_tick: Timestamp,
    /// Pending operator override
    forced: Option<LaneId>,
    stats: SchedulerStats,
}

impl SignalScheduler {
    /// Create a scheduler over a fixed lane set
    ///
    /// The highest id lane starts Green with the empty-lane grant, so the
    /// first expiry hands right-of-way to the lowest id.
    pub fn new(
        lanes: impl IntoIterator<Item = LaneId>,
        config: SchedulerConfig,
        start: Timestamp,
    ) -> JunctionResult<Self> {
        let mut registry = LaneRegistry::new(lanes)?;
        let policy = config.policy();
        let active = registry.last();
        if let Some(lane) = registry.get_mut(active) {
            lane.phase = Phase::Green;
            lane.time_remaining = policy.compute(0);
        }

        Ok(SignalScheduler {
            registry,
            config,
            policy,
            active,
            last_tick: start,
            forced: None,
            stats: SchedulerStats::default(),
        })
    }

    /// Create a scheduler with the default configuration
    pub fn with_default_config(
        lanes: impl IntoIterator<Item = LaneId>,
        start: Timestamp,
    ) -> JunctionResult<Self> {
        Self::new(lanes, SchedulerConfig::default(), start)
    }

    /// Record observed traffic for a lane
    pub fn observe(&mut self, lane_id: LaneId, vehicle_count: u32, has_ambulance: bool) -> JunctionResult<()> {
        self.registry.observe(lane_id, vehicle_count, has_ambulance)
    }

    /// Record observed traffic for several lanes; unknown ids reject the whole batch
    pub fn observe_all(&mut self, observations: &[(LaneId, Observation)]) -> JunctionResult<()> {
        self.registry.observe_all(observations)
    }

    /// Request right-of-way for a lane on the next ticks
    ///
    /// Served like ambulance preemption, ahead of any ambulance. A request
    /// for the lane that is already Green is dropped.
    pub fn force_lane(&mut self, lane_id: LaneId) -> JunctionResult<()> {
        let lane = self
            .registry
            .get(lane_id)
            .ok_or(JunctionError::InvalidLane(lane_id))?;

        if lane_id == self.active && lane.phase == Phase::Green {
            self.forced = None;
        } else {
            debug!(lane = %lane_id, "operator override queued");
            self.forced = Some(lane_id);
        }
        Ok(())
    }

    /// Advance the scheduler clock to `now`
    ///
    /// Never fails. A timestamp earlier than the previous tick counts as zero
    /// elapsed time. Returns one transition per phase change.
    pub fn tick(&mut self, now: Timestamp) -> Vec<Transition> {
        self.stats.ticks += 1;
        if now < self.last_tick {
            self.stats.clock_regressions += 1;
            debug!(?now, last = ?self.last_tick, "clock moved backwards, no time elapsed");
        }
        let elapsed = now - self.last_tick;

        if let Some(active) = self.registry.get_mut(self.active) {
            active.time_remaining = active.time_remaining.saturating_sub(elapsed);
        }

        let mut transitions = Vec::new();
        match self.preemption_target() {
            Some((target, cause)) => self.preempt(target, cause, now, &mut transitions),
            None => self.advance_cycle(now, &mut transitions),
        }

        self.last_tick = now;
        self.stats.transitions += transitions.len() as u64;
        debug_assert!(check_invariants(&self.registry, self.active).is_ok());
        transitions
    }

    /// Lane that should take right-of-way out of turn, if any
    fn preemption_target(&mut self) -> Option<(LaneId, TransitionCause)> {
        if let Some(forced) = self.forced {
            let already_green = forced == self.active
                && self.registry.get(forced).map(|l| l.phase) == Some(Phase::Green);
            if !already_green {
                return Some((forced, TransitionCause::Forced));
            }
            self.forced = None;
        }

        // BTreeMap iteration is ascending, so the lowest id wins ties
        self.registry
            .iter()
            .find(|lane| lane.has_ambulance && lane.phase == Phase::Red)
            .map(|lane| (lane.id, TransitionCause::Preemption))
    }

    fn preempt(
        &mut self,
        target: LaneId,
        cause: TransitionCause,
        now: Timestamp,
        out: &mut Vec<Transition>,
    ) {
        let current = self.active;
        let Some(active) = self.registry.get(current) else {
            return;
        };
        let (phase, remaining) = (active.phase, active.time_remaining);

        match phase {
            Phase::Green => {
                info!(from = %current, to = %target, ?cause, "cutting green phase short");
                // Never straight from Green to Red
                out.extend(self.set_phase(current, Phase::Yellow, self.config.yellow_duration, cause, now));
            }
            Phase::Yellow if !remaining.is_zero() => {}
            Phase::Yellow | Phase::Red => {
                if phase == Phase::Yellow {
                    out.extend(self.set_phase(current, Phase::Red, Duration::ZERO, cause, now));
                }
                out.extend(self.grant(target, cause, now));
                match cause {
                    TransitionCause::Forced => {
                        self.forced = None;
                        self.stats.forced_grants += 1;
                    }
                    _ => self.stats.preemptions += 1,
                }
                info!(lane = %target, ?cause, "right-of-way granted out of turn");
            }
        }
    }

    fn advance_cycle(&mut self, now: Timestamp, out: &mut Vec<Transition>) {
        let current = self.active;
        let Some(active) = self.registry.get(current) else {
            return;
        };
        if !active.time_remaining.is_zero() {
            return;
        }
        let phase = active.phase;

        match phase {
            Phase::Green => {
                out.extend(self.set_phase(
                    current,
                    Phase::Yellow,
                    self.config.yellow_duration,
                    TransitionCause::Expiry,
                    now,
                ));
            }
            Phase::Yellow | Phase::Red => {
                if phase == Phase::Yellow {
                    out.extend(self.set_phase(current, Phase::Red, Duration::ZERO, TransitionCause::Expiry, now));
                }
                let next = self.select_next();
                out.extend(self.grant(next, TransitionCause::Expiry, now));
            }
        }
    }

    /// First lane after the active one with vehicles or an ambulance
    ///
    /// Falls back to the immediate successor when no lane has demand, so the
    /// cycle keeps moving through empty lanes.
    fn select_next(&self) -> LaneId {
        let n = self.registry.len();
        (1..=n)
            .map(|step| self.registry.successor(self.active, step))
            .find(|id| {
                self.registry
                    .get(*id)
                    .is_some_and(|lane| lane.observation().has_demand())
            })
            .unwrap_or_else(|| self.registry.successor(self.active, 1))
    }

    /// Give a lane Green and make it the active lane
    fn grant(&mut self, lane_id: LaneId, cause: TransitionCause, now: Timestamp) -> Option<Transition> {
        let lane = self.registry.get(lane_id)?;
        let green = self.policy.grant(
            lane.vehicle_count,
            lane.has_ambulance,
            self.config.ambulance_min_green,
        );
        let transition = self.set_phase(lane_id, Phase::Green, green, cause, now);
        self.active = lane_id;
        transition
    }

    fn set_phase(
        &mut self,
        lane_id: LaneId,
        phase: Phase,
        duration: Duration,
        cause: TransitionCause,
        now: Timestamp,
    ) -> Option<Transition> {
        let lane = self.registry.get_mut(lane_id)?;
        lane.phase = phase;
        lane.time_remaining = duration;

        debug!(lane = %lane_id, %phase, ?duration, ?cause, "phase change");
        Some(Transition {
            lane_id,
            phase,
            vehicle_count: lane.vehicle_count,
            has_ambulance: lane.has_ambulance,
            duration_allocated: duration,
            at: now,
            cause,
        })
    }

    /// Ordered snapshot of every lane; pure read
    pub fn states(&self) -> Vec<LaneState> {
        self.registry.snapshot()
    }

    /// Lane currently holding right-of-way
    pub fn active_lane(&self) -> LaneId {
        self.active
    }

    pub fn lane(&self, lane_id: LaneId) -> Option<&Lane> {
        self.registry.get(lane_id)
    }

    pub fn lane_ids(&self) -> &[LaneId] {
        self.registry.ids()
    }

    pub fn registry(&self) -> &LaneRegistry {
        &self.registry
    }

    pub fn last_tick(&self) -> Timestamp {
        self.last_tick
    }

    pub fn pending_force(&self) -> Option<LaneId> {
        self.forced
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}
