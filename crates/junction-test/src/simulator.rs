//! Intersection Simulator - fixed-step simulation of one junction
//!
//! Simulates:
//! - Traffic arriving and clearing per lane
//! - The scheduler ticking on a simulated clock
//! - Per-lane service statistics
//! - A safety check after every step

use std::sync::Arc;
use std::time::Duration;

use junction_core::{JunctionResult, LaneId, Phase, Timestamp, Transition};
use junction_log::{EventLog, LogRecord};
use junction_sched::{check_invariants, SchedulerConfig, SignalScheduler, Violation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{TrafficGenerator, TrafficPattern};

/// Simulation parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub lanes: Vec<LaneId>,
    pub scheduler: SchedulerConfig,
    pub pattern: TrafficPattern,
    /// Simulated time per step
    pub step: Duration,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            lanes: (1..=4).map(LaneId::new).collect(),
            scheduler: SchedulerConfig::default(),
            pattern: TrafficPattern::four_way(),
            step: Duration::from_secs(1),
            seed: 0,
        }
    }
}

/// Service received by one lane
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneStats {
    pub lane_id: LaneId,
    /// Sum of the lane's vehicle count over every green step
    pub total_vehicles: u64,
    pub total_green_time: Duration,
    /// Green seconds per counted vehicle; zero when nothing was counted
    pub avg_time_per_vehicle: f64,
}

impl LaneStats {
    fn new(lane_id: LaneId) -> Self {
        LaneStats {
            lane_id,
            ..LaneStats::default()
        }
    }

    fn finalize(&mut self) {
        self.avg_time_per_vehicle = if self.total_vehicles == 0 {
            0.0
        } else {
            self.total_green_time.as_secs_f64() / self.total_vehicles as f64
        };
    }
}

/// Simulation result and statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub total_steps: u64,
    pub elapsed: Duration,
    pub lanes: Vec<LaneStats>,
    pub transitions: u64,
    pub preemptions: u64,
    pub forced_grants: u64,
    /// Steps that ended with a safety violation
    pub violations: Vec<(u64, Violation)>,
    /// Records the attached log refused
    pub log_failures: u64,
}

impl SimulationResult {
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn lane(&self, lane_id: LaneId) -> Option<&LaneStats> {
        self.lanes.iter().find(|l| l.lane_id == lane_id)
    }

    /// Share of elapsed time each lane spent green
    pub fn green_share(&self, lane_id: LaneId) -> f64 {
        match self.lane(lane_id) {
            Some(stats) if !self.elapsed.is_zero() => {
                stats.total_green_time.as_secs_f64() / self.elapsed.as_secs_f64()
            }
            _ => 0.0,
        }
    }
}

/// Fixed-step simulation driving a scheduler with generated traffic
pub struct IntersectionSimulator {
    scheduler: SignalScheduler,
    traffic: TrafficGenerator,
    step: Duration,
    now: Timestamp,
    result: SimulationResult,
    log: Option<Arc<dyn EventLog>>,
}

impl IntersectionSimulator {
    pub fn new(config: SimulationConfig) -> JunctionResult<Self> {
        let scheduler = SignalScheduler::new(config.lanes.iter().copied(), config.scheduler, Timestamp::ZERO)?;
        let lanes = scheduler.lane_ids().to_vec();
        let traffic = TrafficGenerator::new(&lanes, config.pattern, config.seed);

        Ok(IntersectionSimulator {
            scheduler,
            traffic,
            step: config.step,
            now: Timestamp::ZERO,
            result: SimulationResult {
                lanes: lanes.into_iter().map(LaneStats::new).collect(),
                ..SimulationResult::default()
            },
            log: None,
        })
    }

    /// Write every transition to `log` as it happens
    pub fn with_log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Execute one step: sample traffic, tick, check, record
    pub fn step(&mut self) -> JunctionResult<Vec<Transition>> {
        let observations = self.traffic.step(&self.scheduler.states());
        self.scheduler.observe_all(&observations)?;

        self.now = self.now + self.step;
        let transitions = self.scheduler.tick(self.now);

        self.result.total_steps += 1;
        self.result.elapsed += self.step;
        self.result.transitions += transitions.len() as u64;

        if let Err(violation) = check_invariants(self.scheduler.registry(), self.scheduler.active_lane()) {
            warn!(step = self.result.total_steps, ?violation, "safety invariant violated");
            self.result.violations.push((self.result.total_steps, violation));
        }

        for (stats, lane) in self.result.lanes.iter_mut().zip(self.scheduler.registry().iter()) {
            if lane.phase == Phase::Green {
                stats.total_vehicles += u64::from(lane.vehicle_count);
                stats.total_green_time += self.step;
            }
        }

        if let Some(log) = &self.log {
            for t in &transitions {
                if log.append(&LogRecord::from(t)).is_err() {
                    self.result.log_failures += 1;
                }
            }
        }

        Ok(transitions)
    }

    /// Run for `steps` steps and return the accumulated result
    pub fn run(&mut self, steps: u64) -> JunctionResult<SimulationResult> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(self.result())
    }

    /// Run until `duration` of simulated time has passed
    pub fn run_for(&mut self, duration: Duration) -> JunctionResult<SimulationResult> {
        let step = self.step.as_micros().max(1);
        let steps = (duration.as_micros() / step) as u64;
        self.run(steps)
    }

    /// Statistics so far
    pub fn result(&self) -> SimulationResult {
        let mut result = self.result.clone();
        let stats = self.scheduler.stats();
        result.preemptions = stats.preemptions;
        result.forced_grants = stats.forced_grants;
        for lane in &mut result.lanes {
            lane.finalize();
        }
        if let Some(log) = &self.log {
            if log.flush().is_err() {
                result.log_failures += 1;
            }
        }
        result
    }

    pub fn scheduler(&self) -> &SignalScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut SignalScheduler {
        &mut self.scheduler
    }

    pub fn traffic(&self) -> &TrafficGenerator {
        &self.traffic
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }
}

/// Predefined scenarios
pub mod scenarios {
    use super::*;

    /// Four lanes, uneven arrivals, default timings
    pub fn four_way(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            ..SimulationConfig::default()
        }
    }

    /// Four lanes under heavy load with rush-hour timings
    pub fn rush_hour(seed: u64) -> SimulationConfig {
        SimulationConfig {
            scheduler: SchedulerConfig::rush_hour(),
            pattern: TrafficPattern::congested(),
            seed,
            ..SimulationConfig::default()
        }
    }

    /// Random counts each step, frequent ambulances
    pub fn random_sampling(seed: u64) -> SimulationConfig {
        SimulationConfig {
            pattern: TrafficPattern::random(),
            seed,
            ..SimulationConfig::default()
        }
    }

    /// Ambulances on most arrivals
    pub fn emergency_heavy(seed: u64) -> SimulationConfig {
        SimulationConfig {
            pattern: TrafficPattern::Queued {
                arrival: vec![0.3, 0.4, 0.2, 0.3],
                departures_per_step: 1,
                ambulance_probability: 0.2,
            },
            seed,
            ..SimulationConfig::default()
        }
    }
}
