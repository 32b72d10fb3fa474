//! Traffic generation for simulated intersections
//!
//! Two patterns:
//! - Queued: vehicles arrive per lane with a fixed probability each step and
//!   leave only while their lane is green. Ambulances join the queue rarely
//!   and clear once their lane has been given green.
//! - Random: every step each lane reports an independent random count and
//!   ambulance flag, with no memory between steps.

use junction_core::{LaneId, LaneState, Observation, Phase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How lane observations evolve between steps
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPattern {
    Queued {
        /// Arrival probability per step, by lane position; missing entries use the last one
        arrival: Vec<f64>,
        /// Vehicles leaving a green lane per step
        departures_per_step: u32,
        /// Chance that an arriving vehicle is an ambulance
        ambulance_probability: f64,
    },
    Random {
        max_count: u32,
        ambulance_probability: f64,
    },
}

impl TrafficPattern {
    /// Uneven four-way junction with rare ambulances
    pub fn four_way() -> Self {
        TrafficPattern::Queued {
            arrival: vec![0.3, 0.4, 0.2, 0.3],
            departures_per_step: 1,
            ambulance_probability: 0.01,
        }
    }

    /// Heavy arrivals on every lane
    pub fn congested() -> Self {
        TrafficPattern::Queued {
            arrival: vec![0.8],
            departures_per_step: 1,
            ambulance_probability: 0.01,
        }
    }

    /// Independent counts in 0..=20, ambulance with probability 0.05
    pub fn random() -> Self {
        TrafficPattern::Random {
            max_count: 20,
            ambulance_probability: 0.05,
        }
    }

    /// No traffic at all
    pub fn empty() -> Self {
        TrafficPattern::Queued {
            arrival: vec![0.0],
            departures_per_step: 1,
            ambulance_probability: 0.0,
        }
    }
}

impl Default for TrafficPattern {
    fn default() -> Self {
        Self::four_way()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Queue {
    vehicles: u32,
    ambulance: bool,
}

/// Seeded generator of per-step lane observations
#[derive(Clone, Debug)]
pub struct TrafficGenerator {
    lanes: Vec<LaneId>,
    pattern: TrafficPattern,
    queues: Vec<Queue>,
    rng: StdRng,
    arrivals: u64,
    departures: u64,
}

impl TrafficGenerator {
    pub fn new(lanes: &[LaneId], pattern: TrafficPattern, seed: u64) -> Self {
        TrafficGenerator {
            lanes: lanes.to_vec(),
            pattern,
            queues: vec![Queue::default(); lanes.len()],
            rng: StdRng::seed_from_u64(seed),
            arrivals: 0,
            departures: 0,
        }
    }

    pub fn pattern(&self) -> &TrafficPattern {
        &self.pattern
    }

    /// Vehicles that have arrived so far (queued pattern only)
    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    /// Vehicles that have crossed so far (queued pattern only)
    pub fn departures(&self) -> u64 {
        self.departures
    }

    /// Advance one step given the signal states, returning fresh observations
    pub fn step(&mut self, states: &[LaneState]) -> Vec<(LaneId, Observation)> {
        match self.pattern.clone() {
            TrafficPattern::Queued {
                arrival,
                departures_per_step,
                ambulance_probability,
            } => self.step_queued(states, &arrival, departures_per_step, ambulance_probability),
            TrafficPattern::Random {
                max_count,
                ambulance_probability,
            } => self.step_random(max_count, ambulance_probability),
        }
    }

    fn step_queued(
        &mut self,
        states: &[LaneState],
        arrival: &[f64],
        departures_per_step: u32,
        ambulance_probability: f64,
    ) -> Vec<(LaneId, Observation)> {
        let mut out = Vec::with_capacity(self.lanes.len());

        for (i, &lane) in self.lanes.iter().enumerate() {
            let green = states
                .iter()
                .any(|s| s.lane_id == lane && s.phase == Phase::Green);
            let queue = &mut self.queues[i];

            if green {
                let leaving = queue.vehicles.min(departures_per_step);
                queue.vehicles -= leaving;
                self.departures += u64::from(leaving);
                // Ambulances go first
                queue.ambulance = false;
            }

            let p = arrival
                .get(i)
                .or(arrival.last())
                .copied()
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            if self.rng.gen_bool(p) {
                queue.vehicles = queue.vehicles.saturating_add(1);
                self.arrivals += 1;
                if self.rng.gen_bool(ambulance_probability.clamp(0.0, 1.0)) {
                    queue.ambulance = true;
                }
            }

            out.push((lane, Observation::new(queue.vehicles, queue.ambulance)));
        }
        out
    }

    fn step_random(&mut self, max_count: u32, ambulance_probability: f64) -> Vec<(LaneId, Observation)> {
        let p = ambulance_probability.clamp(0.0, 1.0);
        self.lanes
            .iter()
            .map(|&lane| {
                let count = self.rng.gen_range(0..=max_count);
                let ambulance = self.rng.gen_bool(p);
                (lane, Observation::new(count, ambulance))
            })
            .collect()
    }
}
