//! Lane state and phases
//!
//! A lane is one directional approach into the intersection. Lanes are created
//! once, at scheduler construction, and never added or removed afterwards.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::LaneId;

/// Signal phase shown to a lane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Red,
    Yellow,
    Green,
}

impl Phase {
    /// Yellow and Green both hold right-of-way
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Yellow | Phase::Green)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Red => "red",
            Phase::Yellow => "yellow",
            Phase::Green => "green",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally observed traffic for one lane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub vehicle_count: u32,
    pub has_ambulance: bool,
}

impl Observation {
    pub fn new(vehicle_count: u32, has_ambulance: bool) -> Self {
        Observation {
            vehicle_count,
            has_ambulance,
        }
    }

    /// A lane with demand is worth a green phase
    #[inline]
    pub fn has_demand(&self) -> bool {
        self.vehicle_count > 0 || self.has_ambulance
    }
}

/// Full per-lane state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lane {
    pub id: LaneId,
    pub phase: Phase,
    /// Countdown for the active lane; always zero for Red lanes
    pub time_remaining: Duration,
    pub vehicle_count: u32,
    pub has_ambulance: bool,
}

impl Lane {
    /// New lane, Red, with no observed traffic
    pub fn new(id: LaneId) -> Self {
        Lane {
            id,
            phase: Phase::Red,
            time_remaining: Duration::ZERO,
            vehicle_count: 0,
            has_ambulance: false,
        }
    }

    pub fn observation(&self) -> Observation {
        Observation::new(self.vehicle_count, self.has_ambulance)
    }

    /// Read-only snapshot with the countdown floored to whole seconds
    pub fn snapshot(&self) -> LaneState {
        LaneState {
            lane_id: self.id,
            phase: self.phase,
            time_remaining: self.time_remaining.as_secs(),
            vehicle_count: self.vehicle_count,
            has_ambulance: self.has_ambulance,
        }
    }
}

/// Queryable view of a lane, as returned by status queries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneState {
    pub lane_id: LaneId,
    pub phase: Phase,
    /// Whole seconds remaining
    pub time_remaining: u64,
    pub vehicle_count: u32,
    pub has_ambulance: bool,
}
