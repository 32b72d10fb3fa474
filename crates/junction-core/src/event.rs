//! Phase transition events
//!
//! Every phase change the scheduler makes is reported as a [`Transition`].
//! The scheduler only returns them; delivering them to a log sink is the
//! caller's job.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LaneId, Phase, Timestamp};

/// Why a transition happened
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Countdown reached zero in the normal cycle
    Expiry,
    /// An ambulance-flagged lane took right-of-way
    Preemption,
    /// An operator forced a lane
    Forced,
}

/// One lane changing phase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub lane_id: LaneId,
    /// Phase the lane moved into
    pub phase: Phase,
    pub vehicle_count: u32,
    pub has_ambulance: bool,
    /// Time granted in the new phase (zero for Red)
    pub duration_allocated: Duration,
    pub at: Timestamp,
    pub cause: TransitionCause,
}
