//! Signal safety invariants
//!
//! These must hold after every scheduler entry point returns:
//!
//! 1. **Single right-of-way** - at most one lane is Yellow or Green
//! 2. **Idle countdowns** - every lane other than the active one has zero time remaining
//! 3. **Active lane holds right-of-way** - the active lane is Yellow or Green

use std::fmt;

use junction_core::LaneId;
use serde::{Deserialize, Serialize};

use crate::LaneRegistry;

/// The signal safety invariants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    SingleRightOfWay,
    IdleCountdowns,
    ActiveHoldsRightOfWay,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::SingleRightOfWay => "single right-of-way",
            Invariant::IdleCountdowns => "idle countdowns",
            Invariant::ActiveHoldsRightOfWay => "active lane holds right-of-way",
        };
        f.write_str(name)
    }
}

/// A broken invariant and the lane that broke it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: Invariant,
    pub lane: LaneId,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violated at lane {}", self.invariant, self.lane)
    }
}

/// Check all invariants against a registry and its active lane
pub fn check_invariants(registry: &LaneRegistry, active: LaneId) -> Result<(), Violation> {
    let mut holders = registry.iter().filter(|lane| lane.phase.is_active());
    if let (Some(_), Some(second)) = (holders.next(), holders.next()) {
        return Err(Violation {
            invariant: Invariant::SingleRightOfWay,
            lane: second.id,
        });
    }

    if let Some(lane) = registry
        .iter()
        .find(|lane| lane.id != active && !lane.time_remaining.is_zero())
    {
        return Err(Violation {
            invariant: Invariant::IdleCountdowns,
            lane: lane.id,
        });
    }

    match registry.get(active) {
        Some(lane) if lane.phase.is_active() => Ok(()),
        _ => Err(Violation {
            invariant: Invariant::ActiveHoldsRightOfWay,
            lane: active,
        }),
    }
}
