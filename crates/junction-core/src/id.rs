//! Identity types for junction lanes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lane identity - one directional approach into the intersection
///
/// Ordering is numeric and drives every tie-break in the scheduler.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneId(pub u32);

impl LaneId {
    #[inline]
    pub fn new(id: u32) -> Self {
        LaneId(id)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for LaneId {
    fn from(id: u32) -> Self {
        LaneId(id)
    }
}

impl fmt::Debug for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lane({})", self.0)
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
