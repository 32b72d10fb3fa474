//! Junction Scheduler - the intersection signal state machine
//!
//! This crate implements the signal controller:
//! - Duration policy (occupancy-proportional green time, clamped)
//! - Lane registry (observed traffic per lane)
//! - Cyclic schedule with skip-if-empty sequencing
//! - Yellow safety transition
//! - Ambulance preemption and operator override
//! - Invariant checks

pub mod policy;
pub mod registry;
pub mod invariants;
pub mod scheduler;

pub use policy::*;
pub use registry::*;
pub use invariants::*;
pub use scheduler::*;
