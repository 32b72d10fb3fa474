//! Junction Core - Fundamental types for intersection signal control
//!
//! This crate defines the types shared by every junction crate:
//! - Identifiers (LaneId)
//! - Time primitives (Timestamp)
//! - Lane state, phases and read-only snapshots
//! - Phase transition events
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod lane;
pub mod event;
pub mod error;

pub use id::*;
pub use time::*;
pub use lane::*;
pub use event::*;
pub use error::*;
