//! Junction Runtime - intersection service around the signal scheduler
//!
//! This crate wires the scheduler to the outside world:
//! - Runtime configuration
//! - A lock-guarded intersection handle (single writer, snapshot readers)
//! - Transport-agnostic request/response mapping
//! - A live driver ticking on the wall clock
//! - The detection adaptor (object detections to lane observations)
//! - Tracing setup

pub mod config;
pub mod telemetry;
pub mod intersection;
pub mod service;
pub mod driver;
pub mod detection;

pub use config::*;
pub use telemetry::*;
pub use intersection::*;
pub use service::*;
pub use driver::*;
pub use detection::*;
