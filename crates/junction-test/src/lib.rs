//! Junction Test Harness - traffic simulation and scheduler validation
//!
//! This crate provides:
//! - Seeded traffic generation (queued arrivals or random sampling)
//! - A fixed-step intersection simulator with per-lane statistics
//! - Safety checks after every simulated step
//! - Predefined scenarios and scheduler benchmarks

pub mod traffic;
pub mod simulator;

pub use traffic::*;
pub use simulator::*;
