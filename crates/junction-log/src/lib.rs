//! Junction Log - transition log sink
//!
//! This crate provides:
//! - The append-only log record schema
//! - The EventLog sink contract
//! - In-memory and JSON-lines sinks
//! - A bounded asynchronous dispatcher that keeps sink I/O off the tick path
//! - Record queries by time range and lane

pub mod record;
pub mod sink;
pub mod dispatch;

pub use record::*;
pub use sink::*;
pub use dispatch::*;
