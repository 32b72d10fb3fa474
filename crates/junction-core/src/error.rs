//! Error types for junction

use thiserror::Error;

use crate::LaneId;

/// Core junction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JunctionError {
    // Input errors
    #[error("Invalid lane: {0}")]
    InvalidLane(LaneId),

    // Configuration errors
    #[error("Lane set is empty")]
    EmptyLaneSet,

    #[error("Duplicate lane id: {0}")]
    DuplicateLane(LaneId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Log sink errors
    #[error("Log sink failure: {0}")]
    LogSinkFailure(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl JunctionError {
    /// Errors that can only happen while building a scheduler
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            JunctionError::EmptyLaneSet
                | JunctionError::DuplicateLane(_)
                | JunctionError::InvalidConfig(_)
        )
    }
}

impl From<std::io::Error> for JunctionError {
    fn from(e: std::io::Error) -> Self {
        JunctionError::Io(e.to_string())
    }
}

/// Result type for junction operations
pub type JunctionResult<T> = Result<T, JunctionError>;
