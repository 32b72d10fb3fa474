//! Request/response mapping
//!
//! Transport-agnostic message types for remote control of an intersection.
//! A transport layer (HTTP, a message bus, a CLI) decodes these, calls
//! [`crate::Intersection::handle`], and encodes the response.

use std::collections::BTreeMap;

use junction_core::{LaneId, LaneState, Timestamp, Transition};
use junction_log::{LogQuery, LogRecord};
use serde::{Deserialize, Serialize};

/// Snapshot of the whole intersection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Time of the last tick
    pub timestamp: Timestamp,
    pub active_lane: LaneId,
    pub lanes: Vec<LaneState>,
}

/// Fresh observation for one lane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneUpdate {
    pub vehicles: u32,
    /// Keeps the previous flag when absent
    #[serde(default)]
    pub ambulance: Option<bool>,
}

/// One observation per listed lane, followed by one tick
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub lanes: BTreeMap<LaneId, LaneUpdate>,
}

impl UpdateRequest {
    pub fn new() -> Self {
        UpdateRequest::default()
    }

    pub fn lane(mut self, lane: LaneId, vehicles: u32, ambulance: Option<bool>) -> Self {
        self.lanes.insert(lane, LaneUpdate { vehicles, ambulance });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub state: StatusResponse,
    pub transitions: Vec<Transition>,
    /// Set when the transitions could not be queued for logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_error: Option<String>,
}

/// Log history filter; bounds are inclusive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    #[serde(default)]
    pub start: Option<Timestamp>,
    #[serde(default)]
    pub end: Option<Timestamp>,
    #[serde(default)]
    pub lane: Option<LaneId>,
}

impl From<HistoryRequest> for LogQuery {
    fn from(req: HistoryRequest) -> Self {
        LogQuery {
            start: req.start,
            end: req.end,
            lane: req.lane,
        }
    }
}

/// Externally tagged: `"status"`, `{"update": {...}}`, `{"force": {"lane": 2}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Status,
    Update(UpdateRequest),
    Force { lane: LaneId },
    History(HistoryRequest),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Status(StatusResponse),
    Updated(UpdateResponse),
    Forced { lane: LaneId },
    History { records: Vec<LogRecord> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_from_json() {
        let req: Request = serde_json::from_str(
            r#"{"update": {"lanes": {"1": {"vehicles": 5}, "3": {"vehicles": 0, "ambulance": true}}}}"#,
        )
        .unwrap();

        let Request::Update(update) = req else {
            panic!("expected update request");
        };
        assert_eq!(update.lanes[&LaneId::new(1)].ambulance, None);
        assert_eq!(update.lanes[&LaneId::new(3)].ambulance, Some(true));
    }

    #[test]
    fn test_negative_vehicle_count_rejected() {
        let parsed: Result<UpdateRequest, _> =
            serde_json::from_str(r#"{"lanes": {"1": {"vehicles": -2}}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_request_is_bare_string() {
        let req: Request = serde_json::from_str(r#""status""#).unwrap();
        assert_eq!(req, Request::Status);
    }

    #[test]
    fn test_history_request_to_query() {
        let req: Request =
            serde_json::from_str(r#"{"history": {"lane": 2, "start": 1000000}}"#).unwrap();
        let Request::History(history) = req else {
            panic!("expected history request");
        };

        let query = LogQuery::from(history);
        assert_eq!(query.lane, Some(LaneId::new(2)));
        assert_eq!(query.start, Some(Timestamp::from_secs(1)));
        assert_eq!(query.end, None);
    }
}
