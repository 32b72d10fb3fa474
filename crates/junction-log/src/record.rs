//! Log record schema and queries

use std::time::Duration;

use junction_core::{LaneId, Phase, Timestamp, Transition};
use serde::{Deserialize, Serialize};

/// One append-only log entry, written on every phase change
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Written as RFC 3339; times before the Unix epoch cannot be serialized
    #[serde(with = "rfc3339")]
    pub timestamp: Timestamp,
    pub lane_id: LaneId,
    pub vehicle_count: u32,
    pub phase: Phase,
    /// Seconds granted in the new phase
    pub duration_allocated: f64,
    pub has_ambulance: bool,
}

impl LogRecord {
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_allocated).unwrap_or(Duration::ZERO)
    }
}

impl From<&Transition> for LogRecord {
    fn from(t: &Transition) -> Self {
        LogRecord {
            timestamp: t.at,
            lane_id: t.lane_id,
            vehicle_count: t.vehicle_count,
            phase: t.phase,
            duration_allocated: t.duration_allocated.as_secs_f64(),
            has_ambulance: t.has_ambulance,
        }
    }
}

/// Filter over log records; bounds are inclusive
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub lane: Option<LaneId>,
}

impl LogQuery {
    pub fn all() -> Self {
        LogQuery::default()
    }

    pub fn since(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    pub fn lane(mut self, lane: LaneId) -> Self {
        self.lane = Some(lane);
        self
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        self.start.map_or(true, |s| record.timestamp >= s)
            && self.end.map_or(true, |e| record.timestamp <= e)
            && self.lane.map_or(true, |l| record.lane_id == l)
    }
}

/// RFC 3339 timestamps with microsecond precision
///
/// RFC 3339 has no pre-epoch form here, so negative timestamps are rejected
/// rather than clamped to the epoch.
mod rfc3339 {
    use junction_core::Timestamp;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::UNIX_EPOCH;

    pub fn serialize<S: Serializer>(t: &Timestamp, s: S) -> Result<S::Ok, S::Error> {
        if *t < Timestamp::ZERO {
            return Err(S::Error::custom(format!("timestamp {t:?} is before the Unix epoch")));
        }
        let text = humantime::format_rfc3339_micros(t.to_system_time()).to_string();
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Timestamp, D::Error> {
        let text = String::deserialize(d)?;
        let time = humantime::parse_rfc3339_weak(&text).map_err(serde::de::Error::custom)?;
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::de::Error::custom)?;
        let micros = i64::try_from(since_epoch.as_micros()).map_err(serde::de::Error::custom)?;
        Ok(Timestamp::from_micros(micros))
    }
}
