//! Runtime configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use junction_core::{JunctionError, JunctionResult, LaneId, Timestamp};
use junction_log::{JsonLinesLog, MemoryLog, QueryableLog};
use junction_sched::{SchedulerConfig, SignalScheduler};
use serde::{Deserialize, Serialize};

/// Intersection runtime configuration
///
/// Every field has a default, so `{}` is a valid configuration. The tick
/// interval accepts human-readable durations such as `"500ms"` or `"1s"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Lane ids; must be non-empty and duplicate-free
    pub lanes: Vec<LaneId>,
    pub scheduler: SchedulerConfig,
    /// Period of the live driver
    #[serde(with = "humantime_duration")]
    pub tick_interval: Duration,
    /// Records the log queue holds before dispatch starts failing
    pub log_capacity: usize,
    /// JSON-lines transition log; in-memory when absent
    pub log_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            lanes: (1..=4).map(LaneId::new).collect(),
            scheduler: SchedulerConfig::default(),
            tick_interval: Duration::from_secs(1),
            log_capacity: 1024,
            log_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(text: &str) -> JunctionResult<Self> {
        serde_json::from_str(text).map_err(|e| JunctionError::InvalidConfig(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> JunctionResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Build the scheduler this configuration describes
    pub fn build_scheduler(&self, start: Timestamp) -> JunctionResult<SignalScheduler> {
        SignalScheduler::new(self.lanes.iter().copied(), self.scheduler.clone(), start)
    }

    /// Open the configured transition log
    pub fn open_log(&self) -> JunctionResult<Arc<dyn QueryableLog>> {
        match &self.log_path {
            Some(path) => Ok(Arc::new(JsonLinesLog::open(path)?)),
            None => Ok(Arc::new(MemoryLog::new())),
        }
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
