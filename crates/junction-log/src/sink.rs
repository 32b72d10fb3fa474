//! Log sinks
//!
//! A sink receives records one at a time and may block on I/O. Sinks are
//! never called from the scheduler directly; see [`crate::LogDispatcher`].

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use junction_core::{JunctionError, JunctionResult};
use parking_lot::Mutex;

use crate::{LogQuery, LogRecord};

/// Append-only destination for transition records
///
/// Retries, if any, are the sink's business.
pub trait EventLog: Send + Sync {
    fn append(&self, record: &LogRecord) -> JunctionResult<()>;

    fn flush(&self) -> JunctionResult<()> {
        Ok(())
    }
}

impl<T: EventLog + ?Sized> EventLog for Arc<T> {
    fn append(&self, record: &LogRecord) -> JunctionResult<()> {
        (**self).append(record)
    }

    fn flush(&self) -> JunctionResult<()> {
        (**self).flush()
    }
}

/// Sink whose history can be read back
pub trait QueryableLog: EventLog {
    fn query_records(&self, query: &LogQuery) -> JunctionResult<Vec<LogRecord>>;
}

/// In-memory sink, queryable
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        MemoryLog::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copy of every record, in append order
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn query(&self, query: &LogQuery) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect()
    }
}

impl EventLog for MemoryLog {
    fn append(&self, record: &LogRecord) -> JunctionResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

impl QueryableLog for MemoryLog {
    fn query_records(&self, query: &LogQuery) -> JunctionResult<Vec<LogRecord>> {
        Ok(self.query(query))
    }
}

/// File sink writing one JSON object per line
pub struct JsonLinesLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> JunctionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(JsonLinesLog {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for JsonLinesLog {
    fn append(&self, record: &LogRecord) -> JunctionResult<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| JunctionError::LogSinkFailure(e.to_string()))?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> JunctionResult<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl QueryableLog for JsonLinesLog {
    /// Flushes pending writes, then reads the file back
    fn query_records(&self, query: &LogQuery) -> JunctionResult<Vec<LogRecord>> {
        self.flush()?;
        read_json_lines(&self.path, query)
    }
}

/// Read records back from a JSON-lines log, keeping those matching `query`
///
/// Blank lines are skipped; a malformed line is an error.
pub fn read_json_lines(path: impl AsRef<Path>, query: &LogQuery) -> JunctionResult<Vec<LogRecord>> {
    let file = match File::open(path.as_ref()) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = serde_json::from_str(&line)
            .map_err(|e| JunctionError::LogSinkFailure(format!("bad log line: {e}")))?;
        if query.matches(&record) {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::{LaneId, Phase, Timestamp};

    fn record(secs: i64, lane: u32, phase: Phase) -> LogRecord {
        LogRecord {
            timestamp: Timestamp::from_secs(1_700_000_000 + secs),
            lane_id: LaneId::new(lane),
            vehicle_count: 4,
            phase,
            duration_allocated: 18.0,
            has_ambulance: false,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("junction-{}-{}.jsonl", name, std::process::id()))
    }

    #[test]
    fn test_memory_log_query() {
        let log = MemoryLog::new();
        log.append(&record(0, 1, Phase::Green)).unwrap();
        log.append(&record(5, 2, Phase::Green)).unwrap();
        log.append(&record(9, 1, Phase::Yellow)).unwrap();

        assert_eq!(log.len(), 3);
        let lane_one = log.query(&LogQuery::all().lane(LaneId::new(1)));
        assert_eq!(lane_one.len(), 2);
        assert_eq!(lane_one[1].phase, Phase::Yellow);
    }

    #[test]
    fn test_json_lines_append_and_read_back() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);

        {
            let log = JsonLinesLog::open(&path).unwrap();
            log.append(&record(0, 3, Phase::Green)).unwrap();
            log.append(&record(50, 3, Phase::Yellow)).unwrap();
            log.flush().unwrap();
        }
        // Reopening appends rather than truncating
        {
            let log = JsonLinesLog::open(&path).unwrap();
            log.append(&record(53, 3, Phase::Red)).unwrap();
            log.flush().unwrap();
        }

        let all = read_json_lines(&path, &LogQuery::all()).unwrap();
        assert_eq!(
            JsonLinesLog::open(&path).unwrap().query_records(&LogQuery::all()).unwrap(),
            all
        );
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].phase, Phase::Red);

        let late = read_json_lines(
            &path,
            &LogQuery::all().since(Timestamp::from_secs(1_700_000_050)),
        )
        .unwrap();
        assert_eq!(late.len(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_json_lines_rejects_pre_epoch_record() {
        let path = temp_path("pre-epoch");
        let _ = std::fs::remove_file(&path);
        let log = JsonLinesLog::open(&path).unwrap();

        let mut early = record(0, 1, Phase::Green);
        early.timestamp = Timestamp::from_secs(-30);
        let err = log.append(&early).unwrap_err();
        assert!(matches!(err, JunctionError::LogSinkFailure(_)));

        log.append(&record(5, 1, Phase::Yellow)).unwrap();
        let all = log.query_records(&LogQuery::all()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].phase, Phase::Yellow);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let records = read_json_lines(temp_path("missing"), &LogQuery::all()).unwrap();
        assert!(records.is_empty());
    }
}
