//! Experiment audit log
//!
//! Each state-changing key becomes one `timestamp;subject;key;value;` line.
//! Profile and form answers go to the info log, everything that happens
//! during play goes to the game log.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Local;
use csv::{Terminator, WriterBuilder};

use crate::error::ServerError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: String,
    pub subject: u64,
    pub key: String,
    pub value: String,
}

impl AuditRecord {
    /// Stamp a record with the current local time
    pub fn now(subject: u64, key: &str, value: &str) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            subject,
            key: sanitize(key),
            value: sanitize(value),
        }
    }
}

/// Values are trimmed and may not contain the column separator
pub fn sanitize(raw: &str) -> String {
    raw.trim().replace(';', ",")
}

pub trait EventSink: Send {
    fn write(&mut self, record: &AuditRecord) -> Result<(), ServerError>;
}

/// Appends records to a semicolon separated file, flushing every line
pub struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    pub fn open(path: &Path) -> Result<Self, ServerError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = WriterBuilder::new()
            .delimiter(b';')
            .terminator(Terminator::CRLF)
            .has_headers(false)
            .from_writer(file);
        Ok(Self { writer })
    }
}

impl EventSink for CsvSink {
    fn write(&mut self, record: &AuditRecord) -> Result<(), ServerError> {
        let subject = record.subject.to_string();
        // Trailing empty field keeps the closing separator
        self.writer.write_record([
            record.timestamp.as_str(),
            subject.as_str(),
            record.key.as_str(),
            record.value.as_str(),
            "",
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink, shared so a test can read what was written
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Keys in the order they were written
    pub fn keys(&self) -> Vec<String> {
        self.records().into_iter().map(|record| record.key).collect()
    }
}

impl EventSink for MemorySink {
    fn write(&mut self, record: &AuditRecord) -> Result<(), ServerError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Info and game logs, either of which may be disabled
#[derive(Default)]
pub struct AuditLog {
    info: Option<Box<dyn EventSink>>,
    game: Option<Box<dyn EventSink>>,
}

impl AuditLog {
    pub fn new(info: Option<Box<dyn EventSink>>, game: Option<Box<dyn EventSink>>) -> Self {
        Self { info, game }
    }

    pub fn info(&mut self, subject: u64, key: &str, value: &str) {
        write_to(self.info.as_mut(), "info", subject, key, value);
    }

    pub fn game(&mut self, subject: u64, key: &str, value: &str) {
        write_to(self.game.as_mut(), "game", subject, key, value);
    }
}

fn write_to(sink: Option<&mut Box<dyn EventSink>>, log: &str, subject: u64, key: &str, value: &str) {
    let Some(sink) = sink else {
        return;
    };
    if let Err(err) = sink.write(&AuditRecord::now(subject, key, value)) {
        tracing::error!(%err, log, subject, key, "failed to write audit record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  a;b;c \n"), "a,b,c");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_timestamp_format() {
        let record = AuditRecord::now(1, "k", "v");
        // 2024-01-02 03:04:05.678901
        assert_eq!(record.timestamp.len(), 26);
        assert_eq!(&record.timestamp[4..5], "-");
        assert_eq!(&record.timestamp[19..20], ".");
    }

    #[test]
    fn test_csv_line_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        let record = AuditRecord {
            timestamp: "2024-05-06 07:08:09.000001".into(),
            subject: 42,
            key: "play_subject".into(),
            value: "true".into(),
        };
        sink.write(&record).unwrap();
        sink.write(&AuditRecord { key: "search".into(), value: "0".into(), ..record.clone() }).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "2024-05-06 07:08:09.000001;42;play_subject;true;\r\n\
             2024-05-06 07:08:09.000001;42;search;0;\r\n"
        );
    }

    #[test]
    fn test_csv_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.csv");
        CsvSink::open(&path)
            .unwrap()
            .write(&AuditRecord::now(3, "name", "Anna"))
            .unwrap();
        CsvSink::open(&path)
            .unwrap()
            .write(&AuditRecord::now(3, "avatar", "king"))
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(";3;name;Anna;"));
        assert!(lines[1].ends_with(";3;avatar;king;"));
    }

    #[test]
    fn test_audit_log_routes_and_skips_disabled() {
        let info = MemorySink::default();
        let mut log = AuditLog::new(Some(Box::new(info.clone())), None);
        log.info(7, "gender", " true ");
        log.game(7, "search", "0");

        let records = info.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "gender");
        assert_eq!(records[0].value, "true");
        assert_eq!(records[0].subject, 7);
    }
}
