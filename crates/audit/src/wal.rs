//! Durable append-only audit log.
//!
//! One JSONL file per UTC day under the configured directory. `append`
//! opens in append mode and writes synchronously before returning, so a
//! caller blocked on `AuditRecorder::record` has the write-ahead
//! guarantee before it sees a response — ported from the teacher's
//! `crates/sessions/src/transcript.rs::TranscriptWriter` (JSONL,
//! one-file-per-key, `OpenOptions::append`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use sark_domain::AuditEvent;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("failed to create audit WAL directory '{0}': {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to append to audit WAL file '{0}': {1}")]
    Append(String, std::io::Error),
}

pub struct AuditWal {
    dir: PathBuf,
}

impl AuditWal {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, WalError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| WalError::CreateDir(dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append one event as a single JSON line to today's file.
    pub fn append(&self, event: &AuditEvent) -> Result<(), WalError> {
        let path = self.path_for(Utc::now().date_naive());
        let line = serde_json::to_string(event).unwrap_or_default();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WalError::Append(path.display().to_string(), e))?;
        file.write_all(line.as_bytes()).map_err(|e| WalError::Append(path.display().to_string(), e))?;
        file.write_all(b"\n").map_err(|e| WalError::Append(path.display().to_string(), e))?;
        Ok(())
    }

    /// Delete daily files whose date falls entirely outside
    /// `retention_days` of today. Returns the number of files removed.
    pub fn prune_older_than(&self, retention_days: u32) -> std::io::Result<usize> {
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days as i64);
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()).map(str::to_string) else { continue };
            let Ok(date) = NaiveDate::parse_from_str(&stem, "%Y-%m-%d") else { continue };
            if date < cutoff {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Read back every line across every daily file, oldest file first.
    /// Used by the admin retention/introspection surface, not the hot
    /// path.
    pub fn read_all(&self) -> std::io::Result<Vec<AuditEvent>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "jsonl").unwrap_or(false))
            .collect();
        files.sort();

        let mut events = Vec::new();
        for path in files {
            let raw = std::fs::read_to_string(&path)?;
            for line in raw.lines().filter(|l| !l.is_empty()) {
                if let Ok(event) = serde_json::from_str(line) {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> AuditEvent {
        AuditEvent {
            id: id.into(),
            timestamp: chrono::Utc::now(),
            principal_id: "p".into(),
            action: "invoke".into(),
            resource_id: "r".into(),
            capability_id: "c".into(),
            decision_allowed: true,
            success: Some(true),
            duration_ms: None,
            error_kind: None,
            estimated_cost: None,
            actual_cost: None,
            details: serde_json::json!({}),
            integrity_hash: "h".into(),
        }
    }

    #[test]
    fn append_then_read_all_round_trips() {
        let dir = std::env::temp_dir().join(format!("sark-wal-test-{}", uuid::Uuid::new_v4()));
        let wal = AuditWal::new(&dir).unwrap();
        wal.append(&sample("1")).unwrap();
        wal.append(&sample("2")).unwrap();
        let events = wal.read_all().unwrap();
        assert_eq!(events.len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn prune_keeps_files_within_retention() {
        let dir = std::env::temp_dir().join(format!("sark-wal-prune-{}", uuid::Uuid::new_v4()));
        let wal = AuditWal::new(&dir).unwrap();
        wal.append(&sample("1")).unwrap();
        let removed = wal.prune_older_than(90).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(wal.read_all().unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn prune_removes_files_older_than_cutoff_date() {
        let dir = std::env::temp_dir().join(format!("sark-wal-prune-old-{}", uuid::Uuid::new_v4()));
        let wal = AuditWal::new(&dir).unwrap();
        std::fs::write(dir.join("2000-01-01.jsonl"), "").unwrap();
        let removed = wal.prune_older_than(90).unwrap();
        assert_eq!(removed, 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
