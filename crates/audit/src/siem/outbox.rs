//! Durable outbox for SIEM batches that exhausted delivery retries.
//!
//! Mirrors `crate::wal::AuditWal`'s file-per-unit, synchronous-write
//! design, itself ported from the teacher's
//! `crates/sessions/src/transcript.rs::TranscriptWriter`: one gzip blob
//! per failed batch, named by the sink it failed against plus a fresh
//! UUID, under the configured directory. `replay` is run once at worker
//! startup to retry anything left over from a previous process before
//! serving new events, so a batch that could not be shipped is preserved
//! rather than silently dropped.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("failed to create SIEM outbox directory '{0}': {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to write SIEM outbox entry '{0}': {1}")]
    Write(String, std::io::Error),
}

/// One batch pending replay: the sink it failed to reach, and the
/// gzipped body to retry against that sink.
pub struct OutboxEntry {
    pub path: PathBuf,
    pub sink_name: String,
}

pub struct SiemOutbox {
    dir: PathBuf,
}

impl SiemOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, OutboxError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| OutboxError::CreateDir(dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    /// Durably persist a gzipped batch a specific sink failed to deliver
    /// after exhausting retries.
    pub fn store(&self, sink_name: &str, gzipped: &[u8]) -> Result<PathBuf, OutboxError> {
        let path = self.dir.join(format!("{sink_name}__{}.gz", uuid::Uuid::new_v4()));
        std::fs::write(&path, gzipped).map_err(|e| OutboxError::Write(path.display().to_string(), e))?;
        Ok(path)
    }

    /// List every entry pending replay, oldest first by filename (UUIDv4
    /// sorts arbitrarily, but this is best-effort ordering, not a
    /// correctness requirement).
    pub fn pending(&self) -> std::io::Result<Vec<OutboxEntry>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "gz").unwrap_or(false))
            .collect();
        files.sort();

        Ok(files
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                let sink_name = stem.split("__").next()?.to_string();
                Some(OutboxEntry { path, sink_name })
            })
            .collect())
    }

    pub fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    pub fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_pending_round_trips_sink_name() {
        let dir = std::env::temp_dir().join(format!("sark-outbox-test-{}", uuid::Uuid::new_v4()));
        let outbox = SiemOutbox::new(&dir).unwrap();
        outbox.store("splunk", b"gzipped-body").unwrap();

        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sink_name, "splunk");
        assert_eq!(outbox.read(&pending[0].path).unwrap(), b"gzipped-body");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn remove_deletes_the_entry() {
        let dir = std::env::temp_dir().join(format!("sark-outbox-test-{}", uuid::Uuid::new_v4()));
        let outbox = SiemOutbox::new(&dir).unwrap();
        outbox.store("datadog", b"body").unwrap();
        let pending = outbox.pending().unwrap();
        outbox.remove(&pending[0].path).unwrap();
        assert!(outbox.pending().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
