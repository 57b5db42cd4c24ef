use serde::{Deserialize, Serialize};

/// Audit Recorder + SIEM Forwarder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "d_retention_days")]
    pub retention_days: u32,
    /// Directory holding the durable audit WAL (one JSONL file per UTC
    /// day). The synchronous record path appends here before a response
    /// is returned to the caller.
    #[serde(default = "d_wal_dir")]
    pub wal_dir: String,
    /// Size of the in-memory recent-events ring buffer exposed to the
    /// admin introspection endpoint. Independent of WAL retention — this
    /// bounds memory, the WAL is the durable record.
    #[serde(default = "d_history_capacity")]
    pub history_capacity: usize,
    #[serde(default)]
    pub siem: SiemConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: d_retention_days(),
            wal_dir: d_wal_dir(),
            history_capacity: d_history_capacity(),
            siem: SiemConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiemConfig {
    #[serde(default)]
    pub sinks: Vec<SiemSinkConfig>,
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    #[serde(default = "d_batch_timeout_secs")]
    pub batch_timeout_secs: f64,
    #[serde(default = "d_retry_attempts")]
    pub retry_attempts: u32,
    /// Directory a batch is written to, gzipped, when every sink has
    /// exhausted its retries — the durable outbox for later replay.
    #[serde(default = "d_outbox_dir")]
    pub outbox_dir: String,
}

impl Default for SiemConfig {
    fn default() -> Self {
        Self {
            sinks: Vec::new(),
            queue_capacity: d_queue_capacity(),
            batch_size: d_batch_size(),
            batch_timeout_secs: d_batch_timeout_secs(),
            retry_attempts: d_retry_attempts(),
            outbox_dir: d_outbox_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiemSinkConfig {
    SplunkHec {
        endpoint: String,
        token_env: String,
        #[serde(default = "d_sourcetype")]
        sourcetype: String,
    },
    Datadog {
        endpoint: String,
        api_key_env: String,
    },
}

fn d_retention_days() -> u32 {
    90
}
fn d_wal_dir() -> String {
    "./data/audit".into()
}
fn d_history_capacity() -> usize {
    10_000
}
fn d_outbox_dir() -> String {
    "./data/siem-outbox".into()
}
fn d_queue_capacity() -> usize {
    10_000
}
fn d_batch_size() -> usize {
    100
}
fn d_batch_timeout_secs() -> f64 {
    5.0
}
fn d_retry_attempts() -> u32 {
    3
}
fn d_sourcetype() -> String {
    "sark:gateway".into()
}
