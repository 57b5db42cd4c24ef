//! Audit Recorder: stamps every governance event with an id and a
//! tamper-evident integrity hash, keeps a bounded in-memory history for
//! introspection, and hands the event to the SIEM forwarder.

use std::sync::Arc;

use rust_decimal::Decimal;
use sark_domain::AuditEvent;
use sha2::{Digest, Sha256};

use crate::decision_log::DecisionLog;
use crate::siem::SiemQueue;
use crate::wal::AuditWal;

/// Everything the caller knows about an event before it has an id,
/// timestamp, or integrity hash assigned.
pub struct NewAuditEvent {
    pub principal_id: String,
    pub action: String,
    pub resource_id: String,
    pub capability_id: String,
    pub decision_allowed: bool,
    pub success: Option<bool>,
    pub duration_ms: Option<u64>,
    pub error_kind: Option<String>,
    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub details: serde_json::Value,
}

fn integrity_hash(event: &AuditEvent) -> String {
    // Canonical form deliberately excludes `integrity_hash` itself and
    // uses a stable field order so the hash is reproducible regardless of
    // serde_json's map ordering.
    let canonical = serde_json::json!({
        "id": event.id,
        "timestamp": event.timestamp.to_rfc3339(),
        "principal_id": event.principal_id,
        "action": event.action,
        "resource_id": event.resource_id,
        "capability_id": event.capability_id,
        "decision_allowed": event.decision_allowed,
        "success": event.success,
        "duration_ms": event.duration_ms,
        "error_kind": event.error_kind,
        "estimated_cost": event.estimated_cost,
        "actual_cost": event.actual_cost,
        "details": event.details,
    });
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

pub struct AuditRecorder {
    history: DecisionLog<AuditEvent>,
    wal: AuditWal,
    siem: Option<Arc<SiemQueue>>,
}

impl AuditRecorder {
    pub fn new(history_capacity: usize, wal: AuditWal, siem: Option<Arc<SiemQueue>>) -> Self {
        Self { history: DecisionLog::new(history_capacity), wal, siem }
    }

    /// Stamp, durably persist, and store an event. The WAL append is
    /// synchronous and happens before this call returns — the durable
    /// write happens before the caller's response, not after. If the
    /// disk write itself fails, the event still lands in the in-memory
    /// history and SIEM queue rather than being lost outright, but the
    /// failure is logged since it means the durability guarantee broke.
    pub fn record(&self, input: NewAuditEvent) -> AuditEvent {
        let mut event = AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            principal_id: input.principal_id,
            action: input.action,
            resource_id: input.resource_id,
            capability_id: input.capability_id,
            decision_allowed: input.decision_allowed,
            success: input.success,
            duration_ms: input.duration_ms,
            error_kind: input.error_kind,
            estimated_cost: input.estimated_cost,
            actual_cost: input.actual_cost,
            details: input.details,
            integrity_hash: String::new(),
        };
        event.integrity_hash = integrity_hash(&event);

        if let Err(err) = self.wal.append(&event) {
            tracing::error!(error = %err, event_id = %event.id, "audit WAL append failed, event not durably persisted");
        }

        self.history.push(event.clone());
        if let Some(siem) = &self.siem {
            siem.enqueue(event.clone());
        }
        event
    }

    pub fn recent(&self) -> Vec<AuditEvent> {
        self.history.snapshot()
    }

    /// Delete WAL files entirely older than `retention_days`. Intended to
    /// be called periodically (see `main.rs`'s background sweeper).
    pub fn enforce_retention(&self, retention_days: u32) -> std::io::Result<usize> {
        self.wal.prune_older_than(retention_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_wal() -> AuditWal {
        let dir = std::env::temp_dir().join(format!("sark-recorder-test-{}", uuid::Uuid::new_v4()));
        AuditWal::new(dir).unwrap()
    }

    fn sample() -> NewAuditEvent {
        NewAuditEvent {
            principal_id: "p1".into(),
            action: "invoke".into(),
            resource_id: "res".into(),
            capability_id: "cap".into(),
            decision_allowed: true,
            success: Some(true),
            duration_ms: Some(12),
            error_kind: None,
            estimated_cost: None,
            actual_cost: None,
            details: serde_json::json!({}),
        }
    }

    #[test]
    fn record_assigns_id_and_hash() {
        let recorder = AuditRecorder::new(10, test_wal(), None);
        let event = recorder.record(sample());
        assert!(!event.id.is_empty());
        assert!(!event.integrity_hash.is_empty());
    }

    #[test]
    fn same_inputs_with_different_ids_hash_differently() {
        let recorder = AuditRecorder::new(10, test_wal(), None);
        let a = recorder.record(sample());
        let b = recorder.record(sample());
        assert_ne!(a.integrity_hash, b.integrity_hash);
    }

    #[test]
    fn recent_reflects_recorded_events() {
        let recorder = AuditRecorder::new(10, test_wal(), None);
        recorder.record(sample());
        recorder.record(sample());
        assert_eq!(recorder.recent().len(), 2);
    }

    #[test]
    fn record_durably_persists_to_the_wal() {
        let wal = test_wal();
        let dir = wal.dir().to_path_buf();
        let recorder = AuditRecorder::new(10, wal, None);
        let event = recorder.record(sample());

        let wal = AuditWal::new(&dir).unwrap();
        let persisted = wal.read_all().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, event.id);
    }
}
