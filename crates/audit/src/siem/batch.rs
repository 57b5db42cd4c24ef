//! Batch worker: drains the queue on a size-or-timeout trigger, gzips the
//! batch, and forwards it to every configured sink independently. A sink
//! whose circuit is open or whose retries are exhausted never blocks or
//! re-queues the batch onto the live queue — since SIEM delivery must
//! never back-pressure the gateway's request path — but the gzipped
//! batch is durably written to the outbox for replay rather than only
//! logged.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use sark_adapters::{CircuitBreaker, CircuitBreakerConfig};
use sark_domain::AuditEvent;

use super::outbox::SiemOutbox;
use super::queue::SiemQueue;
use super::sink::SiemSink;

pub struct SiemSinkHandle {
    pub sink: Box<dyn SiemSink>,
    pub breaker: CircuitBreaker,
}

impl SiemSinkHandle {
    pub fn new(sink: Box<dyn SiemSink>) -> Self {
        let breaker = CircuitBreaker::new(sink.name(), CircuitBreakerConfig::default());
        Self { sink, breaker }
    }
}

fn gzip_batch(events: &[AuditEvent]) -> std::io::Result<Vec<u8>> {
    let body = serde_json::to_vec(events)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body)?;
    encoder.finish()
}

async fn deliver_with_retry(handle: &SiemSinkHandle, gzipped: &[u8], retry_attempts: u32, outbox: &SiemOutbox) {
    for attempt in 0..retry_attempts.max(1) {
        if handle.breaker.before_call().is_err() {
            tracing::error!(sink = handle.sink.name(), "circuit open, writing batch to durable outbox");
            store_to_outbox(outbox, handle.sink.name(), gzipped);
            return;
        }
        match handle.sink.send(gzipped.to_vec()).await {
            Ok(()) => {
                handle.breaker.record_success();
                return;
            }
            Err(err) => {
                handle.breaker.record_failure();
                tracing::warn!(sink = handle.sink.name(), attempt, error = %err, "SIEM delivery attempt failed");
                if attempt + 1 < retry_attempts {
                    tokio::time::sleep(Duration::from_secs_f64(2f64.powi(attempt as i32))).await;
                }
            }
        }
    }
    tracing::error!(sink = handle.sink.name(), "SIEM delivery exhausted retries, writing batch to durable outbox");
    store_to_outbox(outbox, handle.sink.name(), gzipped);
}

fn store_to_outbox(outbox: &SiemOutbox, sink_name: &str, gzipped: &[u8]) {
    if let Err(err) = outbox.store(sink_name, gzipped) {
        tracing::error!(sink = sink_name, error = %err, "failed to persist SIEM batch to durable outbox, batch dropped");
    }
}

/// Runs until `shutdown` resolves. Intended to be `tokio::spawn`-ed once
/// at gateway startup. Replays any outbox entries left over from a prior
/// process before serving the live queue.
pub async fn run_batch_worker(
    queue: Arc<SiemQueue>,
    sinks: Vec<Arc<SiemSinkHandle>>,
    batch_size: usize,
    batch_timeout: Duration,
    retry_attempts: u32,
    outbox: Arc<SiemOutbox>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    replay_outbox(&sinks, &outbox).await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                flush(&queue, &sinks, batch_size, retry_attempts, &outbox).await;
                return;
            }
            _ = tokio::time::sleep(batch_timeout) => {
                flush(&queue, &sinks, batch_size, retry_attempts, &outbox).await;
            }
            _ = queue.notified() => {
                if queue.len() >= batch_size {
                    flush(&queue, &sinks, batch_size, retry_attempts, &outbox).await;
                }
            }
        }
    }
}

async fn flush(
    queue: &SiemQueue,
    sinks: &[Arc<SiemSinkHandle>],
    batch_size: usize,
    retry_attempts: u32,
    outbox: &SiemOutbox,
) {
    let batch = queue.drain(batch_size);
    if batch.is_empty() {
        return;
    }
    let gzipped = match gzip_batch(&batch) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "failed to gzip SIEM batch, logging locally");
            for event in &batch {
                tracing::info!(target: "sark_audit::fallback", event = ?event);
            }
            return;
        }
    };
    for handle in sinks {
        deliver_with_retry(handle, &gzipped, retry_attempts, outbox).await;
    }
}

/// Retry every outbox entry once against the sink it failed against. A
/// retry that fails again is left in place for the next worker restart
/// rather than retried in a tight loop here. An entry whose sink is no
/// longer configured is also left in place, since a future redeploy may
/// restore it.
async fn replay_outbox(sinks: &[Arc<SiemSinkHandle>], outbox: &SiemOutbox) {
    let pending = match outbox.pending() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(error = %err, "failed to list SIEM outbox entries for replay");
            return;
        }
    };
    if pending.is_empty() {
        return;
    }
    tracing::info!(count = pending.len(), "replaying SIEM outbox entries from a previous run");

    for entry in pending {
        let Some(handle) = sinks.iter().find(|h| h.sink.name() == entry.sink_name) else {
            continue;
        };
        let gzipped = match outbox.read(&entry.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(path = %entry.path.display(), error = %err, "failed to read SIEM outbox entry");
                continue;
            }
        };
        match handle.sink.send(gzipped).await {
            Ok(()) => {
                handle.breaker.record_success();
                if let Err(err) = outbox.remove(&entry.path) {
                    tracing::error!(path = %entry.path.display(), error = %err, "failed to remove replayed SIEM outbox entry");
                }
            }
            Err(err) => {
                handle.breaker.record_failure();
                tracing::warn!(sink = entry.sink_name, error = %err, "SIEM outbox replay attempt failed, left for the next retry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        attempts: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl SiemSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }
        async fn send(&self, _gzipped_body: Vec<u8>) -> Result<(), super::super::sink::SiemError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(super::super::sink::SiemError::Rejected(500))
            } else {
                Ok(())
            }
        }
    }

    fn sample() -> AuditEvent {
        AuditEvent {
            id: "1".into(),
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
    fn gzip_batch_produces_nonempty_output() {
        let bytes = gzip_batch(&[sample()]).unwrap();
        assert!(!bytes.is_empty());
    }

    fn test_outbox() -> super::super::outbox::SiemOutbox {
        let dir = std::env::temp_dir().join(format!("sark-siem-outbox-test-{}", uuid::Uuid::new_v4()));
        super::super::outbox::SiemOutbox::new(dir).unwrap()
    }

    #[tokio::test]
    async fn deliver_with_retry_succeeds_after_transient_failure() {
        let sink = CountingSink { attempts: AtomicUsize::new(0), fail_first_n: 1 };
        let handle = SiemSinkHandle::new(Box::new(sink));
        let outbox = test_outbox();
        deliver_with_retry(&handle, b"batch", 3, &outbox).await;
        assert_eq!(handle.breaker.state(), sark_domain::CircuitState::Closed);
        assert!(outbox.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deliver_with_retry_writes_to_outbox_on_exhaustion() {
        let sink = CountingSink { attempts: AtomicUsize::new(0), fail_first_n: 10 };
        let handle = SiemSinkHandle::new(Box::new(sink));
        let outbox = test_outbox();
        deliver_with_retry(&handle, b"batch", 2, &outbox).await;

        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sink_name, "counting");
        assert_eq!(outbox.read(&pending[0].path).unwrap(), b"batch");
    }

    #[tokio::test]
    async fn replay_outbox_removes_entries_that_now_succeed() {
        let outbox = test_outbox();
        outbox.store("counting", b"stale-batch").unwrap();

        let sink = CountingSink { attempts: AtomicUsize::new(0), fail_first_n: 0 };
        let handle = Arc::new(SiemSinkHandle::new(Box::new(sink)));
        replay_outbox(&[handle], &outbox).await;

        assert!(outbox.pending().unwrap().is_empty());
    }
}
