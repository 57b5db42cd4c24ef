//! Bounded queue feeding the SIEM batch worker.
//!
//! The distilled behavior calls for dropping the *oldest* queued event on
//! overflow. A plain `tokio::sync::mpsc` bounded channel drops the
//! *newest* item instead (the sender blocks or the `try_send` fails), so
//! this is a small ring buffer purpose-built for the drop-oldest policy,
//! with a `Notify` to wake the batch worker instead of requiring it to
//! poll.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sark_domain::AuditEvent;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct SiemQueueMetrics {
    pub enqueued: u64,
    pub dropped_oldest: u64,
}

pub struct SiemQueue {
    buffer: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    notify: Notify,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl SiemQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Never blocks. At capacity, evicts the oldest queued event to make
    /// room for the new one rather than rejecting the new event.
    pub fn enqueue(&self, event: AuditEvent) {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("SIEM queue full, dropped oldest event");
        }
        buffer.push_back(event);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        drop(buffer);
        self.notify.notify_one();
    }

    /// Drain up to `max` events, oldest first.
    pub fn drain(&self, max: usize) -> Vec<AuditEvent> {
        let mut buffer = self.buffer.lock();
        let n = max.min(buffer.len());
        buffer.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn metrics(&self) -> SiemQueueMetrics {
        SiemQueueMetrics {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped_oldest: self.dropped.load(Ordering::Relaxed),
        }
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
    fn drops_oldest_on_overflow() {
        let queue = SiemQueue::new(2);
        queue.enqueue(sample("1"));
        queue.enqueue(sample("2"));
        queue.enqueue(sample("3"));
        let drained = queue.drain(10);
        assert_eq!(drained.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["2", "3"]);
        assert_eq!(queue.metrics().dropped_oldest, 1);
    }

    #[test]
    fn drain_respects_max() {
        let queue = SiemQueue::new(10);
        for i in 0..5 {
            queue.enqueue(sample(&i.to_string()));
        }
        assert_eq!(queue.drain(3).len(), 3);
        assert_eq!(queue.len(), 2);
    }
}
