//! Bounded ring buffer of recent policy/authorization decisions, used as
//! an introspection surface for admin/debug endpoints.
//!
//! Ported from the teacher's `crates/providers/src/decisions.rs`
//! (`parking_lot::Mutex<VecDeque<T>>`, push evicts the oldest entry once
//! at capacity).

use std::collections::VecDeque;

use parking_lot::Mutex;

pub struct DecisionLog<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> DecisionLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    pub fn push(&self, entry: T) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let log: DecisionLog<u32> = DecisionLog::new(2);
        log.push(1);
        log.push(2);
        log.push(3);
        assert_eq!(log.snapshot(), vec![2, 3]);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let log: DecisionLog<&str> = DecisionLog::new(5);
        log.push("a");
        log.push("b");
        assert_eq!(log.snapshot(), vec!["a", "b"]);
    }
}
