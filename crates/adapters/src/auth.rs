//! Round-robin credential rotation for adapters backed by a pool of
//! interchangeable keys, so a single rate-limited or rejected key doesn't
//! take the whole adapter down.
//!
//! Grounded on the teacher's `AuthRotator` (formerly
//! `crates/providers/src/auth.rs`): round-robin selection skipping keys
//! still in cooldown, with a per-key cooldown applied on failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

struct Slot {
    credential: String,
    cooldown_until: Option<Instant>,
}

/// Rotates through a fixed pool of credentials, skipping any still cooling
/// down from a recent failure.
pub struct AuthRotator {
    slots: RwLock<Vec<Slot>>,
    cursor: AtomicUsize,
    cooldown: Duration,
}

impl AuthRotator {
    pub fn new(credentials: Vec<String>, cooldown: Duration) -> Self {
        Self {
            slots: RwLock::new(
                credentials
                    .into_iter()
                    .map(|credential| Slot { credential, cooldown_until: None })
                    .collect(),
            ),
            cursor: AtomicUsize::new(0),
            cooldown,
        }
    }

    /// Pick the next usable credential, round-robin, skipping any in
    /// cooldown. Returns `None` if every slot is currently cooling down.
    pub fn next(&self) -> Option<String> {
        let slots = self.slots.read();
        if slots.is_empty() {
            return None;
        }
        let len = slots.len();
        for offset in 0..len {
            let idx = (self.cursor.fetch_add(1, Ordering::Relaxed) + offset) % len;
            let slot = &slots[idx];
            let cooling = slot.cooldown_until.is_some_and(|until| Instant::now() < until);
            if !cooling {
                return Some(slot.credential.clone());
            }
        }
        None
    }

    /// Put a credential into cooldown after an authentication failure.
    pub fn mark_failed(&self, credential: &str) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.iter_mut().find(|s| s.credential == credential) {
            slot.cooldown_until = Some(Instant::now() + self.cooldown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_round_robin() {
        let rotator = AuthRotator::new(vec!["a".into(), "b".into()], Duration::from_secs(60));
        let first = rotator.next().unwrap();
        let second = rotator.next().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn skips_cooling_down_credential() {
        let rotator = AuthRotator::new(vec!["a".into(), "b".into()], Duration::from_secs(60));
        rotator.mark_failed("a");
        for _ in 0..4 {
            assert_eq!(rotator.next().unwrap(), "b");
        }
    }

    #[test]
    fn all_cooling_returns_none() {
        let rotator = AuthRotator::new(vec!["a".into()], Duration::from_secs(60));
        rotator.mark_failed("a");
        assert!(rotator.next().is_none());
    }
}
