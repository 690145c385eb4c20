//! The per-agent lease table: at most one live lease per agent identity.
//!
//! Every transition is a compare-and-set against the record loaded under
//! the table lock, so two concurrent acquirers can never both succeed.
//! A lease past its expiry is logically `Expired` and collapses to free
//! the first time anything touches the slot.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// One agent's lease slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    pub session_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Monotonic renew counter; never decreases within a session.
    pub sequence: u64,
}

impl LeaseRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of an acquire attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted(LeaseRecord),
    Held {
        holder_session_id: String,
        expires_at: DateTime<Utc>,
    },
}

/// In-process lease state for all agents, plus the nonce replay cache.
pub struct LeaseTable {
    slots: Mutex<HashMap<String, LeaseRecord>>,
    /// `(agent_id, nonce)` observed within the skew window.
    nonces: Mutex<HashMap<(String, Vec<u8>), DateTime<Utc>>>,
    /// Nonce entries older than this are swept.
    nonce_window: Duration,
}

impl LeaseTable {
    pub fn new(nonce_window: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            nonces: Mutex::new(HashMap::new()),
            nonce_window,
        }
    }

    /// Record a nonce; returns false if it was already seen within the
    /// window for this agent.
    pub fn check_and_store_nonce(&self, agent_id: &str, nonce: &[u8], now: DateTime<Utc>) -> bool {
        let mut nonces = self.nonces.lock().unwrap();

        // Sweep expired entries so the cache stays bounded.
        let window = self.nonce_window;
        nonces.retain(|_, seen| now - *seen <= window);

        let key = (agent_id.to_string(), nonce.to_vec());
        if nonces.contains_key(&key) {
            return false;
        }
        nonces.insert(key, now);
        true
    }

    /// Atomically acquire the slot if it is free or expired.
    pub fn try_acquire(
        &self,
        agent_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AcquireOutcome {
        let mut slots = self.slots.lock().unwrap();

        match slots.get(agent_id) {
            Some(record) if !record.is_expired(now) => AcquireOutcome::Held {
                holder_session_id: record.session_id.clone(),
                expires_at: record.expires_at,
            },
            _ => {
                let record = LeaseRecord {
                    session_id: session_id.to_string(),
                    acquired_at: now,
                    expires_at: now + ttl,
                    sequence: 0,
                };
                slots.insert(agent_id.to_string(), record.clone());
                AcquireOutcome::Granted(record)
            }
        }
    }

    /// Extend the holder's lease: `expires_at = max(expires_at, now) + ttl`,
    /// `sequence += 1`. Returns `None` if the session no longer holds the
    /// slot (released, expired and re-acquired, or never held).
    pub fn renew(
        &self,
        agent_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<LeaseRecord> {
        let mut slots = self.slots.lock().unwrap();
        let record = slots.get_mut(agent_id)?;

        if record.session_id != session_id {
            return None;
        }
        if record.is_expired(now) {
            slots.remove(agent_id);
            return None;
        }

        record.expires_at = record.expires_at.max(now) + ttl;
        record.sequence += 1;
        Some(record.clone())
    }

    /// Release the slot if this session holds it. Idempotent: releasing a
    /// free or foreign slot is a no-op.
    pub fn release(&self, agent_id: &str, session_id: &str) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(record) = slots.get(agent_id) {
            if record.session_id == session_id {
                slots.remove(agent_id);
            }
        }
    }

    /// Current holder, with expired slots collapsed to free.
    pub fn status(&self, agent_id: &str, now: DateTime<Utc>) -> Option<LeaseRecord> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get(agent_id) {
            Some(record) if record.is_expired(now) => {
                slots.remove(agent_id);
                None
            }
            Some(record) => Some(record.clone()),
            None => None,
        }
    }

    /// True if `session_id` currently holds a live lease on the agent.
    pub fn holds(&self, agent_id: &str, session_id: &str, now: DateTime<Utc>) -> bool {
        self.status(agent_id, now)
            .map(|r| r.session_id == session_id)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LeaseTable {
        LeaseTable::new(Duration::seconds(120))
    }

    #[test]
    fn test_acquire_free_slot() {
        let t = table();
        let now = Utc::now();
        let outcome = t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));
        assert!(matches!(outcome, AcquireOutcome::Granted(_)));
    }

    #[test]
    fn test_second_acquirer_sees_holder() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));

        match t.try_acquire("aid_a", "sid_2", now, Duration::seconds(60)) {
            AcquireOutcome::Held {
                holder_session_id, ..
            } => assert_eq!(holder_session_id, "sid_1"),
            other => panic!("expected Held, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_slot_collapses_to_free() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(2));

        let later = now + Duration::seconds(3);
        let outcome = t.try_acquire("aid_a", "sid_2", later, Duration::seconds(60));
        assert!(matches!(outcome, AcquireOutcome::Granted(_)));
    }

    #[test]
    fn test_renew_extends_and_counts() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));

        let renewed = t
            .renew("aid_a", "sid_1", now + Duration::seconds(10), Duration::seconds(60))
            .unwrap();
        assert_eq!(renewed.sequence, 1);
        assert_eq!(renewed.expires_at, now + Duration::seconds(120));

        let renewed = t
            .renew("aid_a", "sid_1", now + Duration::seconds(20), Duration::seconds(60))
            .unwrap();
        assert_eq!(renewed.sequence, 2);
    }

    #[test]
    fn test_renew_past_expiry_uses_now() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));

        // Within the lease but after a long pause, renewal extends from
        // max(expires_at, now).
        let later = now + Duration::seconds(50);
        let renewed = t.renew("aid_a", "sid_1", later, Duration::seconds(60)).unwrap();
        assert_eq!(renewed.expires_at, now + Duration::seconds(120));
    }

    #[test]
    fn test_renew_wrong_session_fails() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));
        assert!(t.renew("aid_a", "sid_2", now, Duration::seconds(60)).is_none());
    }

    #[test]
    fn test_release_idempotent() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));

        t.release("aid_a", "sid_1");
        t.release("aid_a", "sid_1");
        assert!(t.status("aid_a", now).is_none());
    }

    #[test]
    fn test_release_foreign_session_is_noop() {
        let t = table();
        let now = Utc::now();
        t.try_acquire("aid_a", "sid_1", now, Duration::seconds(60));

        t.release("aid_a", "sid_2");
        assert!(t.holds("aid_a", "sid_1", now));
    }

    #[test]
    fn test_nonce_replay_detected() {
        let t = table();
        let now = Utc::now();
        assert!(t.check_and_store_nonce("aid_a", &[1, 2, 3], now));
        assert!(!t.check_and_store_nonce("aid_a", &[1, 2, 3], now));
        // A different agent may use the same nonce.
        assert!(t.check_and_store_nonce("aid_b", &[1, 2, 3], now));
    }

    #[test]
    fn test_nonce_cache_expires() {
        let t = table();
        let now = Utc::now();
        assert!(t.check_and_store_nonce("aid_a", &[9], now));

        let later = now + Duration::seconds(121);
        assert!(t.check_and_store_nonce("aid_a", &[9], later));
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        use std::sync::Arc;

        let t = Arc::new(table());
        let now = Utc::now();
        let mut handles = Vec::new();
        for i in 0..16 {
            let t = Arc::clone(&t);
            handles.push(std::thread::spawn(move || {
                matches!(
                    t.try_acquire("aid_a", &format!("sid_{i}"), now, Duration::seconds(60)),
                    AcquireOutcome::Granted(_)
                )
            }));
        }

        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
