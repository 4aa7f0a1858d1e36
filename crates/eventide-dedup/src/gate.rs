//! The dedup gate (C1): atomic first-sight check keyed by event id.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use eventide_core::ports::KvPort;

/// Wraps a `KvPort` with the dedup-specific key scheme, TTL and fail-open/fail-closed policy.
pub struct DedupGate {
    kv: Arc<dyn KvPort>,
    prefix: String,
    ttl: Duration,
    fail_open: bool,
}

impl DedupGate {
    pub fn new(kv: Arc<dyn KvPort>, prefix: impl Into<String>, ttl: Duration, fail_open: bool) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
            ttl,
            fail_open,
        }
    }

    fn key_for(&self, event_id: &str) -> String {
        format!("{}{}", self.prefix, event_id)
    }

    /// `isDuplicate(eventId)`. A blank id bypasses the gate entirely and never touches the
    /// store. A KV transport error falls back to `fail_open` (default: treat as new) rather
    /// than panicking or blocking the event.
    pub async fn is_duplicate(&self, event_id: &str) -> bool {
        if event_id.trim().is_empty() {
            return false;
        }

        let key = self.key_for(event_id);
        match self.kv.set_if_absent(&key, "1", self.ttl).await {
            Ok(created) => !created,
            Err(err) => {
                error!(event_id, error = %err, "dedup KV error; falling back to fail-open policy");
                !self.fail_open
            }
        }
    }

    /// `clear(eventId)`. Unconditional delete; clearing an absent key is not an error.
    pub async fn clear(&self, event_id: &str) {
        if event_id.trim().is_empty() {
            return;
        }
        let key = self.key_for(event_id);
        if let Err(err) = self.kv.delete(&key).await {
            warn!(event_id, error = %err, "failed to clear dedup key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKv;

    fn gate(fail_open: bool) -> DedupGate {
        DedupGate::new(
            Arc::new(InMemoryKv::new()),
            "eventide:dedup:",
            Duration::from_secs(86_400),
            fail_open,
        )
    }

    #[tokio::test]
    async fn blank_event_id_is_never_a_duplicate() {
        let gate = gate(true);
        assert!(!gate.is_duplicate("").await);
        assert!(!gate.is_duplicate("   ").await);
    }

    #[tokio::test]
    async fn first_sight_is_not_a_duplicate_second_sight_is() {
        let gate = gate(true);
        assert!(!gate.is_duplicate("e1").await);
        assert!(gate.is_duplicate("e1").await);
    }

    #[tokio::test]
    async fn clear_reopens_the_dedup_window() {
        let gate = gate(true);
        assert!(!gate.is_duplicate("e1").await);
        assert!(gate.is_duplicate("e1").await);
        gate.clear("e1").await;
        assert!(!gate.is_duplicate("e1").await);
    }

    #[tokio::test]
    async fn concurrent_submissions_let_exactly_one_through() {
        let gate = Arc::new(gate(true));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move { gate.is_duplicate("same-id").await }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|is_dup| !**is_dup).count(), 1);
    }
}
