//! In-memory `KvPort` used by tests and by local runs without a Redis instance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use eventide_core::error::Result;
use eventide_core::ports::KvPort;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// A `Mutex<HashMap>` backing store. The lock serializes `set_if_absent` calls, which is
/// exactly the atomicity the dedup gate needs — equivalent in spirit to a single-node
/// Redis's own single-threaded command execution.
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvPort for InMemoryKv {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_succeeds_once_then_fails() {
        let kv = InMemoryKv::new();
        assert!(kv.set_if_absent("k", "1", Duration::from_secs(60)).await.unwrap());
        assert!(!kv.set_if_absent("k", "1", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_can_be_recreated() {
        let kv = InMemoryKv::new();
        assert!(kv.set_if_absent("k", "1", Duration::from_millis(1)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(kv.set_if_absent("k", "1", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_not_an_error_when_key_is_absent() {
        let kv = InMemoryKv::new();
        assert!(kv.delete("missing").await.is_ok());
    }
}
