//! Redis-backed `KvPort`: the production transport for the dedup gate.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use eventide_core::error::{EventideError, Result};
use eventide_core::ports::KvPort;

/// Uses a single atomic `SET key value NX PX ttl_ms` for create-if-absent, rather than a
/// separate exists-check followed by a set — the latter races under concurrent consumers,
/// which is exactly the failure mode the dedup gate exists to rule out.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| EventideError::KvError(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| EventideError::KvError(e.to_string()))?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl KvPort for RedisKv {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let ttl_ms = ttl.as_millis().max(1) as usize;

        let created: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| EventideError::KvError(e.to_string()))?;

        Ok(created.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| EventideError::KvError(e.to_string()))?;
        Ok(())
    }
}
