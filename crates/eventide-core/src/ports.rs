//! Abstract transport and persistence ports consumed by the engine, dispatcher and DLQ.
//!
//! These are the seams the concrete transports (Kafka, Redis, an HTTP client, a workflow
//! store) plug into. Kept here, in the core crate, so the engine can depend on traits alone.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Workflow;
use crate::error::Result;

/// Atomic key-value store backing the dedup gate.
#[async_trait]
pub trait KvPort: Send + Sync {
    /// Atomically create `key = value` if absent. Returns `true` if the key was created
    /// (first sight), `false` if it already existed (duplicate).
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Unconditionally delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Fire-and-observe-errors publish port for the message bus.
#[async_trait]
pub trait BusPort: Send + Sync {
    /// Publish `body` to `topic`, optionally keyed. Errors surface to the caller; this port
    /// never silently swallows a transport failure.
    async fn publish(&self, topic: &str, key: Option<&str>, body: &[u8]) -> Result<()>;
}

/// Outbound HTTP port used by the WEBHOOK and HTTP action types.
#[async_trait]
pub trait HttpPort: Send + Sync {
    /// Issue `method` against `url` with `headers` merged over the caller's defaults and
    /// `body_json` as the request body. Returns the response status code; the caller decides
    /// what counts as success (2xx).
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body_json: &[u8],
    ) -> Result<u16>;
}

/// Lookup of the unique active workflow for an `(eventType, source)` pair.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Returns the active workflow, if any, with its rules pre-sorted priority-ascending
    /// (ties in insertion order). The engine trusts this ordering and does not re-sort.
    async fn find_active(&self, event_type: &str, source: &str) -> Result<Option<Workflow>>;
}
