//! The idempotency/deduplication layer (C1): atomic first-sight check keyed by event id.

pub mod gate;
pub mod memory;
pub mod redis;

pub use gate::DedupGate;
pub use memory::InMemoryKv;
pub use redis::RedisKv;
