//! Ambient stack shared by every Eventide crate: configuration, observability, health checks
//! and the DLQ backoff calculation.

pub mod config;
pub mod health;
pub mod observability;
pub mod retry;

pub use config::*;
pub use health::*;
pub use observability::*;
pub use retry::*;
