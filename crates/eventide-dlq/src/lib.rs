//! The dead-letter subsystem: the DLQ service (C4) that envelopes and publishes failures,
//! and the DLQ retry loop (C6) that drains the retry topic back into the input topic.

pub mod retry_loop;
pub mod service;

pub use retry_loop::RetryLoop;
pub use service::{DlqConfig, DlqService};
