//! `eventide` — convenience facade that re-exports the pipeline crates, so a caller embedding
//! the choreography engine in another process can `use eventide::*;` instead of depending on
//! `eventide-core`, `eventide-shared`, `eventide-dedup`, `eventide-dispatch`, `eventide-dlq`
//! and `eventide-engine` directly.

pub use eventide_core::*;

pub use eventide_dedup::{DedupGate, InMemoryKv, RedisKv};
pub use eventide_dispatch::{ActionDispatcher, KafkaBus, KafkaBusConfig, ReqwestHttpClient};
pub use eventide_dlq::{DlqConfig, DlqService, RetryLoop};
pub use eventide_engine::{ChoreographyEngine, InMemoryWorkflowRepository};
pub use eventide_shared::*;
