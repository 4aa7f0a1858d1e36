//! The DLQ Retry Loop (C6): consumes the retry topic, waits a deterministic backoff, clears
//! dedup, re-stamps the attempt count and republishes to the main input topic — or promotes
//! an envelope to the terminal topic when it is exhausted or structurally unprocessable.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use eventide_core::envelope::FailedEnvelope;
use eventide_core::error::Result;
use eventide_core::ports::BusPort;
use eventide_core::processor::EventProcessor;
use eventide_dedup::DedupGate;
use eventide_shared::retry::calculate_backoff;

use crate::service::DlqService;

/// Wires the retry-topic consumer pool (§5: a distinct consumer group from the main
/// pipeline) to the backoff/clear/stamp/republish algorithm of §4.6.
pub struct RetryLoop {
    bus: Arc<dyn BusPort>,
    dedup: Arc<DedupGate>,
    dlq: Arc<DlqService>,
    input_topic: String,
    base_delay_ms: u64,
}

impl RetryLoop {
    pub fn new(bus: Arc<dyn BusPort>, dedup: Arc<DedupGate>, dlq: Arc<DlqService>, input_topic: impl Into<String>, base_delay_ms: u64) -> Self {
        Self {
            bus,
            dedup,
            dlq,
            input_topic: input_topic.into(),
            base_delay_ms,
        }
    }

    /// Process one raw retry-topic message. Never returns an `Err` that would be useful to
    /// retry itself — every failure mode here resolves into a terminal park or a log line,
    /// matching §7: "Envelope parse failure in retry loop -> Terminally park the raw text."
    async fn handle_message(&self, raw: &str) {
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "malformed DLQ envelope");
                self.dlq.terminal_park(raw, "malformed envelope").await;
                return;
            }
        };

        let retry_count = parsed.get("retryCount").and_then(Value::as_u64).unwrap_or(0) as u32;

        if parsed.get("rawMessage").is_some() {
            info!("DLQ envelope wraps an unparseable ingress message; never retryable");
            self.dlq.terminal_park(raw, "unparseable event").await;
            return;
        }

        if !self.dlq.is_retryable(retry_count) {
            warn!(retry_count, max_retries = self.dlq.max_retries(), "DLQ envelope exceeded retry budget");
            self.dlq.terminal_park(raw, "Max retries exceeded").await;
            return;
        }

        let envelope: FailedEnvelope = match serde_json::from_value(parsed) {
            Ok(envelope) => envelope,
            Err(_) => {
                warn!("DLQ envelope missing originalEvent");
                self.dlq.terminal_park(raw, "missing originalEvent").await;
                return;
            }
        };

        let backoff = calculate_backoff(retry_count, self.base_delay_ms);
        tokio::time::sleep(backoff).await;

        self.dedup.clear(&envelope.original_event.event_id).await;

        let republished = envelope.original_event.with_retry_count(retry_count + 1);
        let body = match serde_json::to_vec(&republished) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "failed to serialize republished event");
                return;
            }
        };

        if let Err(err) = self.bus.publish(&self.input_topic, Some(&republished.event_id), &body).await {
            error!(event_id = %republished.event_id, error = %err, "failed to republish event from DLQ retry loop");
        }
    }
}

#[async_trait]
impl EventProcessor<String> for RetryLoop {
    async fn process(&self, raw_message: String) -> Result<()> {
        self.handle_message(&raw_message).await;
        Ok(())
    }
}
