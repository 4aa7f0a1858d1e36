//! The DLQ Service (C4): envelopes failed events onto the retry topic, promotes exhausted
//! envelopes to the terminal topic, and exposes the retry-budget predicate.

use std::sync::Arc;

use tracing::error;

use eventide_core::domain::IncomingEvent;
use eventide_core::envelope::{FailedEnvelope, RawEnvelope, TerminalEnvelope};
use eventide_core::ports::BusPort;
use eventide_shared::observability::EventMetrics;

/// Configuration the DLQ service needs beyond the bus: topic names and the retry budget.
#[derive(Debug, Clone)]
pub struct DlqConfig {
    pub retry_topic: String,
    pub dead_topic: String,
    pub max_retries: u32,
}

/// Publication errors from the DLQ itself are logged at critical level and swallowed —
/// there is nowhere upstream that can usefully recover from a DLQ-of-the-DLQ failure.
pub struct DlqService {
    bus: Arc<dyn BusPort>,
    config: DlqConfig,
}

impl DlqService {
    pub fn new(bus: Arc<dyn BusPort>, config: DlqConfig) -> Self {
        Self { bus, config }
    }

    /// `enqueueFailure(event, errorText, retryCount)`.
    pub async fn enqueue_failure(&self, event: IncomingEvent, error_text: impl Into<String>, retry_count: u32) {
        let event_id = event.event_id.clone();
        let envelope = FailedEnvelope::new(event, error_text, retry_count);
        EventMetrics::dlq_enqueued(retry_count);
        self.publish_retry(Some(&event_id), &envelope).await;
    }

    /// `enqueueRaw(rawMessage, errorText)` — a message that could not even be decoded as an
    /// `IncomingEvent`; published unkeyed since there is no event id to key on.
    pub async fn enqueue_raw(&self, raw_message: impl Into<String>, error_text: impl Into<String>) {
        let envelope = RawEnvelope::new(raw_message, error_text);
        EventMetrics::dlq_enqueued(0);
        self.publish_retry(None, &envelope).await;
    }

    /// `terminalPark(rawEnvelope, reasonText)`.
    pub async fn terminal_park(&self, raw_envelope: impl Into<String>, reason_text: impl Into<String>) {
        let envelope = TerminalEnvelope::new(raw_envelope, reason_text);
        EventMetrics::terminal_parked(&envelope.reason);
        match serde_json::to_vec(&envelope) {
            Ok(body) => {
                if let Err(err) = self.bus.publish(&self.config.dead_topic, None, &body).await {
                    error!(reason = %envelope.reason, error = %err, "critical: failed to publish terminal envelope");
                }
            }
            Err(err) => {
                error!(error = %err, "critical: failed to serialize terminal envelope");
            }
        }
    }

    /// `isRetryable(retryCount) -> bool`.
    pub fn is_retryable(&self, retry_count: u32) -> bool {
        retry_count < self.config.max_retries
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    async fn publish_retry<T: serde::Serialize>(&self, key: Option<&str>, envelope: &T) {
        match serde_json::to_vec(envelope) {
            Ok(body) => {
                if let Err(err) = self.bus.publish(&self.config.retry_topic, key, &body).await {
                    error!(error = %err, "critical: failed to publish DLQ envelope");
                }
            }
            Err(err) => {
                error!(error = %err, "critical: failed to serialize DLQ envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eventide_core::error::{EventideError, Result};
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        calls: Mutex<Vec<(String, Option<String>, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl BusPort for RecordingBus {
        async fn publish(&self, topic: &str, key: Option<&str>, body: &[u8]) -> Result<()> {
            if self.fail {
                return Err(EventideError::BusError("boom".to_string()));
            }
            self.calls
                .lock()
                .await
                .push((topic.to_string(), key.map(str::to_string), body.to_vec()));
            Ok(())
        }
    }

    fn config() -> DlqConfig {
        DlqConfig {
            retry_topic: "eventide.dlq".to_string(),
            dead_topic: "eventide.dlq.dead".to_string(),
            max_retries: 3,
        }
    }

    fn sample_event() -> IncomingEvent {
        IncomingEvent::new("e1", "customer.created", "user-service", json!({"plan": "enterprise"}))
    }

    #[tokio::test]
    async fn enqueue_failure_publishes_keyed_envelope_to_the_retry_topic() {
        let bus = Arc::new(RecordingBus::default());
        let service = DlqService::new(bus.clone(), config());

        service.enqueue_failure(sample_event(), "connection refused", 0).await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "eventide.dlq");
        assert_eq!(calls[0].1, Some("e1".to_string()));

        let envelope: FailedEnvelope = serde_json::from_slice(&calls[0].2).unwrap();
        assert_eq!(envelope.retry_count, 0);
        assert_eq!(envelope.error, "connection refused");
    }

    #[tokio::test]
    async fn enqueue_raw_publishes_unkeyed() {
        let bus = Arc::new(RecordingBus::default());
        let service = DlqService::new(bus.clone(), config());

        service.enqueue_raw("not json", "invalid JSON payload").await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls[0].1, None);
    }

    #[tokio::test]
    async fn terminal_park_publishes_to_the_dead_topic() {
        let bus = Arc::new(RecordingBus::default());
        let service = DlqService::new(bus.clone(), config());

        service.terminal_park("{\"retryCount\":3}", "Max retries exceeded").await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls[0].0, "eventide.dlq.dead");
        let envelope: TerminalEnvelope = serde_json::from_slice(&calls[0].2).unwrap();
        assert_eq!(envelope.reason, "Max retries exceeded");
    }

    #[tokio::test]
    async fn is_retryable_respects_the_configured_budget() {
        let bus = Arc::new(RecordingBus::default());
        let service = DlqService::new(bus, config());

        assert!(service.is_retryable(0));
        assert!(service.is_retryable(2));
        assert!(!service.is_retryable(3));
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed_not_propagated() {
        let bus = Arc::new(RecordingBus { fail: true, ..Default::default() });
        let service = DlqService::new(bus, config());

        service.enqueue_failure(sample_event(), "err", 0).await;
        service.terminal_park("raw", "reason").await;
    }
}
