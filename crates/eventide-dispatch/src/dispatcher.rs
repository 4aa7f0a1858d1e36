//! The Action Dispatcher (C3): executes a typed action against a decoded `actionConfig`.
//!
//! A pure "try once, report status" component. It never talks to the DLQ itself — the
//! engine is the single place that reads `_retryCount` and enqueues a failure, which keeps
//! retry-count bookkeeping in one component instead of splitting it across two.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use eventide_core::domain::{ActionType, IncomingEvent};
use eventide_core::error::{EventideError, Result};
use eventide_core::ports::{BusPort, HttpPort};

const DEFAULT_HTTP_METHOD: &str = "POST";

/// Dispatches a rule's action against its decoded config and the triggering event.
pub struct ActionDispatcher {
    bus: Arc<dyn BusPort>,
    http: Arc<dyn HttpPort>,
}

impl ActionDispatcher {
    pub fn new(bus: Arc<dyn BusPort>, http: Arc<dyn HttpPort>) -> Self {
        Self { bus, http }
    }

    /// `dispatch(actionType, config, event)`. Any transport error, serialization error or
    /// non-2xx response becomes an `Err` for the engine to convert into a DLQ entry.
    #[instrument(skip(self, config, event), fields(event_id = %event.event_id, action_type = ?action_type))]
    pub async fn dispatch(&self, action_type: ActionType, config: &Value, event: &IncomingEvent) -> Result<()> {
        match action_type {
            ActionType::Kafka => self.dispatch_kafka(config, event).await,
            ActionType::Webhook => self.dispatch_webhook(config, event).await,
            ActionType::Http => self.dispatch_http(config, event).await,
        }
    }

    async fn dispatch_kafka(&self, config: &Value, event: &IncomingEvent) -> Result<()> {
        let topic = required_str(config, "topic")?;
        let key = config
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| event.event_id.clone());

        let body = serde_json::to_vec(&event.payload)?;
        self.bus.publish(topic, Some(&key), &body).await
    }

    async fn dispatch_webhook(&self, config: &Value, event: &IncomingEvent) -> Result<()> {
        let url = required_str(config, "url")?;
        let body = serde_json::to_vec(event)?;
        let status = self.http.request(DEFAULT_HTTP_METHOD, url, &HashMap::new(), &body).await?;
        ensure_success(status)
    }

    async fn dispatch_http(&self, config: &Value, event: &IncomingEvent) -> Result<()> {
        let url = required_str(config, "url")?;
        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_HTTP_METHOD);
        let headers = config
            .get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let body = serde_json::to_vec(&event.payload)?;
        let status = self.http.request(method, url, &headers, &body).await?;
        ensure_success(status)
    }
}

fn required_str<'a>(config: &'a Value, field: &str) -> Result<&'a str> {
    config
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| EventideError::DispatchError(format!("actionConfig missing required field `{field}`")))
}

fn ensure_success(status: u16) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(EventideError::DispatchError(format!("non-2xx response: {status}")))
    }
}
