//! Kafka-backed `BusPort`: the transport behind the KAFKA action type.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use eventide_core::error::{EventideError, Result};
use eventide_core::ports::BusPort;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaBusConfig {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub compression_type: String,
    pub acks: String,
    pub request_timeout_ms: u32,
    pub enable_idempotence: bool,
    pub additional_config: HashMap<String, String>,
}

impl Default for KafkaBusConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            client_id: "eventide".to_string(),
            compression_type: "snappy".to_string(),
            acks: "all".to_string(),
            request_timeout_ms: 30_000,
            enable_idempotence: true,
            additional_config: HashMap::new(),
        }
    }
}

/// Publishes to an arbitrary topic/key/body triple; every failure is surfaced as a
/// `BusError` for the dispatcher (and, from there, the engine) to act on.
pub struct KafkaBus {
    producer: FutureProducer,
    request_timeout: Duration,
}

impl KafkaBus {
    pub fn new(config: KafkaBusConfig) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", config.brokers.join(","));
        client_config.set("client.id", &config.client_id);
        client_config.set("compression.type", &config.compression_type);
        client_config.set("acks", &config.acks);
        client_config.set("request.timeout.ms", &config.request_timeout_ms.to_string());
        client_config.set("enable.idempotence", &config.enable_idempotence.to_string());

        for (key, value) in &config.additional_config {
            client_config.set(key, value);
        }

        let producer: FutureProducer = client_config
            .create()
            .map_err(|e| EventideError::BusError(format!("failed to create producer: {e}")))?;

        Ok(Self {
            producer,
            request_timeout: Duration::from_millis(config.request_timeout_ms as u64),
        })
    }
}

#[async_trait]
impl BusPort for KafkaBus {
    #[instrument(skip(self, body), fields(topic))]
    async fn publish(&self, topic: &str, key: Option<&str>, body: &[u8]) -> Result<()> {
        let mut record = FutureRecord::to(topic).payload(body);
        if let Some(k) = key {
            record = record.key(k);
        }

        self.producer
            .send(record, Timeout::After(self.request_timeout))
            .await
            .map_err(|(err, _record)| EventideError::BusError(err.to_string()))?;

        Ok(())
    }
}
