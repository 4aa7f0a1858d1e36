//! Layered configuration for the Eventide pipeline: built-in defaults, an optional file,
//! then `EVENTIDE__`-prefixed environment variables, each layer overriding the last.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure, mirroring the external-interfaces section of the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventideConfig {
    pub topics: TopicsConfig,
    pub dlq: DlqConfig,
    pub dedup: DedupConfig,
    pub kafka: KafkaConfig,
    pub redis: RedisConfig,
    pub http: HttpConfig,
    pub processing: ProcessingConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    pub events: String,
    pub dlq: String,
    #[serde(rename = "dlqDead")]
    pub dlq_dead: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    #[serde(rename = "maxRetries")]
    pub max_retries: u32,

    #[serde(rename = "baseDelayMs")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// TTL in seconds for the dedup key (default 24h = 86400).
    pub ttl_seconds: u64,
    pub prefix: String,

    /// On KV transport error, treat the event as new (`true`) rather than as a duplicate.
    #[serde(rename = "failOpen")]
    pub fail_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub client_id: String,

    /// Consumer group for the input topic.
    pub main_consumer_group: String,

    /// Consumer group for the retry topic. Must differ from `main_consumer_group` (§5).
    pub retry_consumer_group: String,

    pub request_timeout_ms: u32,
    pub session_timeout_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub input_worker_count: usize,
    pub retry_worker_count: usize,
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,

    /// json or pretty
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for EventideConfig {
    fn default() -> Self {
        Self {
            topics: TopicsConfig {
                events: "eventide.events".to_string(),
                dlq: "eventide.dlq".to_string(),
                dlq_dead: "eventide.dlq.dead".to_string(),
            },
            dlq: DlqConfig {
                max_retries: 3,
                base_delay_ms: 5000,
            },
            dedup: DedupConfig {
                ttl_seconds: 24 * 60 * 60,
                prefix: "eventide:dedup:".to_string(),
                fail_open: true,
            },
            kafka: KafkaConfig {
                brokers: vec!["localhost:9092".to_string()],
                client_id: "eventide".to_string(),
                main_consumer_group: "eventide-engine".to_string(),
                retry_consumer_group: "eventide-dlq-retry".to_string(),
                request_timeout_ms: 30_000,
                session_timeout_ms: 30_000,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
            },
            http: HttpConfig { timeout_ms: 10_000 },
            processing: ProcessingConfig {
                input_worker_count: 4,
                retry_worker_count: 2,
                buffer_size: 1000,
            },
            observability: ObservabilityConfig {
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: "json".to_string(),
                },
                metrics: MetricsConfig {
                    enabled: true,
                    bind_address: "0.0.0.0:9090".to_string(),
                },
            },
        }
    }
}

impl EventideConfig {
    /// Load from `config.toml` if present, layered over defaults and environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("config.toml")
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&EventideConfig::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Environment is added last so it overrides both the defaults and the file, per
        // the layering documented at the top of this module and in SPEC_FULL.md §10.
        builder = builder.add_source(Environment::with_prefix("EVENTIDE").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn load_from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&EventideConfig::default())?)
            .add_source(Environment::with_prefix("EVENTIDE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = EventideConfig::default();
        assert_eq!(config.topics.events, "eventide.events");
        assert_eq!(config.topics.dlq, "eventide.dlq");
        assert_eq!(config.topics.dlq_dead, "eventide.dlq.dead");
        assert_eq!(config.dlq.max_retries, 3);
        assert_eq!(config.dlq.base_delay_ms, 5000);
        assert_eq!(config.dedup.ttl_seconds, 86_400);
        assert_eq!(config.dedup.prefix, "eventide:dedup:");
        assert!(config.dedup.fail_open);
    }

    #[test]
    fn main_and_retry_consumer_groups_differ() {
        let config = EventideConfig::default();
        assert_ne!(config.kafka.main_consumer_group, config.kafka.retry_consumer_group);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EventideConfig::default();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: EventideConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config.dlq.max_retries, deserialized.dlq.max_retries);
    }

    #[test]
    fn environment_overrides_the_config_file() {
        let path = std::env::temp_dir().join("eventide-config-precedence-test.toml");
        std::fs::write(&path, "[topics]\nevents = \"from-file\"\ndlq = \"eventide.dlq\"\ndlqDead = \"eventide.dlq.dead\"\n").unwrap();

        std::env::set_var("EVENTIDE__TOPICS__EVENTS", "from-env");

        let config = EventideConfig::load_from_file(&path).unwrap();
        assert_eq!(config.topics.events, "from-env", "env var must override the file value");

        std::env::remove_var("EVENTIDE__TOPICS__EVENTS");
        let _ = std::fs::remove_file(&path);
    }
}
