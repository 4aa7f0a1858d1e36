//! Structured logging and metrics bootstrap.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tokio::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::{LoggingConfig, MetricsConfig, ObservabilityConfig};

static OBSERVABILITY: OnceCell<ObservabilitySystem> = OnceCell::new();

/// Owns the decision of whether metrics were turned on, so callers can check without
/// re-reading the config.
pub struct ObservabilitySystem {
    metrics_enabled: bool,
}

impl ObservabilitySystem {
    pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
        Self::init_logging(&config.logging)?;

        if config.metrics.enabled {
            Self::init_metrics(&config.metrics)?;
        }

        let system = Self {
            metrics_enabled: config.metrics.enabled,
        };

        OBSERVABILITY
            .set(system)
            .map_err(|_| anyhow::anyhow!("observability system already initialized"))?;

        info!("observability system initialized");
        Ok(())
    }

    fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
        let level = match config.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };

        let env_filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        let registry = tracing_subscriber::registry().with(env_filter);

        match config.format.to_lowercase().as_str() {
            "json" => {
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE);
                registry.with(json_layer).init();
            }
            _ => {
                let pretty_layer = tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_span_events(FmtSpan::CLOSE);
                registry.with(pretty_layer).init();
            }
        }

        Ok(())
    }

    fn init_metrics(config: &MetricsConfig) -> anyhow::Result<()> {
        let bind_addr: SocketAddr = config.bind_address.parse()?;

        let builder = PrometheusBuilder::new().with_http_listener(bind_addr);
        builder.install()?;

        info!(%bind_addr, "prometheus metrics exporter listening");
        Ok(())
    }

    pub fn get() -> Option<&'static ObservabilitySystem> {
        OBSERVABILITY.get()
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }
}

/// Named metrics emitted across the pipeline, kept as static helpers so call sites read as
/// a single line rather than re-deriving metric names inline.
pub struct EventMetrics;

impl EventMetrics {
    pub fn event_processed(event_type: &str, source: &str) {
        counter!("eventide_events_processed_total").increment(1);
        counter!("eventide_events_processed_by_type_total", "event_type" => event_type.to_string())
            .increment(1);
        counter!("eventide_events_processed_by_source_total", "source" => source.to_string())
            .increment(1);
    }

    pub fn duplicate_suppressed(event_type: &str) {
        counter!("eventide_dedup_suppressed_total", "event_type" => event_type.to_string()).increment(1);
    }

    pub fn rule_skipped(event_type: &str, rule_id: &str) {
        counter!("eventide_rule_skipped_total",
                "event_type" => event_type.to_string(),
                "rule_id" => rule_id.to_string())
            .increment(1);
    }

    pub fn dispatch_result(action_type: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        counter!("eventide_dispatch_total", "action_type" => action_type.to_string(), "status" => status.to_string())
            .increment(1);
    }

    pub fn dlq_enqueued(retry_count: u32) {
        counter!("eventide_dlq_enqueued_total").increment(1);
        gauge!("eventide_dlq_last_retry_count").set(retry_count as f64);
    }

    pub fn terminal_parked(reason: &str) {
        counter!("eventide_dlq_terminal_parked_total", "reason" => reason.to_string()).increment(1);
    }

    pub fn queue_size(size: u64, queue_type: &str) {
        gauge!("eventide_queue_size", "queue_type" => queue_type.to_string()).set(size as f64);
    }
}

/// RAII duration recorder: records a histogram observation when dropped, whatever the
/// return path out of the enclosing scope.
pub struct PerfTimer {
    start: Instant,
    metric_name: String,
    labels: Vec<(String, String)>,
}

impl PerfTimer {
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            metric_name: metric_name.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            let duration = self.start.elapsed();
            let hist = histogram!(self.metric_name.clone());
            hist.record(duration.as_secs_f64());
        }
    }
}

/// Health check status for a single named component.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { reason: String },
}

/// A single component health check.
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self) -> HealthStatus;
}

/// Combines multiple checks into one overall status: unhealthy if any check is unhealthy,
/// else degraded if any is degraded, else healthy.
pub struct HealthAggregator {
    checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn add_check(mut self, check: Box<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn check_all(&self) -> Vec<(String, HealthStatus)> {
        self.checks
            .iter()
            .map(|check| (check.name().to_string(), check.check()))
            .collect()
    }

    pub fn overall_status(&self) -> HealthStatus {
        let results = self.check_all();

        let unhealthy: Vec<_> = results
            .iter()
            .filter_map(|(name, status)| match status {
                HealthStatus::Unhealthy { reason } => Some(format!("{}: {}", name, reason)),
                _ => None,
            })
            .collect();

        if !unhealthy.is_empty() {
            return HealthStatus::Unhealthy {
                reason: unhealthy.join(", "),
            };
        }

        let degraded: Vec<_> = results
            .iter()
            .filter_map(|(name, status)| match status {
                HealthStatus::Degraded { reason } => Some(format!("{}: {}", name, reason)),
                _ => None,
            })
            .collect();

        if !degraded.is_empty() {
            return HealthStatus::Degraded {
                reason: degraded.join(", "),
            };
        }

        HealthStatus::Healthy
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}
