//! Process entrypoint: load configuration, bring up observability, construct the transport
//! adapters behind each port, then run two worker pools — one consuming the input topic
//! through the choreography engine, one consuming the retry topic through the DLQ retry loop
//! — each on its own Kafka consumer group, until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use eventide_core::ports::{BusPort, HttpPort, KvPort, WorkflowRepository};
use eventide_core::processor::EventPipeline;
use eventide_dedup::{DedupGate, RedisKv};
use eventide_dispatch::{ActionDispatcher, KafkaBus, KafkaBusConfig, ReqwestHttpClient};
use eventide_dlq::{DlqConfig, DlqService, RetryLoop};
use eventide_engine::{ChoreographyEngine, InMemoryWorkflowRepository};
use eventide_shared::config::EventideConfig;
use eventide_shared::health::{ActivityBasedHealthCheck, AlwaysHealthy};
use eventide_shared::observability::{HealthAggregator, HealthCheck, HealthStatus, ObservabilitySystem};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EventideConfig::load().context("failed to load configuration")?;
    ObservabilitySystem::init(&config.observability).context("failed to initialize observability")?;
    info!("eventide starting up");

    let dedup_kv: Arc<dyn KvPort> = Arc::new(
        RedisKv::connect(&config.redis.url)
            .await
            .context("failed to connect to redis")?,
    );
    let dedup = Arc::new(DedupGate::new(
        dedup_kv,
        config.dedup.prefix.clone(),
        Duration::from_secs(config.dedup.ttl_seconds),
        config.dedup.fail_open,
    ));

    let bus: Arc<dyn BusPort> = Arc::new(
        KafkaBus::new(KafkaBusConfig {
            brokers: config.kafka.brokers.clone(),
            client_id: config.kafka.client_id.clone(),
            request_timeout_ms: config.kafka.request_timeout_ms,
            ..Default::default()
        })
        .context("failed to construct kafka producer")?,
    );

    let http: Arc<dyn HttpPort> = Arc::new(
        ReqwestHttpClient::new(Duration::from_millis(config.http.timeout_ms))
            .context("failed to construct http client")?,
    );

    let dispatcher = Arc::new(ActionDispatcher::new(bus.clone(), http));

    let dlq = Arc::new(DlqService::new(
        bus.clone(),
        DlqConfig {
            retry_topic: config.topics.dlq.clone(),
            dead_topic: config.topics.dlq_dead.clone(),
            max_retries: config.dlq.max_retries,
        },
    ));

    let repository: Arc<dyn WorkflowRepository> = Arc::new(InMemoryWorkflowRepository::new());

    let engine = Arc::new(ChoreographyEngine::new(dedup.clone(), repository, dispatcher, dlq.clone()));
    let retry_loop = Arc::new(RetryLoop::new(
        bus.clone(),
        dedup.clone(),
        dlq.clone(),
        config.topics.events.clone(),
        config.dlq.base_delay_ms,
    ));

    let input_pipeline = EventPipeline::new(engine, config.processing.buffer_size, config.processing.input_worker_count);
    let retry_pipeline = EventPipeline::new(retry_loop, config.processing.buffer_size, config.processing.retry_worker_count);

    let input_sender = input_pipeline.sender();
    let retry_sender = retry_pipeline.sender();

    let input_activity = Arc::new(ActivityBasedHealthCheck::new("input-consumer", Duration::from_secs(120)));
    let retry_activity = Arc::new(ActivityBasedHealthCheck::new("retry-consumer", Duration::from_secs(120)));

    let health = Arc::new(
        HealthAggregator::new()
            .add_check(Box::new(AlwaysHealthy::new("bootstrap")))
            .add_check(Box::new(ActivityRef(input_activity.clone())))
            .add_check(Box::new(ActivityRef(retry_activity.clone()))),
    );
    tokio::spawn(log_health_periodically(health));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let input_pipeline_handle = tokio::spawn(input_pipeline.run());
    let retry_pipeline_handle = tokio::spawn(retry_pipeline.run());

    let input_consumer_handle = tokio::spawn(consume_topic(
        config.kafka.brokers.clone(),
        config.kafka.main_consumer_group.clone(),
        config.kafka.session_timeout_ms,
        config.topics.events.clone(),
        input_sender,
        input_activity,
        shutdown_rx.clone(),
    ));
    let retry_consumer_handle = tokio::spawn(consume_topic(
        config.kafka.brokers.clone(),
        config.kafka.retry_consumer_group.clone(),
        config.kafka.session_timeout_ms,
        config.topics.dlq.clone(),
        retry_sender,
        retry_activity,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    let _ = input_consumer_handle.await;
    let _ = retry_consumer_handle.await;
    let _ = input_pipeline_handle.await;
    let _ = retry_pipeline_handle.await;

    info!("eventide stopped");
    Ok(())
}

/// Subscribes to one topic under one consumer group and forwards every message payload into
/// the worker pool's channel. Stops when told to shut down or when the sender side of the
/// pool has been dropped (the pool itself has gone away).
async fn consume_topic(
    brokers: Vec<String>,
    group_id: String,
    session_timeout_ms: u32,
    topic: String,
    sender: mpsc::Sender<String>,
    activity: Arc<ActivityBasedHealthCheck>,
    mut shutdown: watch::Receiver<bool>,
) {
    let consumer: StreamConsumer = match ClientConfig::new()
        .set("bootstrap.servers", brokers.join(","))
        .set("group.id", &group_id)
        .set("session.timeout.ms", session_timeout_ms.to_string())
        .set("enable.auto.commit", "true")
        .create()
    {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(%topic, %group_id, error = %err, "failed to create kafka consumer");
            return;
        }
    };

    if let Err(err) = consumer.subscribe(&[topic.as_str()]) {
        error!(%topic, error = %err, "failed to subscribe to topic");
        return;
    }

    info!(%topic, %group_id, "consumer subscribed");

    loop {
        tokio::select! {
            message = consumer.recv() => {
                match message {
                    Ok(message) => {
                        activity.record_activity().await;
                        match message.payload() {
                            Some(payload) => {
                                let body = String::from_utf8_lossy(payload).into_owned();
                                if sender.send(body).await.is_err() {
                                    warn!(%topic, "worker pool closed, stopping consumer");
                                    return;
                                }
                            }
                            None => warn!(%topic, "received message with empty payload"),
                        }
                    }
                    Err(err) => error!(%topic, error = %err, "kafka consumer error"),
                }
            }
            _ = shutdown.changed() => {
                info!(%topic, "consumer shutting down");
                return;
            }
        }
    }
}

async fn log_health_periodically(health: Arc<HealthAggregator>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    loop {
        ticker.tick().await;
        match health.overall_status() {
            HealthStatus::Healthy => info!("health check: healthy"),
            HealthStatus::Degraded { reason } => warn!(reason, "health check: degraded"),
            HealthStatus::Unhealthy { reason } => error!(reason, "health check: unhealthy"),
        }
    }
}

/// Adapts a shared `ActivityBasedHealthCheck` into a `HealthCheck` the aggregator can own,
/// so the same check can also be driven from the consumer loop via `record_activity`.
struct ActivityRef(Arc<ActivityBasedHealthCheck>);

impl HealthCheck for ActivityRef {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn check(&self) -> HealthStatus {
        self.0.check()
    }
}
