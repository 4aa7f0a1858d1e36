//! The Choreography Engine (C5): the end-to-end per-event pipeline described in §4.2 —
//! dedup gate, workflow match, per-rule condition evaluation, dispatch, DLQ-on-failure.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use eventide_core::condition::Condition;
use eventide_core::domain::IncomingEvent;
use eventide_core::error::Result;
use eventide_core::ports::WorkflowRepository;
use eventide_core::processor::EventProcessor;
use eventide_dedup::DedupGate;
use eventide_dispatch::ActionDispatcher;
use eventide_dlq::DlqService;
use eventide_shared::observability::EventMetrics;

/// Stateless by construction (§9: "Reentrant-safe engine") — every piece of mutable state
/// lives behind the ports it holds, so `process` is safe to call concurrently from both the
/// bus consumer pool and the administrative event-submission endpoint.
pub struct ChoreographyEngine {
    dedup: Arc<DedupGate>,
    repository: Arc<dyn WorkflowRepository>,
    dispatcher: Arc<ActionDispatcher>,
    dlq: Arc<DlqService>,
}

impl ChoreographyEngine {
    pub fn new(
        dedup: Arc<DedupGate>,
        repository: Arc<dyn WorkflowRepository>,
        dispatcher: Arc<ActionDispatcher>,
        dlq: Arc<DlqService>,
    ) -> Self {
        Self {
            dedup,
            repository,
            dispatcher,
            dlq,
        }
    }

    /// Decode a raw bus message and run it through `process_event`. A message that doesn't
    /// decode as an `IncomingEvent` is an ingress deserialization failure (§7): it never
    /// reaches the dedup gate or the repository, it just goes straight to the DLQ raw
    /// envelope, which the retry loop will terminally park since it has no original event.
    pub async fn process_raw(&self, raw_message: &str) {
        match serde_json::from_str::<IncomingEvent>(raw_message) {
            Ok(event) => self.process_event(event).await,
            Err(err) => {
                warn!(error = %err, "failed to decode inbound message as an event");
                self.dlq.enqueue_raw(raw_message, err.to_string()).await;
            }
        }
    }

    /// `process(event)` (§4.2). Side-effecting; internally fallible but never propagates an
    /// error past this boundary, since both callers (bus consumer, administrative endpoint)
    /// need a uniform fire-and-forget contract.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, event_type = %event.event_type, source = %event.source))]
    pub async fn process_event(&self, event: IncomingEvent) {
        if self.dedup.is_duplicate(&event.event_id).await {
            info!("duplicate event suppressed");
            EventMetrics::duplicate_suppressed(&event.event_type);
            return;
        }

        let workflow = match self.repository.find_active(&event.event_type, &event.source).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                info!("no active workflow matches event_type/source");
                return;
            }
            Err(err) => {
                warn!(error = %err, "workflow repository lookup failed");
                return;
            }
        };

        let retry_count = event.retry_count();
        EventMetrics::event_processed(&event.event_type, &event.source);

        for rule in &workflow.rules {
            let condition = Condition::parse(rule.condition.as_deref().unwrap_or(""));
            if !condition.evaluate(&event.payload) {
                EventMetrics::rule_skipped(&event.event_type, &rule.id);
                continue;
            }

            let config: serde_json::Value = match serde_json::from_str(&rule.action_config) {
                Ok(config) => config,
                Err(err) => {
                    warn!(rule_id = %rule.id, error = %err, "malformed actionConfig JSON, treating as dispatch failure");
                    self.dlq.enqueue_failure(event.clone(), format!("malformed actionConfig: {err}"), retry_count).await;
                    continue;
                }
            };

            let action_type_label = format!("{:?}", rule.action_type);
            match self.dispatcher.dispatch(rule.action_type, &config, &event).await {
                Ok(()) => EventMetrics::dispatch_result(&action_type_label, true),
                Err(err) => {
                    warn!(rule_id = %rule.id, error = %err, "dispatch failed, enqueuing to DLQ");
                    EventMetrics::dispatch_result(&action_type_label, false);
                    self.dlq.enqueue_failure(event.clone(), err.to_string(), retry_count).await;
                }
            }
        }
    }
}

#[async_trait]
impl EventProcessor<String> for ChoreographyEngine {
    async fn process(&self, raw_message: String) -> Result<()> {
        self.process_raw(&raw_message).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryWorkflowRepository;
    use async_trait::async_trait;
    use chrono::Utc;
    use eventide_core::domain::{ActionType, Rule, Workflow, WorkflowStatus};
    use eventide_core::error::{EventideError, Result as CoreResult};
    use eventide_core::ports::{BusPort, HttpPort};
    use eventide_dedup::InMemoryKv;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        calls: Mutex<Vec<(String, Option<String>, Vec<u8>)>>,
        fail_topics: Vec<String>,
    }

    #[async_trait]
    impl BusPort for RecordingBus {
        async fn publish(&self, topic: &str, key: Option<&str>, body: &[u8]) -> CoreResult<()> {
            if self.fail_topics.iter().any(|t| t == topic) {
                return Err(EventideError::BusError("simulated transport failure".to_string()));
            }
            self.calls
                .lock()
                .await
                .push((topic.to_string(), key.map(str::to_string), body.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct UnusedHttp;

    #[async_trait]
    impl HttpPort for UnusedHttp {
        async fn request(&self, _m: &str, _u: &str, _h: &HashMap<String, String>, _b: &[u8]) -> CoreResult<u16> {
            Ok(200)
        }
    }

    fn rule(id: &str, priority: i64, condition: Option<&str>, action_config: serde_json::Value) -> Rule {
        Rule {
            id: id.to_string(),
            priority,
            condition: condition.map(str::to_string),
            action_type: ActionType::Kafka,
            action_config: action_config.to_string(),
        }
    }

    fn workflow(rules: Vec<Rule>) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: "wf-1".to_string(),
            name: "onboarding".to_string(),
            description: None,
            event_type: "customer.created".to_string(),
            source: "user-service".to_string(),
            status: WorkflowStatus::Active,
            rules,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_event(plan: &str) -> IncomingEvent {
        IncomingEvent::new("e1", "customer.created", "user-service", json!({"plan": plan}))
    }

    async fn build_engine(bus: Arc<RecordingBus>, repo: Arc<InMemoryWorkflowRepository>) -> ChoreographyEngine {
        let dedup = Arc::new(DedupGate::new(Arc::new(InMemoryKv::new()), "eventide:dedup:", Duration::from_secs(86_400), true));
        let dispatcher = Arc::new(ActionDispatcher::new(bus.clone(), Arc::new(UnusedHttp)));
        let dlq = Arc::new(DlqService::new(
            bus,
            eventide_dlq::DlqConfig {
                retry_topic: "eventide.dlq".to_string(),
                dead_topic: "eventide.dlq.dead".to_string(),
                max_retries: 3,
            },
        ));
        ChoreographyEngine::new(dedup, repo, dispatcher, dlq)
    }

    #[tokio::test]
    async fn happy_path_dispatches_once_and_enqueues_no_dlq() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        repo.upsert(workflow(vec![rule("r1", 1, Some("payload.plan == 'enterprise'"), json!({"topic": "onboarding"}))])).await;
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("enterprise")).await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "onboarding");
        assert_eq!(calls[0].1, Some("e1".to_string()));
    }

    #[tokio::test]
    async fn duplicate_event_is_suppressed() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        repo.upsert(workflow(vec![rule("r1", 1, Some("payload.plan == 'enterprise'"), json!({"topic": "onboarding"}))])).await;
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("enterprise")).await;
        engine.process_event(sample_event("enterprise")).await;

        assert_eq!(bus.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn non_matching_condition_skips_the_rule_without_a_dlq_entry() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        repo.upsert(workflow(vec![rule("r1", 1, Some("payload.plan == 'enterprise'"), json!({"topic": "onboarding"}))])).await;
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("standard")).await;

        assert!(bus.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_enqueues_to_the_dlq() {
        let bus = Arc::new(RecordingBus { fail_topics: vec!["onboarding".to_string()], ..Default::default() });
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        repo.upsert(workflow(vec![rule("r1", 1, Some("payload.plan == 'enterprise'"), json!({"topic": "onboarding"}))])).await;
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("enterprise")).await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "eventide.dlq");
        let body: serde_json::Value = serde_json::from_slice(&calls[0].2).unwrap();
        assert_eq!(body["retryCount"], 0);
        assert!(body["error"].as_str().unwrap().contains("simulated transport failure"));
    }

    #[tokio::test]
    async fn rules_fire_in_priority_order_with_stable_ties() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        repo.upsert(workflow(vec![
            rule("r1", 5, None, json!({"topic": "t1"})),
            rule("r2", 1, None, json!({"topic": "t2"})),
            rule("r3", 5, None, json!({"topic": "t3"})),
        ]))
        .await;
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("anything")).await;

        let calls = bus.calls.lock().await;
        let topics: Vec<&str> = calls.iter().map(|c| c.0.as_str()).collect();
        assert_eq!(topics, vec!["t2", "t1", "t3"]);
    }

    #[tokio::test]
    async fn no_matching_workflow_is_a_silent_noop() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("enterprise")).await;

        assert!(bus.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_action_config_is_a_dispatch_failure() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        let mut wf = workflow(vec![rule("r1", 1, None, json!({"topic": "onboarding"}))]);
        wf.rules[0].action_config = "not json".to_string();
        repo.upsert(wf).await;
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_event(sample_event("enterprise")).await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "eventide.dlq");
    }

    #[tokio::test]
    async fn unparseable_raw_message_is_enqueued_as_a_raw_dlq_envelope() {
        let bus = Arc::new(RecordingBus::default());
        let repo = Arc::new(InMemoryWorkflowRepository::new());
        let engine = build_engine(bus.clone(), repo).await;

        engine.process_raw("not json").await;

        let calls = bus.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "eventide.dlq");
        let body: serde_json::Value = serde_json::from_slice(&calls[0].2).unwrap();
        assert_eq!(body["rawMessage"], "not json");
    }
}
