//! The Workflow Repository port (C7): a lookup of the unique active workflow for an
//! `(eventType, source)` pair. The administrative HTTP surface and its persistent store are
//! out of scope (§1); this in-memory implementation stands in for both in tests and local
//! runs that don't have that surface attached.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use eventide_core::domain::{Rule, Workflow};
use eventide_core::error::Result;
use eventide_core::ports::WorkflowRepository;

/// Keyed by `(eventType, source)`, enforcing the uniqueness invariant at the write side: a
/// second `upsert` for the same key replaces the first rather than creating a duplicate.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<(String, String), Workflow>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the workflow for its `(eventType, source)` key, sorting its rules
    /// priority-ascending (ties in original order) the way the repository promises callers.
    pub async fn upsert(&self, mut workflow: Workflow) {
        sort_rules_stable(&mut workflow.rules);
        let key = (workflow.event_type.clone(), workflow.source.clone());
        self.workflows.write().await.insert(key, workflow);
    }

    pub async fn remove(&self, event_type: &str, source: &str) {
        self.workflows
            .write()
            .await
            .remove(&(event_type.to_string(), source.to_string()));
    }
}

fn sort_rules_stable(rules: &mut [Rule]) {
    rules.sort_by_key(|rule| rule.priority);
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_active(&self, event_type: &str, source: &str) -> Result<Option<Workflow>> {
        let workflows = self.workflows.read().await;
        Ok(workflows
            .get(&(event_type.to_string(), source.to_string()))
            .filter(|workflow| workflow.is_active())
            .cloned())
    }
}
