//! Domain types for the event-choreography platform: inbound events, workflows and rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved payload namespace for pipeline coordination fields (e.g. `_retryCount`).
///
/// Anything under this prefix is internal bookkeeping stamped by the DLQ retry loop and
/// read by the engine; it must never be treated as part of the user-visible event contract.
pub const RESERVED_PAYLOAD_PREFIX: &str = "_";
const RETRY_COUNT_FIELD: &str = "_retryCount";

/// An event published by an external producer onto the input topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomingEvent {
    /// Dedup identity. Blank/absent bypasses the dedup gate entirely.
    #[serde(rename = "eventId")]
    pub event_id: String,

    #[serde(rename = "eventType")]
    pub event_type: String,

    pub source: String,

    /// Arbitrary JSON payload; conditions read from here.
    pub payload: Value,
}

impl IncomingEvent {
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>, source: impl Into<String>, payload: Value) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            source: source.into(),
            payload,
        }
    }

    /// Whether this event's id is present and should gate through dedup at all.
    pub fn has_dedup_identity(&self) -> bool {
        !self.event_id.trim().is_empty()
    }

    /// Current attempt count the engine should use for the next DLQ enqueue, read from the
    /// reserved `_retryCount` payload field. Coerces numeric JSON values; defaults to 0.
    pub fn retry_count(&self) -> u32 {
        self.payload
            .as_object()
            .and_then(|obj| obj.get(RETRY_COUNT_FIELD))
            .and_then(value_as_u32)
            .unwrap_or(0)
    }

    /// Stamp the reserved retry-count field into the payload, creating an object root if needed.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        let obj = match &mut self.payload {
            Value::Object(obj) => obj,
            other => {
                *other = Value::Object(Map::new());
                other.as_object_mut().expect("just set to object")
            }
        };
        obj.insert(RETRY_COUNT_FIELD.to_string(), Value::from(retry_count));
        self
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    if let Some(n) = value.as_i64() {
        return u32::try_from(n).ok();
    }
    value.as_f64().map(|n| n.max(0.0) as u32)
}

/// Lifecycle status of a workflow; only `Active` workflows are matching candidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    Active,
    Inactive,
}

/// The transport an action dispatches through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Kafka,
    Webhook,
    Http,
}

/// A `condition -> action` pair attached to a workflow. Owned by its parent workflow; the
/// engine consumes rules as values and must not mutate them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,

    /// Ascending priority; ties broken by stable insertion order.
    pub priority: i64,

    /// Null/blank condition always matches.
    pub condition: Option<String>,

    #[serde(rename = "actionType")]
    pub action_type: ActionType,

    /// JSON-encoded action config; required fields depend on `action_type`.
    #[serde(rename = "actionConfig")]
    pub action_config: String,
}

/// A named selector `(event_type, source, status)` plus an ordered rule sequence.
///
/// Uniqueness invariant enforced by the repository: at most one workflow per
/// `(event_type, source)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,

    #[serde(rename = "eventType")]
    pub event_type: String,

    pub source: String,
    pub status: WorkflowStatus,

    /// Pre-sorted by priority ascending, ties in insertion order. The repository port is
    /// responsible for establishing this order before handing a workflow to the engine.
    pub rules: Vec<Rule>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }
}
