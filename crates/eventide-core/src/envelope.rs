//! Envelopes carried on the retry and dead-letter topics.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::IncomingEvent;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Failed-dispatch envelope: an event that reached the dispatcher but could not be
/// delivered, bound for the retry topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedEnvelope {
    #[serde(rename = "originalEvent")]
    pub original_event: IncomingEvent,

    pub error: String,

    #[serde(rename = "retryCount")]
    pub retry_count: u32,

    pub timestamp: i64,
}

impl FailedEnvelope {
    pub fn new(original_event: IncomingEvent, error: impl Into<String>, retry_count: u32) -> Self {
        Self {
            original_event,
            error: error.into(),
            retry_count,
            timestamp: now_millis(),
        }
    }
}

/// Raw-ingress envelope: a message that could not be decoded as an `IncomingEvent` at all,
/// so there is no original event to carry forward. Always enqueued at `retryCount = 0`, but
/// the retry loop treats it as immediately terminal (§4.6 step 3) since there is nothing
/// structurally sound to retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEnvelope {
    #[serde(rename = "rawMessage")]
    pub raw_message: String,

    pub error: String,

    #[serde(rename = "retryCount")]
    pub retry_count: u32,

    pub timestamp: i64,
}

impl RawEnvelope {
    pub fn new(raw_message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            raw_message: raw_message.into(),
            error: error.into(),
            retry_count: 0,
            timestamp: now_millis(),
        }
    }
}

/// Terminal parking record on the dead topic. Carries the original DLQ message verbatim
/// (not reparsed) so a terminal entry never fails to encode, whatever condition produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminalEnvelope {
    #[serde(rename = "originalDlqMessage")]
    pub original_dlq_message: String,

    pub reason: String,

    pub timestamp: i64,
}

impl TerminalEnvelope {
    pub fn new(original_dlq_message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            original_dlq_message: original_dlq_message.into(),
            reason: reason.into(),
            timestamp: now_millis(),
        }
    }
}
