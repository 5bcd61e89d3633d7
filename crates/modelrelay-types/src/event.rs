//! Attempt events emitted by the router to metrics recorders.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::{ErrorCategory, ProviderId};

/// Which router operation an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Complete,
    Stream,
    Embed,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Complete => "complete",
            Operation::Stream => "stream",
            Operation::Embed => "embed",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed adapter call, successful or not.
///
/// Cancelled calls produce no event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptEvent {
    pub request_id: Uuid,
    pub provider_id: ProviderId,
    pub model: Option<String>,
    pub operation: Operation,
    /// 1-based attempt number against this provider.
    pub attempt: u32,
    pub latency: Duration,
    pub success: bool,
    pub error_category: Option<ErrorCategory>,
    pub tokens_used: Option<u32>,
    pub timestamp: DateTime<Utc>,
}
