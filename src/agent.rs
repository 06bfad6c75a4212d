//! Agent identity and activity evidence.
//!
//! Agents are external worker processes the coordinator cannot observe
//! directly. They are known only by their operator-assigned id, their
//! coordinate binding, and the state record kept in the `StateStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator-assigned agent identifier (e.g. "agent-3").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of activity evidence observed for an agent.
///
/// `Messaging` only proves the delivery pipeline reached the agent;
/// `Task` and `StatusUpdate` indicate genuine engagement and may pull an
/// `Inactive` agent back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Messaging,
    Task,
    StatusUpdate,
}

impl ActivityType {
    /// Whether this activity counts as genuine engagement (vs. the
    /// coordinator merely having delivered something).
    pub fn is_engagement(&self) -> bool {
        matches!(self, ActivityType::Task | ActivityType::StatusUpdate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Messaging => "messaging",
            ActivityType::Task => "task",
            ActivityType::StatusUpdate => "status_update",
        }
    }
}

/// Append-only evidence entry feeding state timestamp updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub agent_id: AgentId,
    pub activity_type: ActivityType,
    pub ts: DateTime<Utc>,
}
