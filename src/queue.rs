//! Per-agent priority-stratified message queues.
//!
//! Each agent owns two FIFO lanes, HIGH and NORMAL; the HIGH lane is always
//! drained first. Lanes for different agents are guarded independently so
//! one agent's backlog never blocks another's. Messages stay owned by the
//! queue until they reach a terminal status, then move to the archive where
//! failed deliveries remain visible to the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::agent::AgentId;
use crate::state::StateStore;
use crate::{hlog_debug, Error, Result};

/// Delivered messages retained in the archive.
const DELIVERED_ARCHIVE_CAP: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Normal,
    High,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Normal => "normal",
            MessagePriority::High => "high",
        }
    }
}

impl std::str::FromStr for MessagePriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(MessagePriority::Normal),
            "high" => Ok(MessagePriority::High),
            other => Err(Error::Validation(format!("Invalid priority: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    InFlight,
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Delivered | MessageStatus::Failed)
    }
}

/// A directive addressed to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub target: AgentId,
    pub body: String,
    pub priority: MessagePriority,
    pub created_ts: DateTime<Utc>,
    pub delivery_attempts: u32,
    pub status: MessageStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Default)]
struct AgentLanes {
    high: VecDeque<Message>,
    normal: VecDeque<Message>,
}

impl AgentLanes {
    fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }
}

#[derive(Debug, Default)]
struct Archive {
    delivered: VecDeque<Message>,
    failed: Vec<Message>,
}

/// Queue of pending directives, stratified per agent and per priority.
pub struct MessageQueue {
    next_id: AtomicU64,
    lanes: RwLock<HashMap<AgentId, Arc<Mutex<AgentLanes>>>>,
    archive: Mutex<Archive>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            lanes: RwLock::new(HashMap::new()),
            archive: Mutex::new(Archive::default()),
        }
    }

    /// Enqueue a directive for `target`.
    ///
    /// The target is validated against the state store before anything is
    /// created; an unknown agent leaves the queue untouched.
    pub async fn enqueue(
        &self,
        store: &StateStore,
        target: &AgentId,
        body: impl Into<String>,
        priority: MessagePriority,
    ) -> Result<u64> {
        if !store.contains(target).await {
            return Err(Error::UnknownAgent { id: target.clone() });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id,
            target: target.clone(),
            body: body.into(),
            priority,
            created_ts: Utc::now(),
            delivery_attempts: 0,
            status: MessageStatus::Pending,
            failure_reason: None,
        };

        let lanes = self.lanes_for(target).await;
        let mut lanes = lanes.lock().await;
        match priority {
            MessagePriority::High => lanes.high.push_back(message),
            MessagePriority::Normal => lanes.normal.push_back(message),
        }
        hlog_debug!(
            "enqueue id={} target={} priority={} depth={}",
            id,
            target,
            priority.as_str(),
            lanes.len()
        );
        Ok(id)
    }

    /// Pop the next deliverable message for an agent: HIGH lane first, FIFO
    /// within a lane. The popped message becomes `InFlight`.
    pub async fn pop_next(&self, id: &AgentId) -> Option<Message> {
        let lanes = self.lanes.read().await.get(id).cloned()?;
        let mut lanes = lanes.lock().await;
        let mut message = lanes
            .high
            .pop_front()
            .or_else(|| lanes.normal.pop_front())?;
        message.status = MessageStatus::InFlight;
        Some(message)
    }

    /// Return a message to the head of its lane, un-attempted work first.
    pub async fn requeue_front(&self, mut message: Message) {
        message.status = MessageStatus::Pending;
        let lanes = self.lanes_for(&message.target).await;
        let mut lanes = lanes.lock().await;
        match message.priority {
            MessagePriority::High => lanes.high.push_front(message),
            MessagePriority::Normal => lanes.normal.push_front(message),
        }
    }

    /// Move a terminally-statused message into the archive.
    pub async fn archive(&self, message: Message) {
        debug_assert!(message.status.is_terminal());
        let mut archive = self.archive.lock().await;
        match message.status {
            MessageStatus::Failed => archive.failed.push(message),
            _ => {
                archive.delivered.push_back(message);
                if archive.delivered.len() > DELIVERED_ARCHIVE_CAP {
                    archive.delivered.pop_front();
                }
            }
        }
    }

    /// Undeliverable messages, surfaced to the dashboard.
    pub async fn failed_messages(&self) -> Vec<Message> {
        self.archive.lock().await.failed.clone()
    }

    pub async fn delivered_count(&self) -> usize {
        self.archive.lock().await.delivered.len()
    }

    /// Agents with at least one pending message, ordered by id.
    pub async fn pending_agents(&self) -> Vec<AgentId> {
        let lanes_map = self.lanes.read().await;
        let mut ids = Vec::new();
        for (id, lanes) in lanes_map.iter() {
            if lanes.lock().await.len() > 0 {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }

    pub async fn pending_count(&self, id: &AgentId) -> usize {
        match self.lanes.read().await.get(id) {
            Some(lanes) => lanes.lock().await.len(),
            None => 0,
        }
    }

    async fn lanes_for(&self, id: &AgentId) -> Arc<Mutex<AgentLanes>> {
        if let Some(lanes) = self.lanes.read().await.get(id) {
            return lanes.clone();
        }
        let mut map = self.lanes.write().await;
        map.entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AgentLanes::default())))
            .clone()
    }
}
