//! Read-only supervisory view over the store, queue, and monitor.
//!
//! The dashboard aggregates; it never mutates. Operator escalations
//! (re-onboarding, forced high-priority sends) go through the normal
//! enqueue/dispatch path so all state-changing I/O funnels through the
//! dispatcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::{ActivityMonitor, InactivityReport};
use crate::queue::{Message, MessageQueue};
use crate::state::{AgentRecord, StateStore};
use crate::{hlog_debug, Result};

/// Point-in-time aggregate for the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Fraction of agents currently active; 0 when no agents are known.
    pub swarm_health: f64,
    pub total_agents: usize,
    pub active_agents: usize,
    pub agents: Vec<AgentRecord>,
    pub inactivity: Option<InactivityReport>,
    pub failed_messages: Vec<Message>,
}

pub struct Dashboard {
    store: Arc<StateStore>,
    queue: Arc<MessageQueue>,
    monitor: ActivityMonitor,
}

impl Dashboard {
    pub fn new(store: Arc<StateStore>, queue: Arc<MessageQueue>, monitor: ActivityMonitor) -> Self {
        Self {
            store,
            queue,
            monitor,
        }
    }

    /// Fraction of agents in the `Active` phase.
    pub async fn swarm_health(&self) -> f64 {
        let total = self.store.agent_count().await;
        if total == 0 {
            return 0.0;
        }
        self.store.active_count().await as f64 / total as f64
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let total_agents = self.store.agent_count().await;
        let active_agents = self.store.active_count().await;
        let swarm_health = if total_agents == 0 {
            0.0
        } else {
            active_agents as f64 / total_agents as f64
        };

        DashboardSnapshot {
            generated_at: Utc::now(),
            swarm_health,
            total_agents,
            active_agents,
            agents: self.store.snapshot().await,
            inactivity: self.monitor.latest_report().await,
            failed_messages: self.queue.failed_messages().await,
        }
    }

    /// Persist a snapshot as JSON under `dir`, returning the written path.
    pub async fn persist_report(&self, dir: &Path) -> Result<PathBuf> {
        let snapshot = self.snapshot().await;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "report_{}.json",
            snapshot.generated_at.format("%Y%m%dT%H%M%S")
        ));
        std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        hlog_debug!("Dashboard::persist_report path={}", path.display());
        Ok(path)
    }
}
