//! Inactivity detection for agents.
//!
//! The `ActivityMonitor` sweeps the state store on a periodic tick and
//! flags agents whose activity timestamps have gone stale. Detection is
//! separated from action: the monitor performs FSM transitions through the
//! store and produces recommendations, but never invokes delivery. Acting
//! on a recommendation is the operator's call, which prevents runaway
//! automated recovery loops.
//!
//! Two thresholds are evaluated independently:
//! - the general threshold against `last_active_ts` marks the agent
//!   `Inactive`;
//! - the shorter messaging threshold against `last_message_ts` flags a
//!   stale messaging lane without forcing a phase change when other
//!   activity is recent.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::actors::ActorHandle;
use crate::agent::AgentId;
use crate::config::Config;
use crate::state::{AgentPhase, StateStore};
use crate::{hlog_debug, hlog_trace, hlog_warn};

/// Thresholds for inactivity detection. Values come from configuration;
/// the monitor carries no constants of its own.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time without any activity before an agent is marked inactive.
    pub general_threshold: Duration,
    /// Time without message delivery before the messaging lane is flagged.
    pub messaging_threshold: Duration,
}

impl MonitorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            general_threshold: config.general_threshold(),
            messaging_threshold: config.messaging_threshold(),
        }
    }
}

/// What the operator should do about a flagged agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Re-onboard the agent (Reset or Error state).
    Onboard,
    /// Send a high-priority nudge (active but messaging is stale).
    SendHighPriority,
    /// Nothing automated; leave it to the operator.
    None,
}

/// One flagged agent in an inactivity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactivityEntry {
    pub agent_id: AgentId,
    pub reason: String,
    pub recommended_action: RecommendedAction,
}

/// Outcome of one monitor sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactivityReport {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<InactivityEntry>,
}

/// Periodic inactivity detector over the state store.
#[derive(Clone)]
pub struct ActivityMonitor {
    config: MonitorConfig,
    store: Arc<StateStore>,
    latest: Arc<RwLock<Option<InactivityReport>>>,
}

impl ActivityMonitor {
    pub fn new(config: MonitorConfig, store: Arc<StateStore>) -> Self {
        Self {
            config,
            store,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// The most recent sweep result, if any sweep has run.
    pub async fn latest_report(&self) -> Option<InactivityReport> {
        self.latest.read().await.clone()
    }

    /// Run one sweep at the current time.
    pub async fn sweep(&self) -> InactivityReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep with an explicit notion of "now".
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> InactivityReport {
        let general = chrono::Duration::from_std(self.config.general_threshold)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let messaging = chrono::Duration::from_std(self.config.messaging_threshold)
            .unwrap_or_else(|_| chrono::Duration::MAX);

        let records = self.store.snapshot().await;
        hlog_trace!("ActivityMonitor: sweeping {} agents", records.len());

        let mut entries = Vec::new();
        for record in records {
            let generally_stale = now - record.last_active_ts > general;
            let messaging_stale = now - record.last_message_ts > messaging;

            let mut phase = record.phase;
            if generally_stale && phase == AgentPhase::Active {
                match self
                    .store
                    .set_state(&record.id, AgentPhase::Inactive, "no_activity")
                    .await
                {
                    Ok(()) => phase = AgentPhase::Inactive,
                    Err(e) => {
                        // Raced with a concurrent transition; next sweep
                        // re-evaluates.
                        hlog_warn!("Monitor could not mark {} inactive: {}", record.id, e);
                    }
                }
            }

            let entry = match phase {
                AgentPhase::Reset => Some(InactivityEntry {
                    agent_id: record.id.clone(),
                    reason: "not_onboarded".to_string(),
                    recommended_action: RecommendedAction::Onboard,
                }),
                AgentPhase::Error => Some(InactivityEntry {
                    agent_id: record.id.clone(),
                    reason: "error_state".to_string(),
                    recommended_action: RecommendedAction::Onboard,
                }),
                AgentPhase::Active if messaging_stale => Some(InactivityEntry {
                    agent_id: record.id.clone(),
                    reason: "messaging_inactive".to_string(),
                    recommended_action: RecommendedAction::SendHighPriority,
                }),
                AgentPhase::Inactive => Some(InactivityEntry {
                    agent_id: record.id.clone(),
                    reason: record
                        .inactivity_reason
                        .clone()
                        .unwrap_or_else(|| "no_activity".to_string()),
                    recommended_action: RecommendedAction::None,
                }),
                _ => None,
            };
            if let Some(entry) = entry {
                entries.push(entry);
            }
        }

        let report = InactivityReport {
            generated_at: now,
            entries,
        };
        *self.latest.write().await = Some(report.clone());
        hlog_debug!(
            "ActivityMonitor::sweep flagged={} at {}",
            report.entries.len(),
            now
        );
        report
    }

    /// Spawn the periodic sweep loop.
    pub fn spawn(self, interval: Duration) -> ActorHandle {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        hlog_debug!("ActivityMonitor::spawn interval={:?}", interval);

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => {
                        hlog_debug!("ActivityMonitor cancelled");
                        break;
                    }
                    _ = tick.tick() => {
                        self.sweep().await;
                    }
                }
            }
        });

        ActorHandle::new(cancel)
    }
}
