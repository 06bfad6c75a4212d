//! Agent lifecycle state store with transition validation.
//!
//! The `StateStore` owns every `AgentRecord` and is the only place agent
//! phases change. All transitions go through `set_state`, which checks the
//! edge against the legal-transition table; an illegal edge is rejected
//! with no partial mutation. The monitor and dispatcher communicate only
//! through this store, never with each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tokio::sync::RwLock;

use crate::agent::{ActivityRecord, ActivityType, AgentId};
use crate::{hlog_debug, hlog_warn, Error, Result};

/// Upper bound on retained activity evidence entries.
const ACTIVITY_LOG_CAP: usize = 1024;

/// Lifecycle phase of an agent. Closed set; invalid states are
/// unrepresentable. Extension data goes in `AgentRecord::metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Reset,
    Onboarding,
    Active,
    Inactive,
    MissionCompleted,
    Error,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentPhase::Reset => "reset",
            AgentPhase::Onboarding => "onboarding",
            AgentPhase::Active => "active",
            AgentPhase::Inactive => "inactive",
            AgentPhase::MissionCompleted => "mission_completed",
            AgentPhase::Error => "error",
        };
        f.write_str(s)
    }
}

impl AgentPhase {
    /// Check whether `from -> to` is a legal edge.
    ///
    /// Legal edges:
    /// - Reset -> Onboarding
    /// - Onboarding -> Active
    /// - Active <-> Inactive
    /// - Active -> MissionCompleted
    /// - any non-Error -> Error
    /// - Error -> Onboarding (re-onboard recovery)
    pub fn can_transition(from: AgentPhase, to: AgentPhase) -> bool {
        if to == AgentPhase::Error {
            return from != AgentPhase::Error;
        }
        matches!(
            (from, to),
            (AgentPhase::Reset, AgentPhase::Onboarding)
                | (AgentPhase::Onboarding, AgentPhase::Active)
                | (AgentPhase::Active, AgentPhase::Inactive)
                | (AgentPhase::Inactive, AgentPhase::Active)
                | (AgentPhase::Active, AgentPhase::MissionCompleted)
                | (AgentPhase::Error, AgentPhase::Onboarding)
        )
    }
}

/// Persistent record for one agent. Owned exclusively by the `StateStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub phase: AgentPhase,
    pub last_active_ts: DateTime<Utc>,
    pub last_message_ts: DateTime<Utc>,
    pub inactivity_reason: Option<String>,
    /// Set after injection retries were exhausted for this agent in the
    /// current session; routes subsequent deliveries straight to the
    /// mailbox. Not persisted.
    #[serde(skip)]
    pub injection_unreliable: bool,
    /// Free-form extension fields; the phase enum stays closed.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl AgentRecord {
    fn new(id: AgentId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            phase: AgentPhase::Reset,
            last_active_ts: now,
            last_message_ts: now,
            inactivity_reason: None,
            injection_unreliable: false,
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    agents: Vec<AgentRecord>,
    #[serde(default)]
    activity_log: Vec<ActivityRecord>,
}

#[derive(Default)]
struct Inner {
    agents: HashMap<AgentId, AgentRecord>,
    activity_log: Vec<ActivityRecord>,
}

/// Thread-safe store of agent lifecycle state.
pub struct StateStore {
    inner: RwLock<Inner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Load persisted state from `path`. A missing file yields an empty
    /// store. Session-scoped fields are reset by serde defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            hlog_debug!("StateStore::load no state file, starting empty");
            return Ok(Self::new());
        }
        let persisted: PersistedState = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let agents = persisted
            .agents
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<HashMap<_, _>>();
        hlog_debug!(
            "StateStore::load path={} agents={}",
            path.display(),
            agents.len()
        );
        Ok(Self {
            inner: RwLock::new(Inner {
                agents,
                activity_log: persisted.activity_log,
            }),
        })
    }

    /// Persist the store as JSON at `path`.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read().await;
        let mut agents: Vec<AgentRecord> = inner.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        let persisted = PersistedState {
            agents,
            activity_log: inner.activity_log.clone(),
        };
        drop(inner);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&persisted)?)?;
        hlog_debug!("StateStore::save path={}", path.display());
        Ok(())
    }

    /// Register an agent in the initial `Reset` phase. Idempotent.
    pub async fn register(&self, id: AgentId) {
        let mut inner = self.inner.write().await;
        inner
            .agents
            .entry(id.clone())
            .or_insert_with(|| AgentRecord::new(id, Utc::now()));
    }

    /// Fetch a snapshot of one agent's record.
    pub async fn get_state(&self, id: &AgentId) -> Result<AgentRecord> {
        self.inner
            .read()
            .await
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownAgent { id: id.clone() })
    }

    /// Check an agent exists without copying its record.
    pub async fn contains(&self, id: &AgentId) -> bool {
        self.inner.read().await.agents.contains_key(id)
    }

    /// Transition an agent to a new phase.
    ///
    /// The edge is validated against `AgentPhase::can_transition`; on an
    /// illegal edge the record is left untouched and `TransitionRejected`
    /// is returned.
    pub async fn set_state(
        &self,
        id: &AgentId,
        new_phase: AgentPhase,
        reason: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| Error::UnknownAgent { id: id.clone() })?;

        let from = record.phase;
        if !AgentPhase::can_transition(from, new_phase) {
            hlog_warn!(
                "Transition rejected for {}: {} -> {} ({})",
                id,
                from,
                new_phase,
                reason
            );
            return Err(Error::TransitionRejected {
                id: id.clone(),
                from: from.to_string(),
                to: new_phase.to_string(),
            });
        }

        record.phase = new_phase;
        match new_phase {
            AgentPhase::Inactive => {
                record.inactivity_reason = Some(reason.to_string());
            }
            AgentPhase::Onboarding => {
                // A fresh onboarding clears the session's delivery verdict.
                record.inactivity_reason = None;
                record.injection_unreliable = false;
            }
            _ => {
                record.inactivity_reason = None;
            }
        }
        hlog_debug!("{}: {} -> {} ({})", id, from, new_phase, reason);
        Ok(())
    }

    /// Record activity evidence for an agent at the current time.
    pub async fn record_activity(&self, id: &AgentId, activity_type: ActivityType) -> Result<()> {
        self.record_activity_at(id, activity_type, Utc::now()).await
    }

    /// Record activity evidence with an explicit timestamp.
    ///
    /// Timestamps are monotonically non-decreasing per agent: an older
    /// timestamp never rewinds the stored one. Genuine engagement pulls an
    /// `Inactive` agent back to `Active`.
    pub async fn record_activity_at(
        &self,
        id: &AgentId,
        activity_type: ActivityType,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| Error::UnknownAgent { id: id.clone() })?;

        record.last_active_ts = record.last_active_ts.max(ts);
        if activity_type == ActivityType::Messaging {
            record.last_message_ts = record.last_message_ts.max(ts);
        }

        if record.phase == AgentPhase::Inactive && activity_type.is_engagement() {
            record.phase = AgentPhase::Active;
            record.inactivity_reason = None;
            hlog_debug!("{}: inactive -> active ({})", id, activity_type.as_str());
        }

        inner.activity_log.push(ActivityRecord {
            agent_id: id.clone(),
            activity_type,
            ts,
        });
        if inner.activity_log.len() > ACTIVITY_LOG_CAP {
            let excess = inner.activity_log.len() - ACTIVITY_LOG_CAP;
            inner.activity_log.drain(..excess);
        }
        Ok(())
    }

    /// Mark injection as unreliable for this agent for the rest of the
    /// session. Delivery for the agent goes straight to the mailbox.
    pub async fn mark_injection_unreliable(&self, id: &AgentId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| Error::UnknownAgent { id: id.clone() })?;
        if !record.injection_unreliable {
            hlog_warn!("{}: injection marked unreliable for this session", id);
        }
        record.injection_unreliable = true;
        Ok(())
    }

    /// Snapshot of all agent records, ordered by id.
    pub async fn snapshot(&self) -> Vec<AgentRecord> {
        let inner = self.inner.read().await;
        let mut records: Vec<AgentRecord> = inner.agents.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub async fn agent_count(&self) -> usize {
        self.inner.read().await.agents.len()
    }

    pub async fn active_count(&self) -> usize {
        self.inner
            .read()
            .await
            .agents
            .values()
            .filter(|r| r.phase == AgentPhase::Active)
            .count()
    }

    /// Most recent activity evidence, newest last.
    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityRecord> {
        let inner = self.inner.read().await;
        let start = inner.activity_log.len().saturating_sub(limit);
        inner.activity_log[start..].to_vec()
    }
}
