//! Coordinate registry mapping agents to input-target locations.
//!
//! Each agent owns exactly one binding: the screen point where synthetic
//! input is aimed and the window identifier used to bring the agent's
//! window into focus. The table lives in `coordinates.toml` and can be
//! reloaded at runtime without restarting the coordinator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::agent::AgentId;
use crate::{hlog_debug, Error, Result};

/// Where injected input for one agent is aimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateBinding {
    /// Horizontal target of the pointer click.
    pub x: i32,
    /// Vertical target of the pointer click.
    pub y: i32,
    /// Window identifier handed to the input surface for focusing.
    pub window: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CoordinateFile {
    #[serde(default)]
    agents: HashMap<AgentId, CoordinateBinding>,
}

/// Registry of coordinate bindings, one per known agent.
///
/// The registry is the authority on which agent ids exist; the state store
/// is seeded from `known_agents()` at startup.
pub struct CoordinateRegistry {
    path: PathBuf,
    bindings: RwLock<HashMap<AgentId, CoordinateBinding>>,
}

impl CoordinateRegistry {
    /// Load the registry from a TOML table at `path`.
    ///
    /// A missing file yields an empty registry rather than an error so a
    /// fresh install can start and be configured afterwards.
    pub fn load(path: &Path) -> Result<Self> {
        let bindings = read_bindings(path)?;
        hlog_debug!(
            "CoordinateRegistry::load path={} agents={}",
            path.display(),
            bindings.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            bindings: RwLock::new(bindings),
        })
    }

    /// Re-read the coordinate table from disk, replacing the in-memory
    /// table atomically. Callers keep working against the old table until
    /// the swap completes.
    pub async fn reload(&self) -> Result<usize> {
        let bindings = read_bindings(&self.path)?;
        let count = bindings.len();
        *self.bindings.write().await = bindings;
        hlog_debug!("CoordinateRegistry::reload agents={}", count);
        Ok(count)
    }

    /// Resolve the binding for an agent.
    pub async fn resolve(&self, id: &AgentId) -> Result<CoordinateBinding> {
        self.bindings
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownAgent { id: id.clone() })
    }

    /// All agent ids the registry knows about.
    pub async fn known_agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.bindings.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_bindings(path: &Path) -> Result<HashMap<AgentId, CoordinateBinding>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let file: CoordinateFile = toml::from_str(&std::fs::read_to_string(path)?)?;
    Ok(file.agents)
}
