use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::{hlog_debug, Error, Result};

/// Coordinator configuration, loaded from `~/.hive/hive.toml`.
///
/// Thresholds, retry counts, and backoff are deliberately external: the
/// monitor and dispatcher receive these values and carry no constants of
/// their own. The serde defaults below are documented fallbacks for a
/// missing config file, not behavior baked into component logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds without any activity before an agent is marked inactive.
    #[serde(default = "default_general_inactivity_secs")]
    pub general_inactivity_secs: u64,
    /// Seconds without message delivery before the messaging lane is
    /// considered stale. Expected shorter than the general threshold.
    #[serde(default = "default_messaging_inactivity_secs")]
    pub messaging_inactivity_secs: u64,
    /// Injection attempts per message before escalating to the mailbox.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff between injection attempts.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Bound on each individual injection step.
    #[serde(default = "default_injection_timeout_ms")]
    pub injection_timeout_ms: u64,
    /// Directory holding per-agent mailbox inbox files.
    pub mailbox_dir: Option<String>,
    /// Path to the coordinate table.
    pub coordinates_path: Option<String>,
    /// Path to the persisted agent state.
    pub state_path: Option<String>,
    /// Directory for persisted dashboard reports.
    pub reports_dir: Option<String>,
}

fn default_general_inactivity_secs() -> u64 {
    300
}

fn default_messaging_inactivity_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_injection_timeout_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general_inactivity_secs: default_general_inactivity_secs(),
            messaging_inactivity_secs: default_messaging_inactivity_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            injection_timeout_ms: default_injection_timeout_ms(),
            mailbox_dir: None,
            coordinates_path: None,
            state_path: None,
            reports_dir: None,
        }
    }
}

impl Config {
    pub fn hive_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".hive"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::hive_dir()?.join("hive.toml"))
    }

    pub fn general_threshold(&self) -> Duration {
        Duration::from_secs(self.general_inactivity_secs)
    }

    pub fn messaging_threshold(&self) -> Duration {
        Duration::from_secs(self.messaging_inactivity_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn injection_timeout(&self) -> Duration {
        Duration::from_millis(self.injection_timeout_ms)
    }

    pub fn mailbox_dir(&self) -> Result<PathBuf> {
        match &self.mailbox_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::hive_dir()?.join("mailbox")),
        }
    }

    pub fn coordinates_path(&self) -> Result<PathBuf> {
        match &self.coordinates_path {
            Some(path) => Ok(expand_tilde(path)),
            None => Ok(Self::hive_dir()?.join("coordinates.toml")),
        }
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(expand_tilde(path)),
            None => Ok(Self::hive_dir()?.join("state.json")),
        }
    }

    pub fn reports_dir(&self) -> Result<PathBuf> {
        match &self.reports_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::hive_dir()?.join("reports")),
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        hlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            hlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        hlog_debug!(
            "Config loaded: general={}s messaging={}s max_retries={} backoff={}ms",
            config.general_inactivity_secs,
            config.messaging_inactivity_secs,
            config.max_retries,
            config.backoff_base_ms
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let hive_dir = Self::hive_dir()?;
        if !hive_dir.exists() {
            fs::create_dir_all(&hive_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        hlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let hive_dir = Self::hive_dir()?;
        let mailbox_dir = self.mailbox_dir()?;
        let reports_dir = self.reports_dir()?;
        hlog_debug!(
            "Config::ensure_dirs hive={} mailbox={} reports={}",
            hive_dir.display(),
            mailbox_dir.display(),
            reports_dir.display()
        );
        for dir in [&hive_dir, &mailbox_dir, &reports_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
