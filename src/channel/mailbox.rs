//! Fallback delivery transport: durable per-agent mailbox files.
//!
//! Each agent has one append-only inbox consumed by its own poll loop. An
//! entry is a header line with the delivery timestamp and priority, the
//! body, and a terminating blank line:
//!
//! ```text
//! [2026-08-29T12:00:00Z] priority=high
//! Resume work on the open contract.
//!
//! ```
//!
//! The entry format is a contract boundary with the agents' poll routines;
//! change it only in lockstep with them. Unlike injection, mailbox writes
//! target independent files and need no global lock.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::agent::AgentId;
use crate::channel::DeliveryChannel;
use crate::queue::MessagePriority;
use crate::util::blocking_with_timeout;
use crate::{hlog_debug, Error, Result};

pub struct MailboxChannel {
    dir: PathBuf,
    write_timeout: Duration,
}

impl MailboxChannel {
    pub fn new(dir: impl Into<PathBuf>, write_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            write_timeout,
        }
    }

    /// Inbox file for one agent.
    pub fn inbox_path(&self, agent_id: &AgentId) -> PathBuf {
        self.dir.join(format!("{}.inbox", agent_id))
    }

    /// Render one inbox entry in the stable on-disk format.
    pub fn format_entry(ts: DateTime<Utc>, priority: MessagePriority, body: &str) -> String {
        format!(
            "[{}] priority={}\n{}\n\n",
            ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            priority.as_str(),
            body
        )
    }

    fn append_entry(path: &Path, entry: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::MailboxWrite(format!("{}: {}", parent.display(), e)))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::MailboxWrite(format!("{}: {}", path.display(), e)))?;
        file.write_all(entry.as_bytes())
            .map_err(|e| Error::MailboxWrite(format!("{}: {}", path.display(), e)))?;
        // The inbox is the durable fallback; make the entry survive a crash.
        file.sync_data()
            .map_err(|e| Error::MailboxWrite(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for MailboxChannel {
    fn name(&self) -> &'static str {
        "mailbox"
    }

    async fn deliver(
        &self,
        agent_id: &AgentId,
        body: &str,
        priority: MessagePriority,
    ) -> Result<()> {
        let path = self.inbox_path(agent_id);
        let entry = Self::format_entry(Utc::now(), priority, body);
        hlog_debug!(
            "MailboxChannel::deliver agent={} path={} bytes={}",
            agent_id,
            path.display(),
            entry.len()
        );

        blocking_with_timeout(self.write_timeout, move || Self::append_entry(&path, &entry))
            .await
            .map_err(|e| match e {
                Error::Timeout(d) => Error::MailboxWrite(format!("write timed out after {:?}", d)),
                other => other,
            })
    }
}
