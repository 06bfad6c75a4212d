//! Message dispatch with retry, backoff, and mailbox escalation.
//!
//! The dispatcher is the only component that performs delivery. It drains
//! each agent's queue HIGH lane first, chooses a channel per the selection
//! policy, retries injection with exponential backoff, escalates to the
//! mailbox as a one-shot fallback, and records the outcome in the queue
//! archive and the state store. Per-agent workers run in parallel; the
//! injection channel's own lock is the only cross-agent serialization
//! point.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::actors::ActorHandle;
use crate::agent::{ActivityType, AgentId};
use crate::channel::DeliveryChannel;
use crate::config::Config;
use crate::queue::{Message, MessageQueue, MessageStatus};
use crate::state::{AgentPhase, StateStore};
use crate::{hlog_debug, hlog_warn, Error, Result};

/// Retry policy knobs, from configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Injection attempts per message before escalating to the mailbox.
    pub max_retries: u32,
    /// Base delay for exponential backoff between injection attempts.
    pub backoff_base: Duration,
}

impl DispatchConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
        }
    }
}

/// Outcome counts for one drain pass over an agent's queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<StateStore>,
    queue: Arc<MessageQueue>,
    injection: Arc<dyn DeliveryChannel>,
    mailbox: Arc<dyn DeliveryChannel>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<StateStore>,
        queue: Arc<MessageQueue>,
        injection: Arc<dyn DeliveryChannel>,
        mailbox: Arc<dyn DeliveryChannel>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            queue,
            injection,
            mailbox,
            config,
        }
    }

    /// Pop the next message for `id` and drive it to a terminal status.
    ///
    /// Returns `Ok(None)` when the agent's queue is empty, `Ok(Some(msg))`
    /// with the delivered message, or `DeliveryFailed` when both channels
    /// were exhausted (the message is archived as failed, not dropped).
    pub async fn dispatch_next(&self, id: &AgentId) -> Result<Option<Message>> {
        let Some(mut message) = self.queue.pop_next(id).await else {
            return Ok(None);
        };

        let record = self.store.get_state(id).await?;
        // Agents not yet able to process live injection, and agents whose
        // injection proved unreliable this session, go straight to the
        // mailbox.
        let mailbox_only = matches!(record.phase, AgentPhase::Reset | AgentPhase::Onboarding)
            || record.injection_unreliable;

        let outcome = if mailbox_only {
            hlog_debug!(
                "dispatch id={} msg={} via mailbox (phase={} unreliable={})",
                id,
                message.id,
                record.phase,
                record.injection_unreliable
            );
            self.mailbox
                .deliver(id, &message.body, message.priority)
                .await
        } else {
            self.inject_with_retries(id, &mut message).await
        };

        match outcome {
            Ok(()) => {
                message.status = MessageStatus::Delivered;
                let created_ts = message.created_ts;
                self.queue.archive(message.clone()).await;
                // Delivery evidence; keeps last_message_ts >= created_ts.
                self.store
                    .record_activity_at(id, ActivityType::Messaging, created_ts.max(chrono::Utc::now()))
                    .await?;
                hlog_debug!("dispatch id={} msg={} delivered", id, message.id);
                Ok(Some(message))
            }
            Err(e) => {
                let attempts = message.delivery_attempts;
                message.status = MessageStatus::Failed;
                message.failure_reason = Some(e.to_string());
                hlog_warn!(
                    "dispatch id={} msg={} failed after {} attempts: {}",
                    id,
                    message.id,
                    attempts,
                    e
                );
                self.queue.archive(message).await;
                Err(Error::DeliveryFailed {
                    id: id.clone(),
                    attempts,
                })
            }
        }
    }

    /// Injection with exponential backoff; on exhaustion the agent is
    /// marked unreliable for the session and the mailbox gets one shot.
    async fn inject_with_retries(&self, id: &AgentId, message: &mut Message) -> Result<()> {
        let mut last_err: Option<Error> = None;

        while message.delivery_attempts < self.config.max_retries {
            message.delivery_attempts += 1;
            match self
                .injection
                .deliver(id, &message.body, message.priority)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    hlog_warn!(
                        "injection attempt {}/{} for {} failed: {}",
                        message.delivery_attempts,
                        self.config.max_retries,
                        id,
                        e
                    );
                    last_err = Some(e);
                    if message.delivery_attempts < self.config.max_retries {
                        let backoff = self.config.backoff_base
                            * 2u32.saturating_pow(message.delivery_attempts - 1);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        self.store.mark_injection_unreliable(id).await?;
        hlog_warn!(
            "injection exhausted for {} ({:?}), escalating to mailbox",
            id,
            last_err
        );
        self.mailbox
            .deliver(id, &message.body, message.priority)
            .await
    }

    /// Drain everything pending for one agent. A failed message is archived
    /// and the drain continues; one poisoned message never blocks the rest.
    pub async fn drain_agent(&self, id: &AgentId) -> DrainStats {
        let mut stats = DrainStats::default();
        loop {
            match self.dispatch_next(id).await {
                Ok(Some(_)) => stats.delivered += 1,
                Ok(None) => break,
                Err(e) => {
                    stats.failed += 1;
                    if matches!(e, Error::UnknownAgent { .. }) {
                        break;
                    }
                }
            }
        }
        stats
    }

    /// One dispatch pass: drain all backlogged agents in parallel.
    pub async fn tick(&self) -> DrainStats {
        let agents = self.queue.pending_agents().await;
        if agents.is_empty() {
            return DrainStats::default();
        }

        let tasks: Vec<_> = agents
            .into_iter()
            .map(|id| {
                let dispatcher = self.clone();
                tokio::spawn(async move { dispatcher.drain_agent(&id).await })
            })
            .collect();

        let mut total = DrainStats::default();
        for result in join_all(tasks).await {
            match result {
                Ok(stats) => {
                    total.delivered += stats.delivered;
                    total.failed += stats.failed;
                }
                Err(join_err) => {
                    hlog_warn!("dispatch worker panicked: {}", join_err);
                }
            }
        }
        total
    }

    /// Spawn the periodic dispatch loop.
    pub fn spawn(self, interval: Duration) -> ActorHandle {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        hlog_debug!("Dispatcher::spawn interval={:?}", interval);

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => {
                        hlog_debug!("Dispatcher cancelled");
                        break;
                    }
                    _ = tick.tick() => {
                        self.tick().await;
                    }
                }
            }
        });

        ActorHandle::new(cancel)
    }
}
