//! Primary delivery transport: synthetic input injection.
//!
//! The injection channel resolves the agent's coordinate binding, focuses
//! the window, clicks the input region, types the body, and submits. HIGH
//! priority submits with the bypass key combination so the message is
//! processed ahead of input already pending in the window.
//!
//! The machine has one pointer and one keyboard, so at most one injection
//! may be in flight across the whole system. That serialization lives here
//! as a single exclusive lock around the delivery steps; mailbox deliveries
//! are unaffected by it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::agent::AgentId;
use crate::channel::DeliveryChannel;
use crate::coords::CoordinateRegistry;
use crate::queue::MessagePriority;
use crate::surface::InputSurface;
use crate::util::blocking_with_timeout;
use crate::{hlog_debug, Error, Result};

pub struct InjectionChannel<S: InputSurface> {
    surface: Arc<S>,
    registry: Arc<CoordinateRegistry>,
    /// The one physical input surface. Held for the full focus-click-type-
    /// submit sequence of a single delivery.
    lock: Mutex<()>,
    step_timeout: Duration,
}

impl<S: InputSurface> InjectionChannel<S> {
    pub fn new(surface: S, registry: Arc<CoordinateRegistry>, step_timeout: Duration) -> Self {
        Self {
            surface: Arc::new(surface),
            registry,
            lock: Mutex::new(()),
            step_timeout,
        }
    }

    /// Run one blocking surface step under the per-step timeout, mapping a
    /// timeout to the delivery taxonomy.
    async fn step<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&S) -> Result<()> + Send + 'static,
    {
        let surface = self.surface.clone();
        blocking_with_timeout(self.step_timeout, move || f(&surface))
            .await
            .map_err(|e| match e {
                Error::Timeout(d) => Error::DeliveryTimeout(d),
                other => other,
            })
    }
}

#[async_trait]
impl<S: InputSurface> DeliveryChannel for InjectionChannel<S> {
    fn name(&self) -> &'static str {
        "injection"
    }

    async fn deliver(
        &self,
        agent_id: &AgentId,
        body: &str,
        priority: MessagePriority,
    ) -> Result<()> {
        // Stale binding (agent removed from the table) is unreachable, not
        // a crash.
        let binding = self.registry.resolve(agent_id).await?;

        let _guard = self.lock.lock().await;
        hlog_debug!(
            "InjectionChannel::deliver agent={} window={} priority={}",
            agent_id,
            binding.window,
            priority.as_str()
        );

        let window = binding.window.clone();
        self.step(move |s| s.focus_window(&window)).await?;

        let click_binding = binding.clone();
        self.step(move |s| s.move_and_click(&click_binding)).await?;

        let text = body.to_string();
        self.step(move |s| s.type_text(&text)).await?;

        match priority {
            MessagePriority::High => self.step(|s| s.submit_bypass()).await?,
            MessagePriority::Normal => self.step(|s| s.submit()).await?,
        }

        hlog_debug!("InjectionChannel::deliver agent={} ok", agent_id);
        Ok(())
    }
}
