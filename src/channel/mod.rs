//! Delivery channel contract and its two transports.
//!
//! The dispatcher speaks only this contract; whether a directive reaches an
//! agent by synthetic input injection or by an append to its mailbox file
//! is a policy decision layered on top. Additional transports slot in
//! without touching dispatcher logic.

pub mod injection;
pub mod mailbox;

use async_trait::async_trait;

pub use injection::InjectionChannel;
pub use mailbox::MailboxChannel;

use crate::agent::AgentId;
use crate::queue::MessagePriority;
use crate::Result;

/// Common contract for delivering one directive to one agent.
///
/// Success means the payload was handed to the agent's input surface or
/// inbox; it says nothing about the target application processing it.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Short channel name for logging and failure reasons.
    fn name(&self) -> &'static str;

    /// Deliver `body` to `agent_id`. All failures come back as ordinary
    /// errors; a delivery attempt never panics and never hangs.
    async fn deliver(
        &self,
        agent_id: &AgentId,
        body: &str,
        priority: MessagePriority,
    ) -> Result<()>;
}
