pub mod actors;
pub mod agent;
pub mod channel;
pub mod config;
pub mod coords;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod log;
pub mod monitor;
pub mod queue;
pub mod state;
pub mod surface;
pub mod util;

pub use agent::{ActivityType, AgentId};
pub use error::{Error, Result};
pub use queue::{MessagePriority, MessageStatus};
pub use state::AgentPhase;
