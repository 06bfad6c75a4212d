use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Unknown agent: {id}")]
    UnknownAgent { id: crate::agent::AgentId },

    #[error("Transition rejected for {id}: {from} -> {to}")]
    TransitionRejected {
        id: crate::agent::AgentId,
        from: String,
        to: String,
    },

    #[error("Delivery timed out after {0:?}")]
    DeliveryTimeout(std::time::Duration),

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Mailbox write failed: {0}")]
    MailboxWrite(String),

    #[error("Delivery failed for {id} after {attempts} attempts and mailbox fallback")]
    DeliveryFailed {
        id: crate::agent::AgentId,
        attempts: u32,
    },

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Input surface error: {0}")]
    Surface(String),
}

pub type Result<T> = std::result::Result<T, Error>;
