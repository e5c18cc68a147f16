use thiserror::Error;

use crate::host::BootStatus;

pub type Result<T> = std::result::Result<T, HostBootError>;

#[derive(Error, Debug)]
pub enum HostBootError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Registration timed out for host {0}")]
    RegistrationTimeout(String),

    #[error("Invalid transition for host {host}: {from} -> {to}")]
    InvalidTransition {
        host: String,
        from: BootStatus,
        to: BootStatus,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Submission is locked until host checks complete")]
    SubmitLocked,

    #[error("Retry unavailable: {0}")]
    RetryUnavailable(String),

    #[error("No hosts provided")]
    NoHosts,

    #[error("Invalid host name: {0}")]
    InvalidHostName(String),

    #[error("SSH private key is required for automatic install")]
    MissingSshKey,
}

impl HostBootError {
    /// Errors worth another attempt within a poll chain.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HostBootError::Transport(_) | HostBootError::MalformedResponse(_)
        )
    }
}
