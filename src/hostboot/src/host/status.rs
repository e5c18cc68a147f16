//! Host lifecycle status and its transition table.

use serde::{Deserialize, Serialize};

/// Per-host position in the bootstrap/registration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BootStatus {
    /// Waiting for bootstrap to report on the host
    #[default]
    Pending,
    /// Bootstrap (agent install over SSH) is running
    Running,
    /// Bootstrap finished; agent not yet seen by the server
    Done,
    /// Waiting for the agent to appear in the host registry
    Registering,
    /// Agent registered with the server
    Registered,
    /// Bootstrap or registration failed
    Failed,
}

impl BootStatus {
    pub const ALL: [BootStatus; 6] = [
        BootStatus::Pending,
        BootStatus::Running,
        BootStatus::Done,
        BootStatus::Registering,
        BootStatus::Registered,
        BootStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BootStatus::Pending => "PENDING",
            BootStatus::Running => "RUNNING",
            BootStatus::Done => "DONE",
            BootStatus::Registering => "REGISTERING",
            BootStatus::Registered => "REGISTERED",
            BootStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BootStatus::Registered | BootStatus::Failed)
    }

    /// Registration owns the host from here on; bootstrap reports must not touch it.
    pub fn is_registration_owned(&self) -> bool {
        matches!(self, BootStatus::Registering | BootStatus::Registered)
    }

    /// Bootstrap has not produced a final answer for the host yet.
    pub fn is_bootstrapping(&self) -> bool {
        matches!(self, BootStatus::Pending | BootStatus::Running)
    }

    /// Forward-only transition table. Same-status updates are not transitions.
    pub fn can_transition_to(&self, next: BootStatus) -> bool {
        use BootStatus::*;
        match (self, next) {
            (Pending, Running | Done | Failed) => true,
            (Running, Done | Failed) => true,
            (Done, Registering | Failed) => true,
            (Registering, Registered | Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BootStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BootStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(BootStatus::Pending),
            "RUNNING" => Ok(BootStatus::Running),
            "DONE" => Ok(BootStatus::Done),
            "REGISTERING" => Ok(BootStatus::Registering),
            "REGISTERED" => Ok(BootStatus::Registered),
            "FAILED" => Ok(BootStatus::Failed),
            _ => Err(format!("Unknown boot status: {}", s)),
        }
    }
}

/// Outcome of a status update against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status moved forward
    Applied { from: BootStatus, to: BootStatus },
    /// Status already had the requested value
    Unchanged,
    /// Update would move the status backwards or out of a terminal state
    Rejected { from: BootStatus, to: BootStatus },
    /// Bootstrap report for a host that registration already owns
    Ignored,
    /// No record with that name
    UnknownHost,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Status filter used by the host list (mirrors the summary categories).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostCategory {
    #[default]
    All,
    Success,
    Installing,
    Registering,
    Failed,
}

impl HostCategory {
    pub fn boot_status(&self) -> Option<BootStatus> {
        match self {
            HostCategory::All => None,
            HostCategory::Success => Some(BootStatus::Registered),
            HostCategory::Installing => Some(BootStatus::Running),
            HostCategory::Registering => Some(BootStatus::Registering),
            HostCategory::Failed => Some(BootStatus::Failed),
        }
    }

    pub fn matches(&self, status: BootStatus) -> bool {
        self.boot_status().map_or(true, |s| s == status)
    }
}
