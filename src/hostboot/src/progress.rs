//! Step events and the reporter the UI layer listens on.

use serde::{Deserialize, Serialize};

use crate::host::{BootStatus, StatusSummary};

/// Something the UI should react to: refresh a row, refresh the summary, or pop a notice.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepEvent {
    HostStatusChanged {
        host: String,
        from: BootStatus,
        to: BootStatus,
    },
    RegistrationStarted,
    RegistrationTimedOut {
        hosts: Vec<String>,
    },
    /// User-facing notification (modal dialog)
    Notice {
        header: String,
        message: String,
    },
    SummaryChanged {
        total: usize,
        installing: usize,
        registering: usize,
        success: usize,
        failed: usize,
    },
    SubmissionUnlocked,
}

impl StepEvent {
    pub fn notice(header: impl Into<String>, message: impl Into<String>) -> Self {
        StepEvent::Notice {
            header: header.into(),
            message: message.into(),
        }
    }

    pub fn summary(summary: &StatusSummary) -> Self {
        StepEvent::SummaryChanged {
            total: summary.total,
            installing: summary.installing,
            registering: summary.registering,
            success: summary.success,
            failed: summary.failed,
        }
    }
}

/// Receiver of step events.
pub trait ProgressReporter: Send + Sync + 'static {
    fn emit(&self, event: StepEvent);
}

/// Channel-based progress reporter.
pub struct ChannelProgressReporter {
    sender: tokio::sync::mpsc::Sender<StepEvent>,
}

impl ChannelProgressReporter {
    pub fn new(sender: tokio::sync::mpsc::Sender<StepEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelProgressReporter {
    fn emit(&self, event: StepEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::debug!("Dropped step event: {}", e);
        }
    }
}
