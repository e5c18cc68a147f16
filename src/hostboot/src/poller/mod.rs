//! Poll chains driving hosts through bootstrap and registration.
//!
//! Each chain is a tokio task that issues one request at a time and sleeps the poll
//! interval between cycles. Both chains share the session; the lock is only held for
//! the synchronous apply step of a cycle, never across a request or a sleep.

pub mod bootstrap;
pub mod registration;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::ProvisioningApi;
use crate::config::PollingConfig;
use crate::host::{BootStatus, StatusSummary};
use crate::progress::{ProgressReporter, StepEvent};
use crate::retry::RetryPolicy;
use crate::session::SharedSession;

pub use bootstrap::{apply_bootstrap_reports, fail_stalled_hosts, run_bootstrap, BootstrapCycle};
pub use registration::{
    apply_registry, run_registration, start_registration, RegistrationCycle, RegistrationOutcome,
};

/// A status change made during one cycle, reported to the UI after the lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub host: String,
    pub from: BootStatus,
    pub to: BootStatus,
}

/// Everything a poll chain needs, cheap to clone into a spawned task.
#[derive(Clone)]
pub struct PollContext {
    pub api: Arc<dyn ProvisioningApi>,
    pub reporter: Arc<dyn ProgressReporter>,
    pub session: SharedSession,
    pub polling: PollingConfig,
    pub retry: RetryPolicy,
}

impl PollContext {
    /// Wait one poll interval. Returns false if the session was discarded meanwhile.
    pub(crate) async fn wait_interval(&self, cancel: &CancellationToken) -> bool {
        sleep_or_cancel(cancel, self.polling.interval()).await
    }

    pub(crate) fn report_changes(&self, changes: &[StatusChange], summary: Option<StatusSummary>) {
        for change in changes {
            self.reporter.emit(StepEvent::HostStatusChanged {
                host: change.host.clone(),
                from: change.from,
                to: change.to,
            });
        }
        if let Some(summary) = summary {
            if !changes.is_empty() {
                self.reporter.emit(StepEvent::summary(&summary));
            }
        }
    }
}

pub(crate) async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
