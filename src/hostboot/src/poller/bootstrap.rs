//! Bootstrap status polling.
//!
//! Drives hosts from PENDING/RUNNING to DONE or FAILED using the status of a launched
//! bootstrap request. As soon as any host finishes, registration polling is started
//! alongside; both chains then run until their own stop condition.

use tokio::time::Instant;

use super::registration::start_registration;
use super::{PollContext, StatusChange};
use crate::api::{HostBootReport, RequestId};
use crate::host::{BootStatus, Transition};
use crate::progress::StepEvent;
use crate::retry::Attempt;
use crate::session::RunSession;

pub const BOOTSTRAP_TIMEOUT_LOG: &str = "Bootstrap timed out.";
pub const BOOTSTRAP_UNAVAILABLE_LOG: &str =
    "Bootstrap status could not be retrieved from the server.";

/// Result of applying one bootstrap status response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapCycle {
    /// Some tracked host is still PENDING or RUNNING
    pub keep_polling: bool,
    /// A host reached DONE or FAILED in this cycle
    pub start_registration: bool,
    pub changes: Vec<StatusChange>,
}

/// Apply bootstrap reports to the session. `tracked` is the host subset this chain
/// launched bootstrap for.
pub fn apply_bootstrap_reports(
    session: &mut RunSession,
    tracked: &[String],
    reports: &[HostBootReport],
) -> BootstrapCycle {
    let mut cycle = BootstrapCycle::default();
    let hosts = session.hosts_mut();

    for report in reports {
        if !tracked.contains(&report.host_name) {
            continue;
        }
        let log = report.log.as_deref().unwrap_or_default();
        match hosts.apply_bootstrap_report(&report.host_name, report.status, log) {
            Transition::Applied { from, to } => {
                if matches!(to, BootStatus::Done | BootStatus::Failed) {
                    cycle.start_registration = true;
                }
                cycle.changes.push(StatusChange {
                    host: report.host_name.clone(),
                    from,
                    to,
                });
            }
            Transition::Ignored => {
                tracing::debug!(
                    "[BootstrapPoller] {} is owned by registration, ignoring {}",
                    report.host_name,
                    report.status
                );
            }
            _ => {}
        }
    }

    cycle.keep_polling = tracked.iter().any(|name| {
        hosts
            .status(name)
            .map(|status| status.is_bootstrapping())
            .unwrap_or(false)
    });
    cycle
}

/// Fail every tracked host that bootstrap never finished.
pub fn fail_stalled_hosts(
    session: &mut RunSession,
    tracked: &[String],
    log_line: &str,
) -> Vec<StatusChange> {
    let hosts = session.hosts_mut();
    let mut changes = Vec::new();
    for name in tracked {
        let Some(from) = hosts.status(name) else {
            continue;
        };
        if !from.is_bootstrapping() {
            continue;
        }
        if hosts
            .set_status(name, BootStatus::Failed, Some(log_line))
            .is_applied()
        {
            changes.push(StatusChange {
                host: name.clone(),
                from,
                to: BootStatus::Failed,
            });
        }
    }
    changes
}

/// Poll `request_id` until no tracked host is bootstrapping. A host retried while
/// this chain runs is claimed by the newer chain and dropped from this one.
pub async fn run_bootstrap(ctx: PollContext, request_id: RequestId, mut tracked: Vec<String>) {
    let (cancel, claim) = {
        let mut session = ctx.session.lock().await;
        (session.cancel_token(), session.claim_bootstrap(&tracked))
    };
    let started = Instant::now();
    let mut polls: u32 = 0;

    tracing::info!(
        "[BootstrapPoller] Polling bootstrap request {} for {} host(s)",
        request_id,
        tracked.len()
    );

    loop {
        polls += 1;
        let api = &ctx.api;
        let id = &request_id;
        let attempt = ctx
            .retry
            .run("bootstrap status poll", &cancel, || api.bootstrap_status(id))
            .await;

        let reports = match attempt {
            Attempt::Done(reports) => reports,
            Attempt::Cancelled => {
                tracing::debug!("[BootstrapPoller] Session discarded, stopping");
                return;
            }
            Attempt::Exhausted(e) => {
                tracing::error!(
                    "[BootstrapPoller] Abandoning request {} after poll {}: {}",
                    request_id,
                    polls,
                    e
                );
                ctx.reporter.emit(StepEvent::notice(
                    "Bootstrap status unavailable",
                    format!("Could not retrieve bootstrap status: {}", e),
                ));
                give_up(&ctx, &tracked, claim, BOOTSTRAP_UNAVAILABLE_LOG).await;
                return;
            }
        };

        let (cycle, summary) = {
            let mut session = ctx.session.lock().await;
            if session.is_discarded() {
                return;
            }
            tracked.retain(|name| session.owns_bootstrap(name, claim));
            let cycle = apply_bootstrap_reports(&mut session, &tracked, &reports);
            (cycle, session.hosts().summary())
        };
        ctx.report_changes(&cycle.changes, Some(summary));

        if cycle.start_registration {
            start_registration(&ctx).await;
        }

        if !cycle.keep_polling {
            tracing::info!(
                "[BootstrapPoller] Bootstrap finished for request {} after {} poll(s)",
                request_id,
                polls
            );
            return;
        }

        if started.elapsed() > ctx.polling.bootstrap_timeout() {
            tracing::warn!(
                "[BootstrapPoller] Request {} still running after {}s",
                request_id,
                ctx.polling.bootstrap_timeout_secs
            );
            give_up(&ctx, &tracked, claim, BOOTSTRAP_TIMEOUT_LOG).await;
            return;
        }

        if !ctx.wait_interval(&cancel).await {
            return;
        }
    }
}

/// End the chain: fail whatever is still bootstrapping and let registration converge.
async fn give_up(ctx: &PollContext, tracked: &[String], claim: u64, log_line: &str) {
    let (changes, summary) = {
        let mut session = ctx.session.lock().await;
        if session.is_discarded() {
            return;
        }
        let owned: Vec<String> = tracked
            .iter()
            .filter(|name| session.owns_bootstrap(name, claim))
            .cloned()
            .collect();
        let changes = fail_stalled_hosts(&mut session, &owned, log_line);
        (changes, session.hosts().summary())
    };
    ctx.report_changes(&changes, Some(summary));
    start_registration(ctx).await;
}
