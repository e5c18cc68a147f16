//! Registration polling.
//!
//! Moves bootstrapped hosts through REGISTERING to REGISTERED by watching the server's
//! host registry. The registration window is re-armed each time a host finishes
//! bootstrap, so the timeout counts from the last host to get there.

use std::collections::HashSet;

use tokio::time::Instant;

use super::{PollContext, StatusChange};
use crate::enrichment::run_enrichment;
use crate::error::HostBootError;
use crate::host::BootStatus;
use crate::progress::StepEvent;
use crate::retry::Attempt;
use crate::session::RunSession;

pub const REGISTERING_LOG: &str = "Registering with the server...";
pub const REGISTERED_LOG: &str = "Registration with the server succeeded.";
pub const REGISTRATION_FAILED_LOG: &str = "Registration with the server failed.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Some host is still bootstrapping or registering
    Continue,
    /// Every host is REGISTERED or FAILED
    Converged,
    /// The window expired; these REGISTERING hosts were failed
    TimedOut(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationCycle {
    pub outcome: RegistrationOutcome,
    pub changes: Vec<StatusChange>,
}

impl RegistrationCycle {
    pub fn is_finished(&self) -> bool {
        self.outcome != RegistrationOutcome::Continue
    }
}

/// Apply one registry snapshot to every host in the session.
pub fn apply_registry(
    session: &mut RunSession,
    registered: &HashSet<String>,
    now: Instant,
) -> RegistrationCycle {
    let mut changes = Vec::new();
    let mut pending = false;
    let mut rearm = false;

    let hosts = session.hosts_mut();
    for name in hosts.names() {
        let Some(status) = hosts.status(&name) else {
            continue;
        };
        match status {
            BootStatus::Done => {
                if hosts
                    .set_status(&name, BootStatus::Registering, Some(REGISTERING_LOG))
                    .is_applied()
                {
                    changes.push(StatusChange {
                        host: name.clone(),
                        from: status,
                        to: BootStatus::Registering,
                    });
                }
                rearm = true;
                pending = true;
            }
            BootStatus::Registering => {
                if registered.contains(&name) {
                    tracing::info!("[RegistrationPoller] {} has been registered", name);
                    if hosts
                        .set_status(&name, BootStatus::Registered, Some(REGISTERED_LOG))
                        .is_applied()
                    {
                        changes.push(StatusChange {
                            host: name.clone(),
                            from: status,
                            to: BootStatus::Registered,
                        });
                    }
                } else {
                    tracing::debug!("[RegistrationPoller] {} is registering...", name);
                    pending = true;
                }
            }
            BootStatus::Pending | BootStatus::Running => pending = true,
            BootStatus::Registered | BootStatus::Failed => {}
        }
    }

    if rearm {
        session.rearm_registration(now);
    }

    if !pending {
        return RegistrationCycle {
            outcome: RegistrationOutcome::Converged,
            changes,
        };
    }

    if session.registration_expired(now) {
        let timed_out = fail_registering_hosts(session, &mut changes);
        return RegistrationCycle {
            outcome: RegistrationOutcome::TimedOut(timed_out),
            changes,
        };
    }

    RegistrationCycle {
        outcome: RegistrationOutcome::Continue,
        changes,
    }
}

fn fail_registering_hosts(
    session: &mut RunSession,
    changes: &mut Vec<StatusChange>,
) -> Vec<String> {
    let hosts = session.hosts_mut();
    let registering = hosts.names_with_status(BootStatus::Registering);
    for name in &registering {
        tracing::warn!(
            "[RegistrationPoller] {}",
            HostBootError::RegistrationTimeout(name.clone())
        );
        if hosts
            .set_status(name, BootStatus::Failed, Some(REGISTRATION_FAILED_LOG))
            .is_applied()
        {
            changes.push(StatusChange {
                host: name.clone(),
                from: BootStatus::Registering,
                to: BootStatus::Failed,
            });
        }
    }
    registering
}

/// Open the registration window and spawn the chain, unless one is already open.
pub async fn start_registration(ctx: &PollContext) -> bool {
    {
        let mut session = ctx.session.lock().await;
        if !session.begin_registration(Instant::now()) {
            return false;
        }
        session.lock_submission();
    }
    tracing::info!("[RegistrationPoller] Registration started");
    ctx.reporter.emit(StepEvent::RegistrationStarted);
    tokio::spawn(run_registration(ctx.clone()));
    true
}

/// Poll the host registry until every host converges or the window expires, then
/// run enrichment.
pub async fn run_registration(ctx: PollContext) {
    let cancel = ctx.session.lock().await.cancel_token();

    loop {
        let api = &ctx.api;
        let attempt = ctx
            .retry
            .run("host registry poll", &cancel, || api.registered_hosts())
            .await;

        let registered = match attempt {
            Attempt::Done(registered) => registered,
            Attempt::Cancelled => return,
            Attempt::Exhausted(e) => {
                tracing::error!("[RegistrationPoller] Abandoning registration polling: {}", e);
                ctx.reporter.emit(StepEvent::notice(
                    "Registration status unavailable",
                    format!("Could not retrieve registered hosts: {}", e),
                ));
                let (changes, summary) = {
                    let mut session = ctx.session.lock().await;
                    if session.is_discarded() {
                        return;
                    }
                    let mut changes = Vec::new();
                    fail_registering_hosts(&mut session, &mut changes);
                    session.reset_registration();
                    (changes, session.hosts().summary())
                };
                ctx.report_changes(&changes, Some(summary));
                run_enrichment(&ctx).await;
                return;
            }
        };

        let (cycle, summary) = {
            let mut session = ctx.session.lock().await;
            if session.is_discarded() {
                return;
            }
            let cycle = apply_registry(&mut session, &registered, Instant::now());
            if cycle.is_finished() {
                session.reset_registration();
            }
            (cycle, session.hosts().summary())
        };
        ctx.report_changes(&cycle.changes, Some(summary));

        match cycle.outcome {
            RegistrationOutcome::Continue => {}
            RegistrationOutcome::Converged => {
                tracing::info!("[RegistrationPoller] All hosts settled");
                run_enrichment(&ctx).await;
                return;
            }
            RegistrationOutcome::TimedOut(hosts) => {
                tracing::warn!(
                    "[RegistrationPoller] Registration timed out for {} host(s)",
                    hosts.len()
                );
                ctx.reporter.emit(StepEvent::RegistrationTimedOut { hosts });
                run_enrichment(&ctx).await;
                return;
            }
        }

        if !ctx.wait_interval(&cancel).await {
            return;
        }
    }
}
