//! The confirm-hosts wizard step.
//!
//! Owns the current [`RunSession`], starts the poll chains on entry and on retry, and
//! answers the UI's queries. Leaving the step discards the session, which stops every
//! chain still running against it.

use std::sync::Arc;

use crate::api::ProvisioningApi;
use crate::config::HostBootConfig;
use crate::error::{HostBootError, Result};
use crate::host::{BootStatus, HostCategory, HostRecord, StatusSummary};
use crate::poller::bootstrap::BOOTSTRAP_UNAVAILABLE_LOG;
use crate::poller::{
    fail_stalled_hosts, run_bootstrap, start_registration, PollContext, StatusChange,
};
use crate::progress::{ProgressReporter, StepEvent};
use crate::retry::{Attempt, RetryPolicy};
use crate::session::{RunSession, SharedSession};
use crate::storage::{InstallType, PersistedHost, WizardStorage};

pub struct ConfirmHostsStep {
    api: Arc<dyn ProvisioningApi>,
    storage: Arc<dyn WizardStorage>,
    reporter: Arc<dyn ProgressReporter>,
    config: HostBootConfig,
    session: SharedSession,
    manual_install: bool,
    ssh_key: String,
}

impl ConfirmHostsStep {
    pub fn new(
        api: Arc<dyn ProvisioningApi>,
        storage: Arc<dyn WizardStorage>,
        reporter: Arc<dyn ProgressReporter>,
        config: HostBootConfig,
    ) -> Self {
        let session = RunSession::new(config.polling.registration_timeout()).shared();
        Self {
            api,
            storage,
            reporter,
            config,
            session,
            manual_install: false,
            ssh_key: String::new(),
        }
    }

    fn context(&self) -> PollContext {
        PollContext {
            api: self.api.clone(),
            reporter: self.reporter.clone(),
            session: self.session.clone(),
            polling: self.config.polling.clone(),
            retry: RetryPolicy::from(&self.config.retry),
        }
    }

    fn install_type(&self) -> InstallType {
        if self.manual_install {
            InstallType::ManualDriven
        } else {
            InstallType::AmbariDriven
        }
    }

    /// Start a fresh session from the persisted wizard state.
    pub async fn enter_step(&mut self) -> Result<()> {
        self.session.lock().await.discard();

        let context = self.storage.load().await?;
        self.manual_install = context.manual_install;
        self.ssh_key = context.ssh_key.clone();
        self.session = RunSession::new(self.config.polling.registration_timeout()).shared();

        let names = context.host_names();
        {
            let mut session = self.session.lock().await;
            session.hosts_mut().add_hosts(names.iter().cloned());
            if let Some(request_id) = context.resumable_request() {
                session.set_boot_request_id(request_id.clone());
            }
            if !session.hosts().is_empty() {
                session.unlock_submission();
            }
        }

        if names.is_empty() {
            tracing::warn!("[ConfirmHostsStep] No hosts to confirm");
            return Ok(());
        }

        tracing::info!(
            "[ConfirmHostsStep] Confirming {} host(s) ({:?})",
            names.len(),
            self.install_type()
        );

        let ctx = self.context();
        if self.manual_install {
            self.mark_done(&ctx, &names).await;
            start_registration(&ctx).await;
            return Ok(());
        }

        ctx.session.lock().await.lock_submission();
        match context.resumable_request() {
            Some(request_id) => {
                tracing::info!(
                    "[ConfirmHostsStep] Resuming bootstrap request {}",
                    request_id
                );
                tokio::spawn(run_bootstrap(ctx, request_id.clone(), names));
            }
            None => {
                if let Some(stale) = &context.boot_request_id {
                    tracing::info!(
                        "[ConfirmHostsStep] Request {} does not cover every host, relaunching",
                        stale
                    );
                }
                self.launch_and_poll(ctx, names).await;
            }
        }
        Ok(())
    }

    /// Launch bootstrap for `hosts` and spawn its poll chain. If the launch itself
    /// cannot be made, the hosts are failed so the user can retry them.
    async fn launch_and_poll(&self, ctx: PollContext, hosts: Vec<String>) {
        let cancel = ctx.session.lock().await.cancel_token();
        let api = &ctx.api;
        let names: &[String] = &hosts;
        let ssh_key = self.ssh_key.as_str();
        let attempt = ctx
            .retry
            .run("bootstrap launch", &cancel, || api.launch_bootstrap(names, ssh_key))
            .await;

        match attempt {
            Attempt::Done(request_id) => {
                {
                    let mut session = ctx.session.lock().await;
                    if session.is_discarded() {
                        return;
                    }
                    session.set_boot_request_id(request_id.clone());
                }
                tokio::spawn(run_bootstrap(ctx, request_id.clone(), hosts.clone()));
                // Polling goes on without it
                if let Err(e) = self.storage.save_boot_request(&request_id, &hosts).await {
                    tracing::warn!(
                        "[ConfirmHostsStep] Failed to persist bootstrap request {}: {}",
                        request_id,
                        e
                    );
                }
            }
            Attempt::Cancelled => {}
            Attempt::Exhausted(e) => {
                tracing::error!("[ConfirmHostsStep] Bootstrap launch failed: {}", e);
                ctx.reporter.emit(StepEvent::notice(
                    "Bootstrap failed to start",
                    format!("Could not launch bootstrap: {}", e),
                ));
                let (changes, summary) = {
                    let mut session = ctx.session.lock().await;
                    if session.is_discarded() {
                        return;
                    }
                    let changes =
                        fail_stalled_hosts(&mut session, &hosts, BOOTSTRAP_UNAVAILABLE_LOG);
                    (changes, session.hosts().summary())
                };
                ctx.report_changes(&changes, Some(summary));
                start_registration(&ctx).await;
            }
        }
    }

    /// Manual installs skip bootstrap: hosts go straight to DONE.
    async fn mark_done(&self, ctx: &PollContext, names: &[String]) {
        let (changes, summary) = {
            let mut session = ctx.session.lock().await;
            let hosts = session.hosts_mut();
            let mut changes = Vec::new();
            for name in names {
                let Some(from) = hosts.status(name) else {
                    continue;
                };
                if hosts.set_status(name, BootStatus::Done, None).is_applied() {
                    changes.push(StatusChange {
                        host: name.clone(),
                        from,
                        to: BootStatus::Done,
                    });
                }
            }
            (changes, session.hosts().summary())
        };
        ctx.report_changes(&changes, Some(summary));
    }

    /// Retry the FAILED hosts among `names`. Returns the hosts actually retried.
    pub async fn retry(&self, names: &[String]) -> Result<Vec<String>> {
        let ctx = self.context();
        let (retried, summary) = {
            let mut session = self.session.lock().await;
            if session.is_submit_disabled() {
                return Err(HostBootError::RetryUnavailable(
                    "host checks are still in progress".into(),
                ));
            }
            let failed: Vec<String> = names
                .iter()
                .filter(|name| session.hosts().status(name) == Some(BootStatus::Failed))
                .cloned()
                .collect();
            if failed.is_empty() {
                return Err(HostBootError::RetryUnavailable(
                    "no failed host selected".into(),
                ));
            }
            for name in &failed {
                session.hosts_mut().reset_for_retry(name);
            }
            // Older bootstrap chains stop reporting for these hosts
            session.claim_bootstrap(&failed);
            session.lock_submission();
            session.reset_registration();
            (failed, session.hosts().summary())
        };

        let changes: Vec<StatusChange> = retried
            .iter()
            .map(|name| StatusChange {
                host: name.clone(),
                from: BootStatus::Failed,
                to: BootStatus::Running,
            })
            .collect();
        ctx.report_changes(&changes, Some(summary));
        tracing::info!("[ConfirmHostsStep] Retrying {} host(s)", retried.len());

        if self.manual_install {
            self.mark_done(&ctx, &retried).await;
            start_registration(&ctx).await;
        } else {
            self.launch_and_poll(ctx, retried.clone()).await;
        }
        Ok(retried)
    }

    /// Retry every FAILED host.
    pub async fn retry_failed(&self) -> Result<Vec<String>> {
        let failed = self
            .session
            .lock()
            .await
            .hosts()
            .names_with_status(BootStatus::Failed);
        self.retry(&failed).await
    }

    /// Retry the checked hosts.
    pub async fn retry_selected(&self) -> Result<Vec<String>> {
        let selected = self.session.lock().await.hosts().selected();
        self.retry(&selected).await
    }

    /// Drop hosts from the session and from wizard storage.
    pub async fn remove(&self, names: &[String]) -> Result<Vec<String>> {
        let (removed, summary) = {
            let mut session = self.session.lock().await;
            let removed = session.hosts_mut().remove(names);
            if session.hosts().is_empty() {
                session.lock_submission();
            }
            (removed, session.hosts().summary())
        };
        if removed.is_empty() {
            return Ok(removed);
        }
        self.storage.remove_hosts(&removed).await?;
        tracing::info!("[ConfirmHostsStep] Removed {} host(s)", removed.len());
        self.reporter.emit(StepEvent::summary(&summary));
        Ok(removed)
    }

    /// Persist the final per-host status list. Locked until enrichment has run.
    pub async fn submit(&self) -> Result<Vec<PersistedHost>> {
        let confirmed: Vec<PersistedHost> = {
            let session = self.session.lock().await;
            if session.is_submit_disabled() {
                return Err(HostBootError::SubmitLocked);
            }
            let install_type = self.install_type();
            session
                .hosts()
                .all()
                .iter()
                .map(|record| PersistedHost::from_record(record, install_type))
                .collect()
        };
        self.storage.save_confirmed_hosts(&confirmed).await?;
        tracing::info!(
            "[ConfirmHostsStep] Submitted {} confirmed host(s)",
            confirmed.len()
        );
        Ok(confirmed)
    }

    /// Discard the session: stop both chains, drop the hosts, lock submission.
    pub async fn leave_step(&self) {
        self.session.lock().await.discard();
        tracing::info!("[ConfirmHostsStep] Step left, session discarded");
    }

    pub async fn hosts(&self) -> Vec<HostRecord> {
        self.session.lock().await.hosts().all().to_vec()
    }

    pub async fn host(&self, name: &str) -> Option<HostRecord> {
        self.session.lock().await.hosts().find(name).cloned()
    }

    pub async fn summary(&self) -> StatusSummary {
        self.session.lock().await.hosts().summary()
    }

    pub async fn visible(&self, category: HostCategory) -> Vec<HostRecord> {
        self.session
            .lock()
            .await
            .hosts()
            .visible(category)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn set_checked(&self, name: &str, checked: bool) -> bool {
        self.session.lock().await.hosts_mut().set_checked(name, checked)
    }

    pub async fn check_all(&self, category: HostCategory, checked: bool) {
        self.session.lock().await.hosts_mut().check_all(category, checked);
    }

    pub async fn is_submit_disabled(&self) -> bool {
        self.session.lock().await.is_submit_disabled()
    }

    /// Retry needs unlocked submission and at least one FAILED host.
    pub async fn is_retry_disabled(&self) -> bool {
        let session = self.session.lock().await;
        session.is_submit_disabled() || !session.hosts().any_with_status(BootStatus::Failed)
    }

    pub fn is_manual_install(&self) -> bool {
        self.manual_install
    }
}
