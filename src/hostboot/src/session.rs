//! One provisioning attempt: the host records plus the registration window and the
//! submission lock, shared by both poll chains.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::RequestId;
use crate::host::HostStore;

pub type SharedSession = Arc<Mutex<RunSession>>;

#[derive(Debug)]
pub struct RunSession {
    hosts: HostStore,
    boot_request_id: Option<RequestId>,
    /// Bootstrap chain generation each host currently answers to
    bootstrap_claims: HashMap<String, u64>,
    next_claim: u64,
    registration_started_at: Option<Instant>,
    registration_timeout: Duration,
    submit_disabled: bool,
    cancel: CancellationToken,
}

impl RunSession {
    pub fn new(registration_timeout: Duration) -> Self {
        Self {
            hosts: HostStore::new(),
            boot_request_id: None,
            bootstrap_claims: HashMap::new(),
            next_claim: 0,
            registration_started_at: None,
            registration_timeout,
            submit_disabled: true,
            cancel: CancellationToken::new(),
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn hosts(&self) -> &HostStore {
        &self.hosts
    }

    pub fn hosts_mut(&mut self) -> &mut HostStore {
        &mut self.hosts
    }

    pub fn boot_request_id(&self) -> Option<&RequestId> {
        self.boot_request_id.as_ref()
    }

    pub fn set_boot_request_id(&mut self, request_id: RequestId) {
        self.boot_request_id = Some(request_id);
    }

    /// Hand `hosts` to a new bootstrap generation. Chains holding an older
    /// generation stop applying reports for them.
    pub fn claim_bootstrap(&mut self, hosts: &[String]) -> u64 {
        self.next_claim += 1;
        for name in hosts {
            self.bootstrap_claims.insert(name.clone(), self.next_claim);
        }
        self.next_claim
    }

    /// Unclaimed hosts belong to whichever chain tracks them.
    pub fn owns_bootstrap(&self, host: &str, claim: u64) -> bool {
        self.bootstrap_claims
            .get(host)
            .map_or(true, |current| *current == claim)
    }

    /// Token cancelled when the session is discarded.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_discarded(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn registration_started_at(&self) -> Option<Instant> {
        self.registration_started_at
    }

    pub fn registration_timeout(&self) -> Duration {
        self.registration_timeout
    }

    /// Claim the registration window. Only the first caller since the last reset wins;
    /// this is what keeps two registration chains from running at once.
    pub fn begin_registration(&mut self, now: Instant) -> bool {
        if self.is_discarded() || self.registration_started_at.is_some() {
            return false;
        }
        self.registration_started_at = Some(now);
        true
    }

    /// Extend the window from the host that just finished bootstrapping.
    pub fn rearm_registration(&mut self, now: Instant) {
        self.registration_started_at = Some(now);
    }

    pub fn reset_registration(&mut self) {
        self.registration_started_at = None;
    }

    pub fn registration_expired(&self, now: Instant) -> bool {
        self.registration_started_at
            .map(|started| now.saturating_duration_since(started) > self.registration_timeout)
            .unwrap_or(false)
    }

    pub fn is_submit_disabled(&self) -> bool {
        self.submit_disabled
    }

    pub fn lock_submission(&mut self) {
        self.submit_disabled = true;
    }

    pub fn unlock_submission(&mut self) {
        if !self.is_discarded() {
            self.submit_disabled = false;
        }
    }

    /// Leave-step teardown: stop every chain, drop the hosts, lock submission.
    pub fn discard(&mut self) {
        self.cancel.cancel();
        self.hosts.clear();
        self.boot_request_id = None;
        self.bootstrap_claims.clear();
        self.registration_started_at = None;
        self.submit_disabled = true;
    }
}
