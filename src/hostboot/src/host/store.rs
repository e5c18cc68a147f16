//! Ordered in-memory collection of host records.
//!
//! All status changes go through the transition table on [`BootStatus`]; the
//! store never moves a host backwards. The revision counter is bumped on every
//! mutation so dependents can tell when their summaries are stale.

use std::collections::HashMap;

use super::record::HostRecord;
use super::status::{BootStatus, HostCategory, Transition};
use crate::error::HostBootError;

pub const RETRY_LOG_LINE: &str = "Retrying ...";

/// Host counts per summary category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub installing: usize,
    pub done: usize,
    pub registering: usize,
    pub success: usize,
    pub failed: usize,
}

impl StatusSummary {
    pub fn count(&self, category: HostCategory) -> usize {
        match category {
            HostCategory::All => self.total,
            HostCategory::Success => self.success,
            HostCategory::Installing => self.installing,
            HostCategory::Registering => self.registering,
            HostCategory::Failed => self.failed,
        }
    }

    /// Hosts that have not reached a terminal status yet.
    pub fn in_progress(&self) -> usize {
        self.pending + self.installing + self.done + self.registering
    }
}

#[derive(Debug, Default)]
pub struct HostStore {
    hosts: Vec<HostRecord>,
    index: HashMap<String, usize>,
    revision: u64,
}

impl HostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add PENDING records for names not already present. Returns how many were added.
    pub fn add_hosts<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for name in names {
            let name = name.into();
            if self.index.contains_key(&name) {
                tracing::debug!("[HostStore] Skipping duplicate host {}", name);
                continue;
            }
            self.index.insert(name.clone(), self.hosts.len());
            self.hosts.push(HostRecord::new(name));
            added += 1;
        }
        if added > 0 {
            self.touch();
        }
        added
    }

    pub fn find(&self, name: &str) -> Option<&HostRecord> {
        self.index.get(name).map(|&i| &self.hosts[i])
    }

    /// Mutable record access. Counts as a mutation; status must still go through
    /// `set_status`.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut HostRecord> {
        let &i = self.index.get(name)?;
        self.touch();
        Some(&mut self.hosts[i])
    }

    pub fn all(&self) -> &[HostRecord] {
        &self.hosts
    }

    pub fn names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self, name: &str) -> Option<BootStatus> {
        self.find(name).map(|h| h.boot_status)
    }

    pub fn any_with_status(&self, status: BootStatus) -> bool {
        self.hosts.iter().any(|h| h.boot_status == status)
    }

    pub fn names_with_status(&self, status: BootStatus) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|h| h.boot_status == status)
            .map(|h| h.name.clone())
            .collect()
    }

    /// Move a host to `status`, appending `log_append` when the transition applies.
    pub fn set_status(
        &mut self,
        name: &str,
        status: BootStatus,
        log_append: Option<&str>,
    ) -> Transition {
        let Some(&i) = self.index.get(name) else {
            tracing::warn!("[HostStore] Status update for unknown host {}", name);
            return Transition::UnknownHost;
        };
        let host = &mut self.hosts[i];
        let from = host.boot_status;
        if from == status {
            return Transition::Unchanged;
        }
        if !from.can_transition_to(status) {
            let err = HostBootError::InvalidTransition {
                host: name.to_string(),
                from,
                to: status,
            };
            tracing::warn!("[HostStore] Ignoring update: {}", err);
            return Transition::Rejected { from, to: status };
        }
        host.boot_status = status;
        if let Some(line) = log_append {
            host.boot_log.append_line(line);
        }
        self.touch();
        Transition::Applied { from, to: status }
    }

    /// Apply one host entry of a bootstrap status response.
    ///
    /// Hosts already REGISTERING/REGISTERED belong to the registration poller and are
    /// left untouched, whatever the report says.
    pub fn apply_bootstrap_report(
        &mut self,
        name: &str,
        status: BootStatus,
        log: &str,
    ) -> Transition {
        let Some(&i) = self.index.get(name) else {
            tracing::debug!("[HostStore] Bootstrap report for untracked host {}", name);
            return Transition::UnknownHost;
        };
        let host = &mut self.hosts[i];
        let from = host.boot_status;
        if from.is_registration_owned() {
            return Transition::Ignored;
        }
        if from == status {
            if host.boot_log.absorb_bootstrap(log) {
                self.touch();
            }
            return Transition::Unchanged;
        }
        if !from.can_transition_to(status) {
            let err = HostBootError::InvalidTransition {
                host: name.to_string(),
                from,
                to: status,
            };
            tracing::warn!("[HostStore] Ignoring bootstrap report: {}", err);
            return Transition::Rejected { from, to: status };
        }
        host.boot_status = status;
        host.boot_log.absorb_bootstrap(log);
        self.touch();
        Transition::Applied { from, to: status }
    }

    /// Put a FAILED host back into RUNNING for another bootstrap attempt.
    pub fn reset_for_retry(&mut self, name: &str) -> bool {
        let Some(&i) = self.index.get(name) else {
            return false;
        };
        let host = &mut self.hosts[i];
        if host.boot_status != BootStatus::Failed {
            return false;
        }
        host.boot_status = BootStatus::Running;
        host.boot_log.append_line(RETRY_LOG_LINE);
        host.boot_log.restart_bootstrap();
        self.touch();
        true
    }

    pub(crate) fn update<F>(&mut self, name: &str, f: F) -> bool
    where
        F: FnOnce(&mut HostRecord),
    {
        let Some(&i) = self.index.get(name) else {
            return false;
        };
        f(&mut self.hosts[i]);
        self.touch();
        true
    }

    /// Remove hosts by name. Returns the names actually removed.
    pub fn remove(&mut self, names: &[String]) -> Vec<String> {
        let before = self.hosts.len();
        let mut removed = Vec::new();
        self.hosts.retain(|h| {
            if names.contains(&h.name) {
                removed.push(h.name.clone());
                false
            } else {
                true
            }
        });
        if self.hosts.len() != before {
            self.reindex();
            self.touch();
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.hosts.is_empty() {
            self.hosts.clear();
            self.index.clear();
            self.touch();
        }
    }

    pub fn set_checked(&mut self, name: &str, checked: bool) -> bool {
        self.update(name, |h| h.is_checked = checked)
    }

    /// Check or uncheck every host visible under `category`.
    pub fn check_all(&mut self, category: HostCategory, checked: bool) {
        for host in self.hosts.iter_mut() {
            if category.matches(host.boot_status) {
                host.is_checked = checked;
            }
        }
        self.touch();
    }

    pub fn selected(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|h| h.is_checked)
            .map(|h| h.name.clone())
            .collect()
    }

    pub fn visible(&self, category: HostCategory) -> Vec<&HostRecord> {
        self.hosts
            .iter()
            .filter(|h| category.matches(h.boot_status))
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary {
            total: self.hosts.len(),
            ..StatusSummary::default()
        };
        for host in &self.hosts {
            match host.boot_status {
                BootStatus::Pending => summary.pending += 1,
                BootStatus::Running => summary.installing += 1,
                BootStatus::Done => summary.done += 1,
                BootStatus::Registering => summary.registering += 1,
                BootStatus::Registered => summary.success += 1,
                BootStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    fn reindex(&mut self) {
        self.index = self
            .hosts
            .iter()
            .enumerate()
            .map(|(i, h)| (h.name.clone(), i))
            .collect();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
