//! Wizard-session persistence: the host list and install mode entered on the host-name
//! screen, and the confirmed host list written back on submit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::api::RequestId;
use crate::error::{HostBootError, Result};
use crate::host::{parse_host_names, BootStatus, HostRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum InstallType {
    /// Server installs agents over SSH
    #[default]
    AmbariDriven,
    /// Operator installs agents; only registration is tracked
    ManualDriven,
}

/// Host as persisted between wizard steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedHost {
    pub name: String,
    #[serde(rename = "bootStatus")]
    pub boot_status: BootStatus,
    #[serde(rename = "installType", default)]
    pub install_type: InstallType,
}

/// Input collected on the host-name screen.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub host_names: String,
    pub manual_install: bool,
    pub ssh_key: String,
}

impl InstallRequest {
    /// Parse and check the request: valid host names, and an SSH key unless manual.
    pub fn validate(&self) -> Result<Vec<String>> {
        let names = parse_host_names(&self.host_names)?;
        if !self.manual_install && self.ssh_key.trim().is_empty() {
            return Err(HostBootError::MissingSshKey);
        }
        Ok(names)
    }
}

/// Everything the confirm-hosts step loads on entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardContext {
    #[serde(default)]
    pub hosts: Vec<PersistedHost>,
    #[serde(default)]
    pub manual_install: bool,
    #[serde(default)]
    pub ssh_key: String,
    #[serde(default)]
    pub boot_request_id: Option<RequestId>,
    /// Hosts the stored bootstrap request was launched for
    #[serde(default)]
    pub boot_hosts: Vec<String>,
    /// Final host list written on submit
    #[serde(default)]
    pub confirmed_hosts: Vec<PersistedHost>,
}

impl WizardContext {
    pub fn from_request(request: &InstallRequest) -> Result<Self> {
        let names = request.validate()?;
        let install_type = if request.manual_install {
            InstallType::ManualDriven
        } else {
            InstallType::AmbariDriven
        };
        Ok(Self {
            hosts: names
                .into_iter()
                .map(|name| PersistedHost {
                    name,
                    boot_status: BootStatus::Pending,
                    install_type,
                })
                .collect(),
            manual_install: request.manual_install,
            ssh_key: request.ssh_key.clone(),
            boot_request_id: None,
            boot_hosts: Vec::new(),
            confirmed_hosts: Vec::new(),
        })
    }

    pub fn host_names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    /// The stored bootstrap request, if it was launched for every current host.
    /// A request recorded without its host list is taken to cover them all.
    pub fn resumable_request(&self) -> Option<&RequestId> {
        let request_id = self.boot_request_id.as_ref()?;
        let covered = self.boot_hosts.is_empty()
            || self.hosts.iter().all(|h| self.boot_hosts.contains(&h.name));
        covered.then_some(request_id)
    }
}

impl PersistedHost {
    pub fn from_record(record: &HostRecord, install_type: InstallType) -> Self {
        Self {
            name: record.name.clone(),
            boot_status: record.boot_status,
            install_type,
        }
    }
}

/// Persistence contract for wizard state.
#[async_trait]
pub trait WizardStorage: Send + Sync {
    async fn load(&self) -> Result<WizardContext>;

    /// Record the bootstrap request launched for `hosts`.
    async fn save_boot_request(&self, request_id: &RequestId, hosts: &[String]) -> Result<()>;

    async fn remove_hosts(&self, names: &[String]) -> Result<()>;

    async fn save_confirmed_hosts(&self, hosts: &[PersistedHost]) -> Result<()>;
}

/// In-memory wizard storage.
#[derive(Debug, Default)]
pub struct InMemoryWizardStorage {
    state: RwLock<WizardContext>,
}

impl InMemoryWizardStorage {
    pub fn new(initial: WizardContext) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    pub async fn snapshot(&self) -> WizardContext {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl WizardStorage for InMemoryWizardStorage {
    async fn load(&self) -> Result<WizardContext> {
        Ok(self.state.read().await.clone())
    }

    async fn save_boot_request(&self, request_id: &RequestId, hosts: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        state.boot_request_id = Some(request_id.clone());
        state.boot_hosts = hosts.to_vec();
        Ok(())
    }

    async fn remove_hosts(&self, names: &[String]) -> Result<()> {
        self.state
            .write()
            .await
            .hosts
            .retain(|h| !names.contains(&h.name));
        Ok(())
    }

    async fn save_confirmed_hosts(&self, hosts: &[PersistedHost]) -> Result<()> {
        self.state.write().await.confirmed_hosts = hosts.to_vec();
        Ok(())
    }
}

/// Wizard storage backed by a JSON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct JsonFileWizardStorage {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileWizardStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a fresh context, replacing whatever the file held.
    pub async fn initialize(&self, context: &WizardContext) -> Result<()> {
        let _guard = self.lock.write().await;
        self.write(context).await
    }

    async fn read(&self) -> Result<WizardContext> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HostBootError::Storage(format!(
                    "Wizard state not found: {:?}",
                    self.path
                )))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            HostBootError::Storage(format!("Failed to parse wizard state {:?}: {}", self.path, e))
        })
    }

    async fn write(&self, context: &WizardContext) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(context)?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    async fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut WizardContext) + Send,
    {
        let _guard = self.lock.write().await;
        let mut context = self.read().await?;
        f(&mut context);
        self.write(&context).await
    }
}

#[async_trait]
impl WizardStorage for JsonFileWizardStorage {
    async fn load(&self) -> Result<WizardContext> {
        let _guard = self.lock.read().await;
        self.read().await
    }

    async fn save_boot_request(&self, request_id: &RequestId, hosts: &[String]) -> Result<()> {
        let request_id = request_id.clone();
        let hosts = hosts.to_vec();
        self.modify(move |c| {
            c.boot_request_id = Some(request_id);
            c.boot_hosts = hosts;
        })
        .await
    }

    async fn remove_hosts(&self, names: &[String]) -> Result<()> {
        self.modify(|c| c.hosts.retain(|h| !names.contains(&h.name)))
            .await
    }

    async fn save_confirmed_hosts(&self, hosts: &[PersistedHost]) -> Result<()> {
        let hosts = hosts.to_vec();
        self.modify(move |c| c.confirmed_hosts = hosts).await
    }
}
