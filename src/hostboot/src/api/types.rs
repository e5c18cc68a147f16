//! Wire types for the provisioning REST API.

use serde::{Deserialize, Deserializer, Serialize};

use crate::host::{BootStatus, DiskInfo};

/// Body of `POST /bootstrap`.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapRequest {
    pub verbose: bool,
    #[serde(rename = "sshKey")]
    pub ssh_key: String,
    pub hosts: Vec<String>,
}

/// Opaque bootstrap request handle. The server sends it as a number; strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(RequestId(n.to_string())),
            Raw::Text(s) if !s.trim().is_empty() => Ok(RequestId(s)),
            Raw::Text(_) => Err(serde::de::Error::custom("empty bootstrap request id")),
        }
    }
}

/// Response of `POST /bootstrap`.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapLaunchResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
}

/// A list field the server collapses to a bare object when it holds one element.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

/// One host entry of a bootstrap status response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostBootReport {
    #[serde(rename = "hostName")]
    pub host_name: String,
    pub status: BootStatus,
    #[serde(default)]
    pub log: Option<String>,
}

impl HostBootReport {
    pub fn new(host_name: impl Into<String>, status: BootStatus, log: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            status,
            log: Some(log.into()),
        }
    }

    /// Bootstrap reached a final answer for this host.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, BootStatus::Done | BootStatus::Failed)
    }
}

/// Response of `GET /bootstrap/{requestId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(rename = "hostsStatus", default)]
    pub hosts_status: Option<OneOrMany<HostBootReport>>,
}

impl BootstrapStatusResponse {
    pub fn into_reports(self) -> Vec<HostBootReport> {
        self.hosts_status.map(OneOrMany::into_vec).unwrap_or_default()
    }
}

/// `Hosts` object of a host registry item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostFacts {
    pub host_name: String,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    /// Total memory in kB
    #[serde(default)]
    pub total_mem: Option<u64>,
    #[serde(default)]
    pub disk_info: Option<Vec<DiskInfo>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostItem {
    #[serde(rename = "Hosts")]
    pub hosts: HostFacts,
}

/// Response of `GET /hosts` (with or without `fields`).
#[derive(Debug, Clone, Deserialize)]
pub struct HostsResponse {
    #[serde(default)]
    pub items: Vec<HostItem>,
}

impl HostsResponse {
    pub fn into_facts(self) -> Vec<HostFacts> {
        self.items.into_iter().map(|item| item.hosts).collect()
    }
}
