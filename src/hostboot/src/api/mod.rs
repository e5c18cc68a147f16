//! Provisioning REST API consumed by the pollers.
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{HostBootError, Result};

pub use types::{
    BootstrapLaunchResponse, BootstrapRequest, BootstrapStatusResponse, HostBootReport,
    HostFacts, HostsResponse, OneOrMany, RequestId,
};

/// Fields requested for the hardware enrichment call
pub const HOST_METADATA_FIELDS: &str = "Hosts/total_mem,Hosts/cpu_count,Hosts/disk_info";

/// Server-side operations the wizard step depends on.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Launch bootstrap on `hosts`; returns the request handle to poll.
    async fn launch_bootstrap(&self, hosts: &[String], ssh_key: &str) -> Result<RequestId>;

    /// Current per-host bootstrap status for a launched request.
    async fn bootstrap_status(&self, request_id: &RequestId) -> Result<Vec<HostBootReport>>;

    /// Names of hosts whose agents have registered with the server.
    async fn registered_hosts(&self) -> Result<HashSet<String>>;

    /// Hardware facts (CPU, memory, disks) of registered hosts.
    async fn host_metadata(&self) -> Result<Vec<HostFacts>>;
}

/// reqwest-backed [`ProvisioningApi`].
pub struct HttpProvisioningApi {
    client: Client,
    base_url: String,
}

impl HttpProvisioningApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(HostBootError::Transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode its JSON body. HTTP errors count as transport failures,
    /// undecodable bodies as malformed responses.
    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| HostBootError::MalformedResponse(format!("{}: {}", e, truncate(&body))))
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

#[async_trait]
impl ProvisioningApi for HttpProvisioningApi {
    async fn launch_bootstrap(&self, hosts: &[String], ssh_key: &str) -> Result<RequestId> {
        let body = BootstrapRequest {
            verbose: true,
            ssh_key: ssh_key.to_string(),
            hosts: hosts.to_vec(),
        };
        let response: BootstrapLaunchResponse = self
            .fetch(self.client.post(self.url("/bootstrap")).json(&body))
            .await?;
        tracing::info!(
            "[ProvisioningApi] Bootstrap launched for {} host(s): request {} ({})",
            hosts.len(),
            response.request_id,
            response.status.as_deref().unwrap_or("no status")
        );
        Ok(response.request_id)
    }

    async fn bootstrap_status(&self, request_id: &RequestId) -> Result<Vec<HostBootReport>> {
        let url = self.url(&format!("/bootstrap/{}", request_id));
        let response: BootstrapStatusResponse = self.fetch(self.client.get(url)).await?;
        Ok(response.into_reports())
    }

    async fn registered_hosts(&self) -> Result<HashSet<String>> {
        let response: HostsResponse = self.fetch(self.client.get(self.url("/hosts"))).await?;
        Ok(response
            .into_facts()
            .into_iter()
            .map(|facts| facts.host_name)
            .collect())
    }

    async fn host_metadata(&self) -> Result<Vec<HostFacts>> {
        let request = self
            .client
            .get(self.url("/hosts"))
            .query(&[("fields", HOST_METADATA_FIELDS)]);
        let response: HostsResponse = self.fetch(request).await?;
        Ok(response.into_facts())
    }
}
