//! Shared test helpers: a scripted in-process provisioning API and event collection.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostboot::api::{HostBootReport, HostFacts, ProvisioningApi, RequestId};
use hostboot::config::{HostBootConfig, PollingConfig, RetryConfig};
use hostboot::error::{HostBootError, Result};
use hostboot::poller::PollContext;
use hostboot::progress::{ChannelProgressReporter, ProgressReporter, StepEvent};
use hostboot::retry::RetryPolicy;
use hostboot::session::{RunSession, SharedSession};
use tokio::sync::mpsc;

/// One scripted answer. `Err` becomes a malformed-response error.
pub type Scripted<T> = std::result::Result<T, String>;

/// Queue of scripted answers; the last answer repeats once the queue runs dry.
struct Script<T: Clone> {
    queue: VecDeque<Scripted<T>>,
    last: Scripted<T>,
}

impl<T: Clone> Script<T> {
    fn new(default: T) -> Self {
        Self {
            queue: VecDeque::new(),
            last: Ok(default),
        }
    }

    fn next(&mut self) -> Result<T> {
        if let Some(answer) = self.queue.pop_front() {
            self.last = answer;
        }
        self.last.clone().map_err(HostBootError::MalformedResponse)
    }
}

/// [`ProvisioningApi`] answering from per-endpoint scripts and recording every call.
pub struct ScriptedApi {
    launch: Mutex<Script<RequestId>>,
    bootstrap: Mutex<Script<Vec<HostBootReport>>>,
    registry: Mutex<Script<HashSet<String>>>,
    metadata: Mutex<Script<Vec<HostFacts>>>,
    pub launches: Mutex<Vec<Vec<String>>>,
    pub bootstrap_polls: Mutex<Vec<RequestId>>,
    pub registry_polls: Mutex<usize>,
    pub metadata_calls: Mutex<usize>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self {
            launch: Mutex::new(Script::new(RequestId("1".into()))),
            bootstrap: Mutex::new(Script::new(Vec::new())),
            registry: Mutex::new(Script::new(HashSet::new())),
            metadata: Mutex::new(Script::new(Vec::new())),
            launches: Mutex::new(Vec::new()),
            bootstrap_polls: Mutex::new(Vec::new()),
            registry_polls: Mutex::new(0),
            metadata_calls: Mutex::new(0),
        }
    }
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_launch(&self, answer: Scripted<&str>) {
        self.launch
            .lock()
            .unwrap()
            .queue
            .push_back(answer.map(|id| RequestId(id.to_string())));
    }

    pub fn push_bootstrap(&self, answer: Scripted<Vec<HostBootReport>>) {
        self.bootstrap.lock().unwrap().queue.push_back(answer);
    }

    pub fn push_registry(&self, answer: Scripted<&[&str]>) {
        self.registry
            .lock()
            .unwrap()
            .queue
            .push_back(answer.map(|names| names.iter().map(|n| n.to_string()).collect()));
    }

    pub fn push_metadata(&self, answer: Scripted<Vec<HostFacts>>) {
        self.metadata.lock().unwrap().queue.push_back(answer);
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn bootstrap_poll_count(&self) -> usize {
        self.bootstrap_polls.lock().unwrap().len()
    }

    pub fn registry_poll_count(&self) -> usize {
        *self.registry_polls.lock().unwrap()
    }

    pub fn metadata_call_count(&self) -> usize {
        *self.metadata_calls.lock().unwrap()
    }
}

#[async_trait]
impl ProvisioningApi for ScriptedApi {
    async fn launch_bootstrap(&self, hosts: &[String], _ssh_key: &str) -> Result<RequestId> {
        self.launches.lock().unwrap().push(hosts.to_vec());
        self.launch.lock().unwrap().next()
    }

    async fn bootstrap_status(&self, request_id: &RequestId) -> Result<Vec<HostBootReport>> {
        self.bootstrap_polls.lock().unwrap().push(request_id.clone());
        self.bootstrap.lock().unwrap().next()
    }

    async fn registered_hosts(&self) -> Result<HashSet<String>> {
        *self.registry_polls.lock().unwrap() += 1;
        self.registry.lock().unwrap().next()
    }

    async fn host_metadata(&self) -> Result<Vec<HostFacts>> {
        *self.metadata_calls.lock().unwrap() += 1;
        self.metadata.lock().unwrap().next()
    }
}

pub fn report(host: &str, status: hostboot::BootStatus, log: &str) -> HostBootReport {
    HostBootReport::new(host, status, log)
}

pub fn facts(host: &str, cpu: u32, mem: u64) -> HostFacts {
    HostFacts {
        host_name: host.to_string(),
        cpu_count: Some(cpu),
        total_mem: Some(mem),
        disk_info: None,
    }
}

/// Config with the production intervals and a short, fast retry policy.
pub fn test_config() -> HostBootConfig {
    HostBootConfig {
        polling: PollingConfig::default(),
        retry: RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 400,
        },
        ..HostBootConfig::default()
    }
}

pub fn channel_reporter() -> (Arc<dyn ProgressReporter>, mpsc::Receiver<StepEvent>) {
    let (tx, rx) = mpsc::channel(1024);
    (Arc::new(ChannelProgressReporter::new(tx)), rx)
}

/// Poll context over a fresh session holding `hosts` (all PENDING).
pub async fn poll_context(
    api: Arc<ScriptedApi>,
    hosts: &[&str],
) -> (PollContext, mpsc::Receiver<StepEvent>) {
    let config = test_config();
    let session: SharedSession = RunSession::new(config.polling.registration_timeout()).shared();
    session
        .lock()
        .await
        .hosts_mut()
        .add_hosts(hosts.iter().copied());
    let (reporter, rx) = channel_reporter();
    let ctx = PollContext {
        api,
        reporter,
        session,
        polling: config.polling.clone(),
        retry: RetryPolicy::from(&config.retry),
    };
    (ctx, rx)
}

/// Collect events until submission unlocks. Panics if that takes more than an hour
/// of (virtual) time.
pub async fn wait_for_unlock(rx: &mut mpsc::Receiver<StepEvent>) -> Vec<StepEvent> {
    let mut events = Vec::new();
    let collect = async {
        while let Some(event) = rx.recv().await {
            let done = event == StepEvent::SubmissionUnlocked;
            events.push(event);
            if done {
                return;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), collect)
        .await
        .expect("submission never unlocked");
    events
}

/// Drain whatever events are queued right now.
pub fn drain(rx: &mut mpsc::Receiver<StepEvent>) -> Vec<StepEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn status_changes(
    events: &[StepEvent],
    host: &str,
) -> Vec<(hostboot::BootStatus, hostboot::BootStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            StepEvent::HostStatusChanged { host: h, from, to } if h == host => Some((*from, *to)),
            _ => None,
        })
        .collect()
}
