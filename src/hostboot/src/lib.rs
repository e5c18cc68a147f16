pub mod api;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod host;
pub mod poller;
pub mod progress;
pub mod retry;
pub mod session;
pub mod step;
pub mod storage;

pub use api::{HttpProvisioningApi, ProvisioningApi, RequestId};
pub use config::HostBootConfig;
pub use error::{HostBootError, Result};
pub use host::{BootStatus, HostCategory, HostRecord, HostStore, StatusSummary, Transition};
pub use progress::{ChannelProgressReporter, ProgressReporter, StepEvent};
pub use session::{RunSession, SharedSession};
pub use step::ConfirmHostsStep;
pub use storage::{
    InMemoryWizardStorage, InstallRequest, JsonFileWizardStorage, WizardContext, WizardStorage,
};

/// Build a confirm-hosts step talking to the HTTP API described by `config`.
pub fn http_step(
    config: HostBootConfig,
    storage: std::sync::Arc<dyn WizardStorage>,
    reporter: std::sync::Arc<dyn ProgressReporter>,
) -> Result<ConfirmHostsStep> {
    let api = HttpProvisioningApi::new(&config.api)?;
    Ok(ConfirmHostsStep::new(
        std::sync::Arc::new(api),
        storage,
        reporter,
        config,
    ))
}
