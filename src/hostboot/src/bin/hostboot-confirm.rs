//! hostboot-confirm: run the confirm-hosts step against a provisioning server from the
//! command line and submit once every host has settled.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use hostboot::{
    http_step, ChannelProgressReporter, HostBootConfig, InstallRequest, JsonFileWizardStorage,
    StepEvent, WizardContext,
};

#[derive(Parser, Debug)]
#[command(
    name = "hostboot-confirm",
    version,
    about = "Bootstrap and register cluster hosts, then confirm them"
)]
struct Args {
    /// Path to hostboot.toml
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Override api.base_url
    #[arg(long = "api-url")]
    api_url: Option<String>,

    /// Host names, whitespace or comma separated
    #[arg(long = "hosts", required = true, num_args = 1..)]
    hosts: Vec<String>,

    /// SSH private key used by the server to install agents
    #[arg(long = "ssh-key-file")]
    ssh_key_file: Option<PathBuf>,

    /// Agents are installed by hand; only track registration
    #[arg(long = "manual", default_value_t = false)]
    manual: bool,

    /// Wizard state file
    #[arg(long = "state-file", default_value = "hostboot-state.json")]
    state_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = HostBootConfig::load(args.config.as_deref())?;
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }
    config.validate()?;

    let ssh_key = match &args.ssh_key_file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => String::new(),
    };
    let request = InstallRequest {
        host_names: args.hosts.join(" ").replace(',', " "),
        manual_install: args.manual,
        ssh_key,
    };
    let context = WizardContext::from_request(&request)?;

    let storage = Arc::new(JsonFileWizardStorage::new(&args.state_file));
    storage.initialize(&context).await?;
    tracing::info!("Wizard state written to {:?}", storage.path());

    let (tx, mut rx) = mpsc::channel(256);
    let reporter = Arc::new(ChannelProgressReporter::new(tx));
    let mut step = http_step(config, storage, reporter)?;
    step.enter_step().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, leaving step");
                step.leave_step().await;
                return Ok(());
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                match &event {
                    StepEvent::HostStatusChanged { host, from, to } => {
                        tracing::info!("{}: {} -> {}", host, from, to);
                    }
                    StepEvent::Notice { header, message } => {
                        tracing::warn!("{}: {}", header, message);
                    }
                    StepEvent::SummaryChanged {
                        total,
                        installing,
                        registering,
                        success,
                        failed,
                    } => {
                        tracing::info!(
                            "{} host(s): {} installing, {} registering, {} succeeded, {} failed",
                            total, installing, registering, success, failed
                        );
                    }
                    StepEvent::SubmissionUnlocked => break,
                    other => tracing::info!("{:?}", other),
                }
            }
        }
    }

    let confirmed = step.submit().await?;
    for host in &confirmed {
        println!("{}\t{}", host.name, host.boot_status);
    }
    Ok(())
}
