//! `iris-update agent`: run the update agent on a deployed host.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::application::ports::{ReleaseSource, ServiceManager};
use crate::application::services::agent::UpdateAgent;
use crate::domain::{AgentConfig, AgentState, CycleOutcome};
use crate::infra::archive::TarGzArchiver;
use crate::infra::clock::TokioSleeper;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlAgentConfigStore;
use crate::infra::fs::HostFs;
use crate::infra::http::HttpReleaseSource;
use crate::infra::service::SystemctlServiceManager;
use crate::infra::signal::ShutdownSignal;
use crate::output::{OutputContext, json};

/// Agent subcommands.
#[derive(Subcommand)]
pub enum AgentCommand {
    /// Poll for releases and install them until interrupted
    Run(AgentArgs),

    /// Run a single poll cycle and exit
    Once(AgentArgs),

    /// Show the installed version, service state and server's latest release
    Status(AgentArgs),
}

/// Arguments shared by the agent subcommands.
#[derive(Args)]
pub struct AgentArgs {
    /// Agent config file (default: ~/.iris-update/agent.yaml)
    #[arg(long, env = "IRIS_UPDATE_CONFIG")]
    pub config: Option<PathBuf>,
}

type HostAgent = UpdateAgent<
    HttpReleaseSource,
    SystemctlServiceManager<TokioCommandRunner>,
    TokioCommandRunner,
    HostFs,
    TarGzArchiver,
    YamlAgentConfigStore,
    TokioSleeper,
>;

/// Run an agent subcommand.
///
/// # Errors
///
/// Returns an error if the config is missing or invalid. Update failures
/// are not errors, except a failed rollback in `once`.
pub async fn run(ctx: &OutputContext, cmd: AgentCommand, as_json: bool) -> Result<()> {
    match cmd {
        AgentCommand::Run(args) => {
            let agent = build(args.config)?;
            let shutdown = ShutdownSignal::install()?;
            let mut state = AgentState::new(agent.config.current_version);
            agent.run_until(&mut state, shutdown.recv()).await;
            Ok(())
        }
        AgentCommand::Once(args) => {
            let agent = build(args.config)?;
            let mut state = AgentState::new(agent.config.current_version);
            let outcome = agent.run_cycle(&mut state).await;
            report_cycle(ctx, &outcome, state.current_version, as_json)?;
            if outcome.needs_intervention() {
                anyhow::bail!("{outcome}");
            }
            Ok(())
        }
        AgentCommand::Status(args) => status(ctx, args.config, as_json).await,
    }
}

fn build(config_path: Option<PathBuf>) -> Result<HostAgent> {
    let store = YamlAgentConfigStore::resolve(config_path)?;
    let config = store.load()?;
    tracing::debug!(path = %store.path().display(), "agent config loaded");
    Ok(UpdateAgent {
        source: HttpReleaseSource::from_config(&config)?,
        services: SystemctlServiceManager::new(TokioCommandRunner::default(), config.use_sudo),
        runner: TokioCommandRunner::default(),
        fs: HostFs,
        unpacker: TarGzArchiver,
        store,
        sleeper: TokioSleeper,
        config,
    })
}

#[derive(Serialize)]
struct CycleReport {
    outcome: String,
    committed: Option<u64>,
    current_version: u64,
}

fn report_cycle(
    ctx: &OutputContext,
    outcome: &CycleOutcome,
    current_version: u64,
    as_json: bool,
) -> Result<()> {
    if as_json {
        let report = CycleReport {
            outcome: outcome.to_string(),
            committed: outcome.committed_version(),
            current_version,
        };
        println!("{}", json::format_value(&report)?);
        return Ok(());
    }
    match outcome {
        CycleOutcome::Committed { .. }
        | CycleOutcome::NoRelease
        | CycleOutcome::UpToDate { .. } => ctx.success(&outcome.to_string()),
        CycleOutcome::RollbackFailed { .. } => ctx.error(&outcome.to_string()),
        _ => ctx.warn(&outcome.to_string()),
    }
    ctx.kv("Current version", &current_version.to_string());
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    config: PathBuf,
    server_url: String,
    install_dir: PathBuf,
    service: String,
    current_version: u64,
    service_status: String,
    latest_version: Option<u64>,
    server_error: Option<String>,
}

async fn status(ctx: &OutputContext, config_path: Option<PathBuf>, as_json: bool) -> Result<()> {
    let store = YamlAgentConfigStore::resolve(config_path)?;
    let config: AgentConfig = store.load()?;

    let services = SystemctlServiceManager::new(TokioCommandRunner::default(), config.use_sudo);
    let service_status = match services.status(&config.managed_service_name).await {
        Ok(s) => s.to_string(),
        Err(e) => format!("unknown ({e:#})"),
    };
    let source = HttpReleaseSource::from_config(&config).context("building HTTP client")?;
    let (latest_version, server_error) = match source.latest().await {
        Ok(latest) => (latest.map(|r| r.version), None),
        Err(e) => (None, Some(format!("{e:#}"))),
    };

    let report = StatusReport {
        config: store.path().to_path_buf(),
        server_url: config.server_base().to_string(),
        install_dir: config.install_dir.clone(),
        service: config.managed_service_name.clone(),
        current_version: config.current_version,
        service_status,
        latest_version,
        server_error,
    };

    if as_json {
        println!("{}", json::format_value(&report)?);
        return Ok(());
    }

    ctx.header("Update agent");
    ctx.kv("Config         ", &report.config.display().to_string());
    ctx.kv("Server         ", &report.server_url);
    ctx.kv("Install dir    ", &report.install_dir.display().to_string());
    ctx.kv("Service        ", &format!("{} ({})", report.service, report.service_status));
    ctx.kv("Current version", &report.current_version.to_string());
    match (&report.latest_version, &report.server_error) {
        (_, Some(err)) => ctx.warn(&format!("server unreachable: {err}")),
        (Some(latest), None) if *latest > report.current_version => {
            ctx.kv("Latest         ", &format!("{latest} (update pending)"));
        }
        (Some(latest), None) => ctx.kv("Latest         ", &latest.to_string()),
        (None, None) => ctx.kv("Latest         ", "none published"),
    }
    Ok(())
}
