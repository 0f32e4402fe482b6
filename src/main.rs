//! Binary entry point for the Stratus CLI.

use std::io::{self, Write};
use std::net::IpAddr;
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use stratus::session_store::{self, SessionRecord};
use stratus::{
    ArmRestClient, AzureBackend, AzureClient, AzureConfig, AzureError, CloudBackend, ConfigError,
    RemoteEndpoint, SessionStoreError, WindowsGuest,
};

mod cli;

use cli::{Cli, ProvisionCommand, TeardownCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("azure error: {0}")]
    Azure(#[from] AzureError),
    #[error("session file error: {0}")]
    Session(#[from] SessionStoreError),
    #[error("failed to write output: {0}")]
    Output(String),
}

type Backend = AzureBackend<ArmRestClient, WindowsGuest>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    install_tracing(log_filter(&cli));
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn log_filter(cli: &Cli) -> &str {
    match cli {
        Cli::Provision(command) => &command.logging.log,
        Cli::Teardown(command) => &command.logging.log,
    }
}

fn install_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => provision(command).await,
        Cli::Teardown(command) => teardown(command).await,
    }
}

fn load_config() -> Result<AzureConfig, CliError> {
    let config = AzureConfig::load_without_cli_args()?;
    config.validate()?;
    Ok(config)
}

fn load_teardown_config() -> Result<AzureConfig, CliError> {
    let config = AzureConfig::load_without_cli_args()?;
    config.credentials()?;
    Ok(config)
}

fn build_client(
    config: &AzureConfig,
    client: impl FnOnce(ArmRestClient) -> AzureClient<ArmRestClient>,
) -> Result<AzureClient<ArmRestClient>, CliError> {
    let manager = ArmRestClient::new(config.credentials()?)?;
    Ok(client(manager)
        .with_vm_state_policy(config.vm_state_policy())
        .with_floating_ip_policy(config.floating_ip_policy()))
}

async fn provision(args: ProvisionCommand) -> Result<(), CliError> {
    let config = load_config()?;
    let guest = WindowsGuest::new();
    let deployment = config.deployment()?;
    let client = build_client(&config, |manager| AzureClient::new(manager, deployment))?;
    let backend = AzureBackend::from_client(client, guest);

    if let Some(path) = &args.session_file {
        let record = SessionRecord {
            resource_group: backend.client().deployment().resource_group.clone(),
            names: backend.client().names().clone(),
        };
        session_store::save(path, &record)?;
        info!(%path, "session saved");
    }

    let outcome = bring_up(&backend).await;
    if args.keep {
        let (address, endpoint) = outcome?;
        return report_instance(&backend, address, &endpoint);
    }

    let reported = outcome
        .map_err(CliError::from)
        .and_then(|(address, endpoint)| report_instance(&backend, address, &endpoint));
    let cleanup = backend.cleanup().await;
    settle(reported, cleanup, args.session_file.as_deref())
}

/// Combines the provisioning and cleanup outcomes. The first error wins; the
/// session file is removed whenever cleanup succeeded.
fn settle(
    reported: Result<(), CliError>,
    cleanup: Result<(), AzureError>,
    session_file: Option<&Utf8Path>,
) -> Result<(), CliError> {
    let cleaned = cleanup.is_ok();
    let outcome = match (reported, cleanup) {
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, "cleanup failed after provisioning error");
            Err(err)
        }
        (Ok(()), Err(cleanup_err)) => Err(cleanup_err.into()),
        (Ok(()), Ok(())) => Ok(()),
    };
    match session_file {
        Some(path) if cleaned => {
            let removed = session_store::remove(path).map_err(CliError::from);
            outcome.and(removed)
        }
        _ => outcome,
    }
}

async fn bring_up(backend: &Backend) -> Result<(IpAddr, RemoteEndpoint), AzureError> {
    backend.setup_instance().await?;
    let address = backend.floating_ip().await?;
    Ok((address, backend.remote_endpoint(address)))
}

fn report_instance(
    backend: &Backend,
    address: IpAddr,
    endpoint: &RemoteEndpoint,
) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    writeln!(stdout, "instance_id: {}", backend.internal_instance_id())
        .and_then(|()| writeln!(stdout, "floating_ip: {address}"))
        .and_then(|()| writeln!(stdout, "endpoint: {}", endpoint.url))
        .map_err(|err| CliError::Output(err.to_string()))
}

async fn teardown(args: TeardownCommand) -> Result<(), CliError> {
    let record = session_store::load(&args.session_file)?;
    let config = load_teardown_config()?;
    let deployment = config.teardown_deployment(&record.resource_group)?;
    let client = build_client(&config, |manager| {
        AzureClient::with_names(manager, deployment, record.names)
    })?;

    info!(vm = client.vm_name(), "Destroying Azure VM");
    client.destroy_vm().await?;
    session_store::remove(&args.session_file)?;
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
