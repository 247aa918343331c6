//! # gristle
//!
//! Relay binary: loads the configuration, starts the SSH front end and one
//! scanner per watched repository, and drains everything on ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gristle_core::VERSION;
use gristle_github::{GitHubApi, GitHubClient};
use gristle_server::{DRAIN_TIMEOUT, GristleServer};
use gristle_settings::{DEFAULT_CONFIG_PATH, GristleConfig, load_config};
use gristle_telemetry::{TelemetryConfig, init_telemetry};
use tracing::{error, info, warn};

/// Relay GitHub repository events to SSH clients.
#[derive(Parser, Debug)]
#[command(name = "gristle", version, about = "Relay GitHub repository events to SSH clients")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// One API client per configured account, in account order.
fn github_clients(config: &GristleConfig) -> Result<Vec<Arc<dyn GitHubApi>>> {
    config
        .accounts
        .iter()
        .map(|account| {
            let password = account.password.clone();
            let client = GitHubClient::new(&account.url, &account.username, password)
                .with_context(|| format!("failed to create API client for {}", account.url))?;
            Ok(Arc::new(client) as Arc<dyn GitHubApi>)
        })
        .collect()
}

async fn run(config: GristleConfig) -> Result<()> {
    let apis = github_clients(&config)?;
    let server = GristleServer::bind(&config, &apis).context("failed to start SSH server")?;
    let addr = server
        .local_addr()
        .context("failed to read listener address")?;
    info!(
        %addr,
        version = VERSION,
        accounts = config.accounts.len(),
        repos = config.repos().count(),
        "gristle started"
    );

    let running = server.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    if !running.shutdown(Some(DRAIN_TIMEOUT)).await {
        warn!("some tasks did not stop in time");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _ = init_telemetry(&TelemetryConfig::default());
            error!(path = %cli.config.display(), error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig::with_log_file(config.log_file.clone())) {
        let _ = init_telemetry(&TelemetryConfig::default());
        error!(error = %e, "failed to set up logging");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "fatal error");
            ExitCode::FAILURE
        }
    }
}
