// ABOUTME: Entry point for the seqredeploy service and CLI.
// ABOUTME: Parses arguments and dispatches to the server or one-shot commands.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use seqredeploy::cluster::{DockerCluster, service_count};
use seqredeploy::config::{self, Config};
use seqredeploy::deploy::{HealthGate, HttpProbe, RedeployCoordinator, Rollout, RolloutSettings};
use seqredeploy::error::{Error, Result};
use seqredeploy::server::{self, AppState};
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // -v forces debug; otherwise RUST_LOG, falling back to info
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;

    if let Commands::Init { force } = cli.command {
        config::init_config(&cwd, force)?;
        println!("Created {}", cwd.join(config::CONFIG_FILENAME).display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&cwd)?,
    };

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Serve => serve(config).await,
        Commands::Rollout {
            service,
            haproxy,
            json,
        } => rollout_once(config, &service, &haproxy, json).await,
        Commands::Check => {
            let cluster = DockerCluster::connect(&config.docker)?;
            let count = service_count(&cluster).await?;
            println!("ok. services={}", count);
            Ok(())
        }
    }
}

fn build_rollout(config: &Config) -> Result<Rollout<DockerCluster, HttpProbe>> {
    let cluster = Arc::new(DockerCluster::connect(&config.docker)?);
    let gate = HealthGate::new(
        HttpProbe::new(config.rollout.request_timeout),
        config.rollout.health_interval,
    )
    .with_probe_host(config.probe_host());

    Ok(Rollout::new(
        cluster,
        gate,
        RolloutSettings::from(&config.rollout),
    ))
}

/// Run the HTTP service until interrupted.
async fn serve(config: Config) -> Result<()> {
    let secret = config.request_secret();
    if secret.is_none() {
        tracing::warn!(
            "{} is not set; every request will be rejected",
            config::SECRET_ENV
        );
    }

    let rollout = build_rollout(&config)?;
    let cluster = Arc::clone(rollout.cluster());
    let state = Arc::new(AppState {
        coordinator: Arc::new(RedeployCoordinator::new(rollout)),
        cluster,
        secret,
    });

    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    tokio::select! {
        result = server::serve(listener, state) => result.map_err(Error::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

/// Redeploy one service synchronously and report the outcome.
async fn rollout_once(config: Config, service: &str, haproxy: &str, json: bool) -> Result<()> {
    let rollout = build_rollout(&config)?;
    let report = rollout.rollout(service, haproxy).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for replacement in &report.replacements {
            println!(
                "  ✓ {}: {} -> {} ({} health check attempt(s))",
                replacement.name, replacement.old, replacement.new, replacement.health_attempts
            );
        }
        println!(
            "Redeployed {} ({} container(s))",
            report.service,
            report.replacements.len()
        );
    }

    Ok(())
}
