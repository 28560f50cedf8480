// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seqredeploy")]
#[command(about = "Sequential, health-gated rolling redeploys of a service's containers")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (default: ./seqredeploy.yml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a seqredeploy.yml configuration file
    Init {
        /// Overwrite existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the HTTP trigger and health endpoints
    Serve,

    /// Redeploy a service once, in the foreground
    Rollout {
        /// Name of the service to redeploy
        #[arg(short, long)]
        service: String,

        /// Name of the gateway (haproxy) service in front of it
        #[arg(long)]
        haproxy: String,

        /// Print the rollout report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the cluster API is reachable
    Check,
}
