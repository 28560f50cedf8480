// ABOUTME: Library root for seqredeploy - exposes the rollout core for testing.
// ABOUTME: The main binary is in main.rs.

pub mod cluster;
pub mod config;
pub mod deploy;
pub mod error;
pub mod server;
pub mod types;
