//! Serve command for running the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use super::util::open_engine;
use crate::Config;
use crate::server::{self, AppState};

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the configured bind address.
    #[arg(long)]
    pub host: Option<String>,

    /// Override the configured port.
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Starts a multi-threaded runtime and serves until `Ctrl-C`.
pub fn run(args: &ServeArgs, config: &Config) -> Result<()> {
    let mut server_config = config.server();
    if let Some(host) = &args.host {
        server_config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let state = Arc::new(AppState::new(
        open_engine(config)?,
        config.presence_percent()?,
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::start_server(&server_config, state))?;
    Ok(())
}
