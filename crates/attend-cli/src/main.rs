use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use attend_cli::commands::{events, export, overrides, participants, report, scan, serve, status};
use attend_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Some(Commands::Serve(args)) => serve::run(args, &config)?,
        Some(Commands::Scan(args)) => scan::run(&mut stdout, args, &config)?,
        Some(Commands::Finalize(args)) => report::finalize(&mut stdout, args, &config)?,
        Some(Commands::Stats(args)) => report::stats(&mut stdout, args, &config)?,
        Some(Commands::Roster(args)) => report::roster(&mut stdout, args, &config)?,
        Some(Commands::Export(args)) => export::run(&mut stdout, args, &config)?,
        Some(Commands::Status) => status::run(&mut stdout, &config)?,
        Some(Commands::Events(action)) => events::run(&mut stdout, action, &config)?,
        Some(Commands::Participants(action)) => {
            participants::run(&mut stdout, action, &config)?;
        }
        Some(Commands::Override(args)) => overrides::run(&mut stdout, args, &config)?,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
