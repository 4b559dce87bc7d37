mod cli;
mod config;
mod output;
mod record;
mod render;
mod ssh;
mod tasks;
mod venv;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .without_time()
        .init();

    let cwd = std::env::current_dir()?;

    if let Command::Init = cli.command {
        return cli::init::run(&cwd);
    }

    // Local paths in the config are relative to the config file.
    let project_root = match cli.config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => cwd.join(dir),
        _ => cwd,
    };

    let config = config::PyshipConfig::load(&cli.config)?;
    if let Some((target, task)) = cli.command.into_task() {
        cli::task::run(config, &target, &task, cli.parallel, project_root).await?;
    }

    Ok(())
}
