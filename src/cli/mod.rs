use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::tasks::Task;

pub mod init;
pub mod task;

#[derive(Parser)]
#[command(
    name = "pyship",
    version,
    about = "Deploy Django sites: per-commit virtualenvs, gunicorn, supervisor, nginx"
)]
pub struct Cli {
    /// Path to pyship.toml
    #[arg(short, long, default_value = "pyship.toml")]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run against all hosts of the target at once
    #[arg(long, global = true)]
    pub parallel: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scaffold pyship.toml and starter templates in the current directory
    Init,

    /// One-time host setup: packages, SSH hardening, service user, checkout
    Provision {
        /// Target to operate on
        #[arg(short, long)]
        stage: String,
    },

    /// Install the configured OS packages
    InstallDeps {
        #[arg(short, long)]
        stage: String,
    },

    /// Full deploy: update code, build venv, static files, services
    Deploy {
        #[arg(short, long)]
        stage: String,
        /// Commit or ref to deploy (default origin/<branch>)
        #[arg(long)]
        commit: Option<String>,
    },

    /// Fetch and check out a commit, upload settings and secrets
    UpdateRepo {
        #[arg(short, long)]
        stage: String,
        #[arg(long)]
        commit: Option<String>,
    },

    /// Run collectstatic from a virtualenv
    BuildStatic {
        #[arg(short, long)]
        stage: String,
        /// Virtualenv path or alias (e.g. 2024-01-01.0)
        #[arg(long)]
        venv: String,
    },

    /// Upload and enable the nginx site
    DeployNginx {
        #[arg(short, long)]
        stage: String,
    },

    /// Upload the supervisor program config
    DeploySupervisor {
        #[arg(short, long)]
        stage: String,
    },

    /// Build the virtualenv for the checked-out commit and point gunicorn at it
    DeployVenv {
        #[arg(short, long)]
        stage: String,
    },

    /// Upload the gunicorn run script for a virtualenv
    PutGunicornConf {
        #[arg(short, long)]
        stage: String,
        #[arg(long)]
        venv: String,
    },

    /// Restart the gunicorn program under supervisor
    RestartGunicorn {
        #[arg(short, long)]
        stage: String,
    },

    /// Restart nginx
    RestartNginx {
        #[arg(short, long)]
        stage: String,
    },

    /// Upload the mail runner script for a virtualenv
    DeployMail {
        #[arg(short, long)]
        stage: String,
        #[arg(long)]
        venv: String,
    },

    /// List virtualenv aliases on each host
    Venvs {
        #[arg(short, long)]
        stage: String,
    },
}

impl Command {
    /// Target name and task for every command except `init`.
    pub fn into_task(self) -> Option<(String, Task)> {
        let pair = match self {
            Command::Init => return None,
            Command::Provision { stage } => (stage, Task::Provision),
            Command::InstallDeps { stage } => (stage, Task::InstallDeps),
            Command::Deploy { stage, commit } => (stage, Task::Deploy { commit }),
            Command::UpdateRepo { stage, commit } => (stage, Task::UpdateRepo { commit }),
            Command::BuildStatic { stage, venv } => (stage, Task::BuildStatic { venv }),
            Command::DeployNginx { stage } => (stage, Task::DeployNginx),
            Command::DeploySupervisor { stage } => (stage, Task::DeploySupervisor),
            Command::DeployVenv { stage } => (stage, Task::DeployVenv),
            Command::PutGunicornConf { stage, venv } => (stage, Task::PutGunicornConf { venv }),
            Command::RestartGunicorn { stage } => (stage, Task::RestartGunicorn),
            Command::RestartNginx { stage } => (stage, Task::RestartNginx),
            Command::DeployMail { stage, venv } => (stage, Task::DeployMail { venv }),
            Command::Venvs { stage } => (stage, Task::Venvs),
        };
        Some(pair)
    }
}
