pub mod context;
pub mod deploy;
pub mod listing;
pub mod packages;
pub mod provision;
pub mod repo;
pub mod services;
pub mod statics;
pub mod virtualenv;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::output;
use crate::ssh::{Remote, SshSession};
use crate::venv;

use context::TaskContext;

/// One invocable unit of work, applied to every host of the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Provision,
    InstallDeps,
    Deploy { commit: Option<String> },
    UpdateRepo { commit: Option<String> },
    BuildStatic { venv: String },
    DeployNginx,
    DeploySupervisor,
    DeployVenv,
    PutGunicornConf { venv: String },
    RestartGunicorn,
    RestartNginx,
    DeployMail { venv: String },
    Venvs,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Provision => "provision",
            Task::InstallDeps => "install-deps",
            Task::Deploy { .. } => "deploy",
            Task::UpdateRepo { .. } => "update-repo",
            Task::BuildStatic { .. } => "build-static",
            Task::DeployNginx => "deploy-nginx",
            Task::DeploySupervisor => "deploy-supervisor",
            Task::DeployVenv => "deploy-venv",
            Task::PutGunicornConf { .. } => "put-gunicorn-conf",
            Task::RestartGunicorn => "restart-gunicorn",
            Task::RestartNginx => "restart-nginx",
            Task::DeployMail { .. } => "deploy-mail",
            Task::Venvs => "venvs",
        }
    }
}

/// Opens and closes sessions to the hosts of a target.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Remote;

    async fn connect(&self, ctx: &TaskContext, host: &HostConfig) -> Result<Self::Session>;

    async fn disconnect(&self, session: Self::Session) -> Result<()>;
}

/// Connects over SSH with the target's login user, port and identity file.
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, ctx: &TaskContext, host: &HostConfig) -> Result<SshSession> {
        let (user, address) = host.login(ctx.ssh_user());
        let identity = ctx.target.identity_file.as_deref().map(|p| ctx.local(p));

        SshSession::connect(user, address, ctx.target.port, identity.as_deref()).await
    }

    async fn disconnect(&self, session: SshSession) -> Result<()> {
        session.close().await
    }
}

/// Run `task` against every host of the selected target.
///
/// Sequential dispatch stops at the first failing host. Parallel dispatch
/// runs all hosts to completion, reports each failure, and fails if any
/// host failed.
pub async fn run<C: Connector>(
    ctx: &TaskContext,
    task: &Task,
    parallel: bool,
    connector: &C,
) -> Result<()> {
    output::header(&format!(
        "{} {} on {}",
        task.name(),
        ctx.program(),
        ctx.target_name
    ));

    let hosts = &ctx.target.hosts;

    if parallel && hosts.len() > 1 {
        info!("Dispatching {} to {} hosts in parallel", task.name(), hosts.len());
        let outcomes = join_all(hosts.iter().map(|host| async move {
            (
                host.address.as_str(),
                run_host(ctx, host, task, connector).await,
            )
        }))
        .await;
        summarize(task, outcomes)?;
    } else {
        for host in hosts {
            run_host(ctx, host, task, connector)
                .await
                .with_context(|| format!("{} failed on {}", task.name(), host.address))?;
        }
    }

    println!();
    output::success(&format!("{} complete on {}", task.name(), ctx.target_name));
    Ok(())
}

fn summarize(task: &Task, outcomes: Vec<(&str, Result<()>)>) -> Result<()> {
    let total = outcomes.len();
    let mut failed = Vec::new();

    for (address, outcome) in outcomes {
        match outcome {
            Ok(()) => output::success(&format!("{}: {} done", address, task.name())),
            Err(e) => {
                output::error(&format!("{}: {:#}", address, e));
                failed.push(address);
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} failed on {} of {} hosts: {}",
            task.name(),
            failed.len(),
            total,
            failed.join(", ")
        );
    }
    Ok(())
}

async fn run_host<C: Connector>(
    ctx: &TaskContext,
    host: &HostConfig,
    task: &Task,
    connector: &C,
) -> Result<()> {
    let session = connector.connect(ctx, host).await?;

    let result = run_on(&session, ctx, task).await;
    let closed = connector.disconnect(session).await;
    result?;
    closed
}

/// Run `task` on one already-connected host.
pub async fn run_on<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext, task: &Task) -> Result<()> {
    debug!("[{}] task {:?}", remote.host(), task);

    match task {
        Task::Provision => provision::provision(remote, ctx).await,
        Task::InstallDeps => packages::install_packages(remote, ctx).await,
        Task::Deploy { commit } => deploy::deploy(remote, ctx, commit.as_deref()).await,
        Task::UpdateRepo { commit } => repo::update_repo(remote, ctx, commit.as_deref())
            .await
            .map(|_| ()),
        Task::BuildStatic { venv } => statics::build_static(remote, ctx, venv).await,
        Task::DeployNginx => services::deploy_nginx(remote, ctx).await,
        Task::DeploySupervisor => services::deploy_supervisor(remote, ctx).await,
        Task::DeployVenv => virtualenv::deploy_venv(remote, ctx).await.map(|_| ()),
        Task::PutGunicornConf { venv } => services::put_gunicorn_conf(remote, ctx, venv).await,
        Task::RestartGunicorn => services::restart_gunicorn(remote, ctx).await,
        Task::RestartNginx => services::restart_nginx(remote).await,
        Task::DeployMail { venv } => services::deploy_mail(remote, ctx, venv).await,
        Task::Venvs => listing::list_venvs(remote, ctx).await,
    }
}

/// Upload `content` to `dest` as root, then hand it to the service user.
pub(crate) async fn put<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    content: &str,
    dest: &str,
    mode: Option<&str>,
) -> Result<()> {
    remote
        .sudo_write_file(dest, content)
        .await
        .with_context(|| format!("Failed to upload {}", dest))?;

    let mut fixup = format!("chown {} {}", ctx.service_user(), dest);
    if let Some(mode) = mode {
        fixup.push_str(&format!(" && chmod {} {}", mode, dest));
    }
    remote
        .run_privileged(&fixup)
        .await
        .with_context(|| format!("Failed to set ownership of {}", dest))?;
    Ok(())
}

/// Absolute path of a venv argument given on the command line.
pub(crate) fn venv_path(ctx: &TaskContext, venv: &str) -> String {
    venv::resolve(&ctx.venv_dir(), venv)
}
