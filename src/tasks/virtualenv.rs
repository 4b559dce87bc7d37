use anyhow::{bail, Context, Result};
use tracing::info;

use crate::output;
use crate::ssh::{quote, Remote};
use crate::venv;

use super::context::TaskContext;
use super::services;

/// Result of a venv build on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltVenv {
    pub commit: String,
    /// Dated alias path; what downstream steps should reference.
    pub path: String,
    pub created: bool,
}

/// Make sure the checked-out commit has a virtualenv and add a fresh
/// dated alias for it.
pub async fn build_venv<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<BuiltVenv> {
    let repo = ctx.repo_path();
    let venv_dir = ctx.venv_dir();
    let user = ctx.service_user();

    output::step(remote.host(), "Building virtualenv");

    let commit = remote
        .run_as(user, &format!("cd {} && git rev-parse HEAD", repo))
        .await
        .context("Failed to resolve checked-out commit")?
        .trim()
        .to_string();
    if commit.is_empty() {
        bail!("git rev-parse HEAD returned nothing in {}", repo);
    }

    let commit_path = format!("{}/{}", venv_dir, commit);
    let entries = remote
        .list_dir(&venv_dir)
        .await
        .with_context(|| format!("Failed to list {}", venv_dir))?;

    let created = if entries.iter().any(|e| *e == commit) {
        info!("Virtualenv for {} exists", commit);
        output::success(&format!("Virtualenv for {} exists", short(&commit)));
        false
    } else {
        info!("Virtualenv for {} missing, creating", commit);
        create_venv(remote, ctx, &commit, &commit_path).await?;
        true
    };

    let alias = venv::alias_name(ctx.today, &entries);
    remote
        .run_as(user, &format!("cd {} && ln -s {} {}", venv_dir, commit, alias))
        .await
        .with_context(|| format!("Failed to create alias {}", alias))?;

    output::success(&format!("{} → {}", alias, short(&commit)));
    Ok(BuiltVenv {
        commit,
        path: format!("{}/{}", venv_dir, alias),
        created,
    })
}

/// Create the env and install requirements while holding a per-commit
/// lock. The existence test is repeated under the lock; a failed install
/// removes the half-built directory.
async fn create_venv<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    commit: &str,
    commit_path: &str,
) -> Result<()> {
    let lock = format!("{}/.{}.lock", ctx.venv_dir(), commit);
    let requirements = format!("{}/{}", ctx.repo_path(), ctx.config.deploy.requirements);

    let script = format!(
        "test -d {path} || {{ virtualenv {path} && . {path}/bin/activate && pip install -r {req}; }} || {{ rm -rf {path}; exit 1; }}",
        path = commit_path,
        req = requirements,
    );

    let spinner = output::create_spinner("Installing requirements...");
    let result = remote
        .run_as(
            ctx.service_user(),
            &format!("flock {} bash -c {}", lock, quote(&script)),
        )
        .await;
    spinner.finish_and_clear();

    result.with_context(|| format!("Failed to create virtualenv {}", commit_path))?;
    output::success(&format!("Virtualenv created at {}", commit_path));
    Ok(())
}

/// Build the venv and point the gunicorn run script at it.
pub async fn deploy_venv<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<BuiltVenv> {
    let built = build_venv(remote, ctx).await?;
    services::put_gunicorn_conf(remote, ctx, &built.path).await?;
    Ok(built)
}

fn short(commit: &str) -> &str {
    &commit[..commit.len().min(10)]
}
