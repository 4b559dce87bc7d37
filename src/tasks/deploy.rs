use anyhow::Result;
use tracing::warn;

use crate::output;
use crate::record::DeployRecord;
use crate::ssh::Remote;

use super::context::TaskContext;
use super::{packages, repo, services, statics, virtualenv};

/// Full deploy of `commit` (default branch tip) on one host. Stops at the
/// first failing step; earlier steps stay applied.
pub async fn deploy<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    commit: Option<&str>,
) -> Result<()> {
    packages::install_packages(remote, ctx).await?;

    let settings_hash = repo::update_repo(remote, ctx, commit).await?;

    let site = ctx.site_path();
    let previous = previous_venv(remote, &site).await?;

    let built = virtualenv::deploy_venv(remote, ctx).await?;
    services::deploy_mail(remote, ctx, &built.path).await?;
    statics::build_static(remote, ctx, &built.path).await?;

    services::deploy_supervisor(remote, ctx).await?;
    services::restart_gunicorn(remote, ctx).await?;

    services::deploy_nginx(remote, ctx).await?;
    services::restart_nginx(remote).await?;

    DeployRecord::new(
        built.commit.clone(),
        built.path.clone(),
        previous,
        Some(settings_hash),
    )
    .write(remote, &site)
    .await?;

    output::success(&format!(
        "{} live on {} from {}{}",
        built.commit,
        remote.host(),
        built.path,
        if built.created { " (new virtualenv)" } else { "" }
    ));
    Ok(())
}

/// Venv of the last recorded deploy. An unreadable record is replaced on
/// this deploy rather than stopping it.
async fn previous_venv<R: Remote + ?Sized>(remote: &R, site: &str) -> Result<Option<String>> {
    match DeployRecord::read(remote, site).await {
        Ok(record) => Ok(record.map(|r| r.venv)),
        Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
            warn!("[{}] {:#}", remote.host(), e);
            output::warning(&format!("Ignoring unreadable {}", DeployRecord::path(site)));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
