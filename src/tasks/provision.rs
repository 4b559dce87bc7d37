use anyhow::{Context, Result};
use tracing::warn;

use crate::output;
use crate::ssh::exec::CommandFailed;
use crate::ssh::Remote;

use super::context::TaskContext;
use super::packages;

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

/// One-time host setup. There is no "already provisioned" check: running
/// it twice reports the existing service user as a warning and carries on.
pub async fn provision<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    packages::install_packages(remote, ctx).await?;
    configure_ssh(remote).await?;
    setup_user(remote, ctx).await?;
    setup_sitepaths(remote, ctx).await?;

    output::success(&format!("{} provisioned", remote.host()));
    Ok(())
}

async fn configure_ssh<R: Remote + ?Sized>(remote: &R) -> Result<()> {
    output::step(remote.host(), "Disabling SSH password authentication");

    remote
        .run_privileged(&format!(
            "sed -i.bak -r -e 's/^#PasswordAuthentication yes/PasswordAuthentication no/g' {}",
            SSHD_CONFIG
        ))
        .await
        .context("Failed to edit sshd_config")?;

    remote
        .run_privileged("service ssh restart")
        .await
        .context("Failed to restart ssh")?;

    output::success("Password authentication disabled");
    Ok(())
}

/// A `useradd` that exits non-zero (typically: the user exists) is only a
/// warning. Losing the connection is not.
async fn setup_user<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    let user = ctx.service_user();
    output::step(remote.host(), &format!("Creating user {}", user));

    let created = remote
        .run_privileged(&format!(
            "useradd -s/bin/bash -d{} -m {}",
            ctx.config.home(),
            user
        ))
        .await;

    match created {
        Ok(_) => output::success(&format!("User {} created", user)),
        Err(e) if e.downcast_ref::<CommandFailed>().is_some() => {
            warn!("[{}] useradd failed: {:#}", remote.host(), e);
            output::warning(&format!("Could not create user {} (continuing)", user));
        }
        Err(e) => return Err(e.context(format!("Failed to create user {}", user))),
    }
    Ok(())
}

async fn setup_sitepaths<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    let user = ctx.service_user();
    let site = ctx.site_path();
    output::step(remote.host(), "Creating site layout");

    remote
        .run_as(
            user,
            &format!(
                "mkdir -p {} {} {}/bin {}/logs",
                site,
                ctx.venv_dir(),
                site,
                site
            ),
        )
        .await
        .context("Failed to create site directories")?;

    remote
        .run_as(
            user,
            &format!(
                "cd {} && git clone {} {}",
                site,
                ctx.config.app.repository,
                ctx.config.repo_dir()
            ),
        )
        .await
        .context("Failed to clone repository")?;

    output::success(&format!("Repository cloned into {}", ctx.repo_path()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::testing::ScriptedRemote;
    use crate::tasks::fixtures;

    #[tokio::test]
    async fn existing_user_does_not_stop_provisioning() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1").fail("useradd");

        provision(&remote, &ctx).await?;

        assert!(remote.ran("PasswordAuthentication no"));
        assert!(remote.ran("mkdir -p /srv/site /venvs /srv/site/bin /srv/site/logs"));
        assert!(remote.ran(
            "cd /srv/site && git clone https://github.com/scipy-conference/SciPy-2014.git SciPy-2014"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn lost_connection_during_useradd_halts_provisioning() {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1").drop_connection("useradd");

        let err = provision(&remote, &ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to create user scipy");
        assert!(!remote.ran("mkdir -p"));
        assert!(!remote.ran("git clone"));
    }

    #[tokio::test]
    async fn clone_failure_fails_provisioning() {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1").fail("git clone");

        let err = provision(&remote, &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to clone repository");
    }

    #[tokio::test]
    async fn ssh_is_hardened_before_user_creation() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        provision(&remote, &ctx).await?;

        let cmds = remote.commands();
        let sed = cmds.iter().position(|c| c.contains("sshd_config")).unwrap();
        let useradd = cmds.iter().position(|c| c.contains("useradd")).unwrap();
        assert!(sed < useradd);
        assert!(cmds[useradd].contains("useradd -s/bin/bash -d/srv -m scipy"));
        Ok(())
    }
}
