use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::output;
use crate::ssh::{quote, Remote};

use super::context::TaskContext;

/// Fetch and check out `commit` (default `origin/<branch>`), then put the
/// target's settings and the host's secrets into the checkout.
///
/// Each step must succeed before the next runs. Nothing is rolled back:
/// a failure after checkout leaves the new tree with stale settings.
/// Returns the SHA-256 of the uploaded settings.
pub async fn update_repo<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    commit: Option<&str>,
) -> Result<String> {
    let git_ref = commit
        .map(str::to_string)
        .unwrap_or_else(|| ctx.config.default_ref());
    let repo = ctx.repo_path();
    let user = ctx.service_user();

    output::step(remote.host(), &format!("Updating {} to {}", repo, git_ref));

    remote
        .run_as(user, &format!("cd {} && git fetch", repo))
        .await
        .context("Failed to fetch repository")?;

    remote
        .run_as(user, &format!("cd {} && git checkout {}", repo, quote(&git_ref)))
        .await
        .with_context(|| format!("Failed to check out {}", git_ref))?;

    let local_settings = ctx.local(&ctx.target.local_settings);
    let settings = std::fs::read_to_string(&local_settings)
        .with_context(|| format!("Failed to read settings: {}", local_settings.display()))?;
    let settings_dest = format!("{}/{}", repo, ctx.config.settings_path());
    super::put(remote, ctx, &settings, &settings_dest, None).await?;

    let secrets_dest = format!("{}/{}", repo, ctx.config.secrets_path());
    remote
        .run_as(
            user,
            &format!("cp {} {}", ctx.config.deploy.secrets_source, secrets_dest),
        )
        .await
        .context("Failed to copy secrets into checkout")?;

    output::success(&format!("Checked out {}", git_ref));
    Ok(hex::encode(Sha256::digest(settings.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::exec::CommandFailed;
    use crate::ssh::testing::ScriptedRemote;
    use crate::tasks::fixtures;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn defaults_to_branch_tip() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        update_repo(&remote, &ctx, None).await?;

        assert!(remote.ran("git checkout '\\''origin/master'\\''"));
        Ok(())
    }

    #[tokio::test]
    async fn uploads_settings_then_copies_secrets() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        let hash = update_repo(&remote, &ctx, Some("abc123")).await?;

        let cmds = remote.commands();
        assert_eq!(cmds.len(), 5);
        assert!(cmds[0].contains("cd /srv/site/SciPy-2014 && git fetch"));
        assert!(cmds[1].contains("git checkout"));
        assert!(cmds[1].contains("abc123"));
        assert!(cmds[2].starts_with(
            "sudo tee /srv/site/SciPy-2014/scipy2014/local_settings.py > /dev/null"
        ));
        assert!(cmds[2].contains("DEBUG = False"));
        assert!(cmds[3].contains("chown scipy /srv/site/SciPy-2014/scipy2014/local_settings.py"));
        assert!(cmds[4].contains("cp ~/secrets.py /srv/site/SciPy-2014/scipy2014/secrets.py"));
        assert_eq!(hash, hex::encode(Sha256::digest(b"DEBUG = False\n")));
        Ok(())
    }

    #[tokio::test]
    async fn settings_hash_matches_uploaded_bytes() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        std::fs::write(ctx.local(&ctx.target.local_settings), "SECRET_KEY = 'x'")?;
        let remote = ScriptedRemote::new("web1");

        let hash = update_repo(&remote, &ctx, Some("abc123")).await?;

        let uploaded = remote
            .input_for("scipy2014/local_settings.py > /dev/null")
            .unwrap();
        assert_eq!(uploaded, b"SECRET_KEY = 'x'");
        assert_eq!(hash, hex::encode(Sha256::digest(&uploaded)));
        Ok(())
    }

    #[tokio::test]
    async fn failed_checkout_stops_before_settings_upload() {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1").fail("git checkout");

        let err = update_repo(&remote, &ctx, Some("nope")).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to check out nope");
        let failed = err.downcast_ref::<CommandFailed>().unwrap();
        assert_eq!(failed.host, "web1");
        assert_eq!(remote.commands().len(), 2);
        assert!(!remote.ran("local_settings.py"));
        assert!(!remote.ran("secrets.py"));
    }
}
