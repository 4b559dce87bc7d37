use anyhow::{Context, Result};

use crate::output;
use crate::ssh::Remote;

use super::context::TaskContext;

const COLLECT_CMD: &str = "python manage.py collectstatic --noinput --clear";

/// Run Django's collectstatic from `venv` and open up the output dir.
pub async fn build_static<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    venv: &str,
) -> Result<()> {
    let venv = super::venv_path(ctx, venv);
    let user = ctx.service_user();
    output::step(remote.host(), "Collecting static files");

    let spinner = output::create_spinner("collectstatic...");
    let collected = remote
        .run_as(
            user,
            &format!(
                "cd {} && source {}/bin/activate && {}",
                ctx.repo_path(),
                venv,
                COLLECT_CMD
            ),
        )
        .await;
    spinner.finish_and_clear();
    collected.context("Failed to collect static files")?;

    let static_dir = format!("{}/{}", ctx.site_path(), ctx.config.deploy.static_dir);
    remote
        .run_as(user, &format!("chmod -R a+rx {}", static_dir))
        .await
        .with_context(|| format!("Failed to set permissions on {}", static_dir))?;

    output::success(&format!("Static files collected into {}", static_dir));
    Ok(())
}
