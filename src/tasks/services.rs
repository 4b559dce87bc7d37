use anyhow::{Context, Result};
use minijinja::context;

use crate::output;
use crate::render;
use crate::ssh::Remote;

use super::context::TaskContext;

const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";
const SUPERVISOR_CONF_D: &str = "/etc/supervisor/conf.d";

/// Render the nginx site, enable it in place of `default`, reload nginx.
pub async fn deploy_nginx<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    output::step(remote.host(), "Deploying nginx site");

    let target = &ctx.target;
    let rendered = render::render_to_file(
        &ctx.local(&ctx.config.templates.nginx),
        &ctx.rendered("nginx_conf"),
        context! {
            server_name => &target.site,
            cert_name => &target.cert_name,
            upstream => &target.upstream,
            site_path => ctx.site_path(),
        },
    )?;

    let available = format!("{}/{}", SITES_AVAILABLE, target.available);
    remote
        .sudo_write_file(&available, &rendered)
        .await
        .with_context(|| format!("Failed to upload {}", available))?;

    remote
        .run_privileged(&format!(
            "ln -sfn {} {}/{} && rm -f {}/default",
            available, SITES_ENABLED, target.available, SITES_ENABLED
        ))
        .await
        .context("Failed to enable nginx site")?;

    remote
        .run_privileged("nginx -t && service nginx reload")
        .await
        .context("Failed to reload nginx")?;

    output::success(&format!("nginx site {} enabled", target.available));
    Ok(())
}

/// Render the supervisor program config and have supervisord pick it up.
pub async fn deploy_supervisor<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    output::step(remote.host(), "Deploying supervisor config");

    let rendered = render::render_to_file(
        &ctx.local(&ctx.config.templates.supervisor),
        &ctx.rendered("supervisor.conf"),
        context! {
            program => ctx.program(),
            site_path => ctx.site_path(),
            repo_path => ctx.repo_path(),
            user => ctx.service_user(),
        },
    )?;

    let dest = format!("{}/{}.conf", SUPERVISOR_CONF_D, ctx.program());
    remote
        .sudo_write_file(&dest, &rendered)
        .await
        .with_context(|| format!("Failed to upload {}", dest))?;

    remote
        .run_privileged("supervisorctl update")
        .await
        .context("Failed to update supervisor config")?;

    output::success(&format!("Supervisor program {} registered", ctx.program()));
    Ok(())
}

/// Point `<site>/bin/runserver.sh` at `venv`.
pub async fn put_gunicorn_conf<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    venv: &str,
) -> Result<()> {
    let venv = super::venv_path(ctx, venv);
    output::step(remote.host(), &format!("Writing gunicorn run script for {}", venv));

    let rendered = render::render_to_file(
        &ctx.local(&ctx.config.templates.runserver),
        &ctx.rendered("runserver.sh"),
        context! {
            virtualenv => &venv,
            site_path => ctx.site_path(),
            repo_path => ctx.repo_path(),
        },
    )?;

    super::put(remote, ctx, &rendered, &ctx.bin_path("runserver.sh"), Some("0755")).await?;

    output::success("runserver.sh uploaded");
    Ok(())
}

/// Point `<site>/bin/django_mail.sh` at `venv`.
pub async fn deploy_mail<R: Remote + ?Sized>(
    remote: &R,
    ctx: &TaskContext,
    venv: &str,
) -> Result<()> {
    let venv = super::venv_path(ctx, venv);
    output::step(remote.host(), "Writing mail runner script");

    let rendered = render::render_to_file(
        &ctx.local(&ctx.config.templates.mail),
        &ctx.rendered("django_mail.sh"),
        context! {
            virtualenv => &venv,
            site_path => ctx.site_path(),
            repo_path => ctx.repo_path(),
        },
    )?;

    super::put(remote, ctx, &rendered, &ctx.bin_path("django_mail.sh"), None).await?;

    output::success("django_mail.sh uploaded");
    Ok(())
}

pub async fn restart_gunicorn<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    output::step(remote.host(), "Restarting gunicorn");

    remote
        .run_privileged(&format!("supervisorctl restart {}", ctx.program()))
        .await
        .context("Failed to restart gunicorn")?;

    output::success(&format!("{} restarted", ctx.program()));
    Ok(())
}

pub async fn restart_nginx<R: Remote + ?Sized>(remote: &R) -> Result<()> {
    output::step(remote.host(), "Restarting nginx");

    remote
        .run_privileged("service nginx restart")
        .await
        .context("Failed to restart nginx")?;

    output::success("nginx restarted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::testing::ScriptedRemote;
    use crate::tasks::fixtures;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn nginx_site_is_rendered_enabled_and_reloaded() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        deploy_nginx(&remote, &ctx).await?;

        let cmds = remote.commands();
        assert_eq!(cmds.len(), 3);
        assert_eq!(
            cmds[0],
            "sudo tee /etc/nginx/sites-available/citationsneeded > /dev/null\n\
             server_name citationsneeded.org; # citationsneeded citationsneeded_org\n"
        );
        assert!(cmds[1].contains(
            "ln -sfn /etc/nginx/sites-available/citationsneeded /etc/nginx/sites-enabled/citationsneeded"
        ));
        assert!(cmds[1].contains("rm -f /etc/nginx/sites-enabled/default"));
        assert!(cmds[2].contains("service nginx reload"));

        let staged = std::fs::read_to_string(ctx.rendered("nginx_conf"))?;
        assert_eq!(
            staged,
            "server_name citationsneeded.org; # citationsneeded citationsneeded_org\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn supervisor_config_lands_in_conf_d() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        deploy_supervisor(&remote, &ctx).await?;

        assert!(remote.ran("sudo tee /etc/supervisor/conf.d/scipy2014.conf"));
        assert!(remote.ran("[program:scipy2014]\ncommand=/srv/site/bin/runserver.sh\nuser=scipy"));
        assert!(remote.ran("supervisorctl update"));
        Ok(())
    }

    #[tokio::test]
    async fn mail_script_uses_resolved_venv() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        deploy_mail(&remote, &ctx, "2024-01-01.0").await?;

        assert!(remote.ran("/venvs/2024-01-01.0/bin/python manage.py send_mail"));
        assert!(remote.ran("chown scipy /srv/site/bin/django_mail.sh"));
        assert!(!remote.ran("chmod"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_template_uploads_nothing() {
        let (mut ctx, _dir) = fixtures::staging();
        ctx.config.templates.nginx = "deployment/missing".into();
        let remote = ScriptedRemote::new("web1");

        assert!(deploy_nginx(&remote, &ctx).await.is_err());
        assert!(remote.commands().is_empty());
    }

    #[tokio::test]
    async fn restarts_target_the_program() -> Result<()> {
        let (ctx, _dir) = fixtures::staging();
        let remote = ScriptedRemote::new("web1");

        restart_gunicorn(&remote, &ctx).await?;
        restart_nginx(&remote).await?;

        assert_eq!(
            remote.commands(),
            vec![
                "sudo bash -c 'supervisorctl restart scipy2014'".to_string(),
                "sudo bash -c 'service nginx restart'".to_string(),
            ]
        );
        Ok(())
    }
}
