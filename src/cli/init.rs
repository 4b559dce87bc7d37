use anyhow::{bail, Context, Result};
use dialoguer::{Input, Select};
use minijinja::context;
use std::path::Path;

use crate::output;
use crate::render;

const CONFIG_TEMPLATE: &str = include_str!("../../templates/pyship.toml.j2");

/// Starter deployment templates, copied verbatim (they are templates
/// themselves).
const STARTERS: &[(&str, &str)] = &[
    (
        "deployment/nginx_conf_template",
        include_str!("../../templates/nginx_conf_template"),
    ),
    (
        "deployment/supervisor.conf",
        include_str!("../../templates/supervisor.conf"),
    ),
    (
        "deployment/runserver_template.sh",
        include_str!("../../templates/runserver_template.sh"),
    ),
    (
        "deployment/django_mail_template.sh",
        include_str!("../../templates/django_mail_template.sh"),
    ),
];

pub fn run(project_root: &Path) -> Result<()> {
    let config_path = project_root.join("pyship.toml");
    if config_path.exists() {
        bail!("pyship.toml already exists in this directory");
    }

    let default_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase().replace('-', "_"))
        .unwrap_or_else(|| "mysite".to_string());

    let default_repo = detect_git_remote().unwrap_or_default();

    let app_name: String = Input::new()
        .with_prompt("Django project package")
        .default(default_name)
        .interact_text()?;

    let repository: String = Input::new()
        .with_prompt("Git repository URL")
        .default(default_repo)
        .interact_text()?;

    let branches = ["master", "main"];
    let branch_idx = Select::new()
        .with_prompt("Default branch")
        .items(&branches)
        .default(0)
        .interact()?;

    let service_user: String = Input::new()
        .with_prompt("Service user on the hosts")
        .default("scipy".to_string())
        .interact_text()?;

    let content = render::render_str(
        "pyship.toml",
        CONFIG_TEMPLATE,
        context! {
            app_name => app_name,
            repository => repository,
            branch => branches[branch_idx],
            service_user => service_user,
        },
    )?;
    std::fs::write(&config_path, content).context("Failed to write pyship.toml")?;
    output::success("Created pyship.toml");

    write_starters(project_root)?;
    output::info("Edit pyship.toml to configure your targets and hosts.");

    Ok(())
}

/// Write each starter template that does not exist yet.
fn write_starters(project_root: &Path) -> Result<()> {
    for (relative, content) in STARTERS {
        let path = project_root.join(relative);
        if path.exists() {
            output::info(&format!("Keeping existing {}", relative));
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        output::success(&format!("Created {}", relative));
    }
    Ok(())
}

fn detect_git_remote() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
