use anyhow::{Context, Result};
use tracing::debug;

use crate::output;
use crate::ssh::Remote;

use super::context::TaskContext;

/// apt index older than this many minutes is refreshed.
const INDEX_MAX_AGE_MINUTES: u32 = 60;

/// Ensure every configured OS package is installed.
pub async fn install_packages<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    let packages = &ctx.config.packages;
    output::step(remote.host(), &format!("Checking {} packages", packages.len()));

    if packages.is_empty() {
        output::success("No packages configured");
        return Ok(());
    }

    remote
        .run_privileged(&format!(
            "if [ -z \"$(find /var/lib/apt/lists -maxdepth 0 -mmin -{})\" ]; then apt-get update -qq; fi",
            INDEX_MAX_AGE_MINUTES
        ))
        .await
        .context("Failed to update apt index")?;

    let probe = format!(
        "for p in {}; do dpkg-query -W -f='${{Status}}' \"$p\" 2>/dev/null | grep -q 'ok installed' || echo \"$p\"; done",
        packages.join(" ")
    );
    let probe_output = remote
        .exec(&probe)
        .await
        .context("Failed to query installed packages")?;
    let missing = missing_packages(&probe_output);

    if missing.is_empty() {
        output::success(&format!("All {} packages present", packages.len()));
        return Ok(());
    }

    debug!("Missing packages: {:?}", missing);
    let spinner = output::create_spinner(&format!("Installing {} packages...", missing.len()));
    let installed = remote
        .run_privileged(&format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install -y -qq {}",
            missing.join(" ")
        ))
        .await;
    spinner.finish_and_clear();
    installed.context("Failed to install packages")?;

    output::success(&format!("Installed {}", missing.join(", ")));
    Ok(())
}

fn missing_packages(probe_output: &str) -> Vec<&str> {
    probe_output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}
