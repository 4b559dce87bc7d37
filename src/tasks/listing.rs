use anyhow::Result;

use crate::output;
use crate::record::DeployRecord;
use crate::ssh::Remote;
use crate::venv;

use super::context::TaskContext;

/// Print the dated aliases on a host, newest first, marking the one the
/// last full deploy used.
pub async fn list_venvs<R: Remote + ?Sized>(remote: &R, ctx: &TaskContext) -> Result<()> {
    let venv_dir = ctx.venv_dir();
    output::info(&format!("Host: {}", remote.host()));

    if !remote.path_exists(&venv_dir).await? {
        output::warning(&format!("{} does not exist", venv_dir));
        return Ok(());
    }

    let links = remote
        .exec(&format!(
            "find {} -mindepth 1 -maxdepth 1 -type l -printf '%f %l\\n'",
            venv_dir
        ))
        .await?;
    let record = DeployRecord::read(remote, &ctx.site_path()).await?;
    let current = record.as_ref().map(|r| r.venv.as_str());

    let aliases = sorted_aliases(&links);
    if aliases.is_empty() {
        output::warning("No virtualenv aliases found");
        return Ok(());
    }

    for (alias, commit) in aliases {
        let path = format!("{}/{}", venv_dir, alias);
        if Some(path.as_str()) == current {
            println!("  {} → {} ← current", alias, commit);
        } else {
            println!("  {} → {}", alias, commit);
        }
    }
    Ok(())
}

/// `name target` lines to (alias, target) pairs, newest alias first.
/// Symlinks that are not dated aliases are dropped.
fn sorted_aliases(find_output: &str) -> Vec<(&str, &str)> {
    let mut aliases: Vec<_> = find_output
        .lines()
        .filter_map(|line| line.trim().split_once(' '))
        .filter_map(|(name, target)| venv::parse_alias(name).map(|key| (key, name, target)))
        .collect();
    aliases.sort_by(|a, b| b.0.cmp(&a.0));
    aliases
        .into_iter()
        .map(|(_, name, target)| (name, target))
        .collect()
}
