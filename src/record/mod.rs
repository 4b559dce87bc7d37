use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ssh::Remote;

const RECORD_FILE: &str = "pyship.json";

/// Summary of the last full deploy on a host, kept at `<site>/pyship.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRecord {
    pub commit: String,
    /// Alias path the running gunicorn was started from.
    pub venv: String,
    pub previous_venv: Option<String>,
    #[serde(default)]
    pub settings_hash: Option<String>,
    pub deployed_at: String,
}

impl DeployRecord {
    pub fn new(
        commit: String,
        venv: String,
        previous_venv: Option<String>,
        settings_hash: Option<String>,
    ) -> Self {
        Self {
            commit,
            venv,
            previous_venv,
            settings_hash,
            deployed_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn path(site_path: &str) -> String {
        format!("{}/{}", site_path, RECORD_FILE)
    }

    pub async fn read<R: Remote + ?Sized>(remote: &R, site_path: &str) -> Result<Option<Self>> {
        let path = Self::path(site_path);

        if !remote.path_exists(&path).await? {
            return Ok(None);
        }

        let content = remote.exec(&format!("cat {}", path)).await?;
        let record = serde_json::from_str(content.trim())
            .with_context(|| format!("Corrupt deploy record at {}", path))?;
        Ok(Some(record))
    }

    pub async fn write<R: Remote + ?Sized>(&self, remote: &R, site_path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        remote
            .sudo_write_file(&Self::path(site_path), &content)
            .await
            .context("Failed to write deploy record")
    }
}
