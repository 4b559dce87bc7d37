use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::config::{PyshipConfig, TargetConfig};

/// Everything a task reads, fixed once the target is selected.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub config: PyshipConfig,
    pub target_name: String,
    pub target: TargetConfig,
    /// Local directory relative paths in the config resolve against.
    pub project_root: PathBuf,
    /// Day used for venv alias names.
    pub today: NaiveDate,
}

impl TaskContext {
    pub fn new(
        config: PyshipConfig,
        target_name: String,
        target: TargetConfig,
        project_root: PathBuf,
    ) -> Self {
        Self {
            config,
            target_name,
            target,
            project_root,
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn service_user(&self) -> &str {
        &self.config.app.service_user
    }

    pub fn ssh_user(&self) -> &str {
        self.target.user.as_deref().unwrap_or("deploy")
    }

    pub fn program(&self) -> &str {
        &self.config.app.name
    }

    pub fn site_path(&self) -> String {
        self.config.site_path()
    }

    pub fn repo_path(&self) -> String {
        self.config.repo_path()
    }

    pub fn venv_dir(&self) -> String {
        self.config.venv_dir()
    }

    pub fn bin_path(&self, script: &str) -> String {
        format!("{}/bin/{}", self.site_path(), script)
    }

    pub fn local(&self, path: &Path) -> PathBuf {
        self.project_root.join(path)
    }

    /// Where a rendered file is staged locally before upload.
    pub fn rendered(&self, name: &str) -> PathBuf {
        self.local(&self.config.templates.output_dir)
            .join(&self.target_name)
            .join(name)
    }
}
