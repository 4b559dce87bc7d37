use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Target '{name}' not found in config (known: {known})")]
    UnknownTarget { name: String, known: String },
    #[error("{field}: {problem}")]
    Invalid { field: String, problem: &'static str },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PyshipConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Supervisor program name and Django project package.
    pub name: String,
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_service_user")]
    pub service_user: String,
    pub home: Option<String>,
    /// Defaults to `<home>/venvs`.
    pub venv_dir: Option<String>,
    /// Checkout directory under the site path. Defaults to the last
    /// segment of the repository URL.
    pub repo_dir: Option<String>,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_service_user() -> String {
    "scipy".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeployConfig {
    pub settings_path: Option<String>,
    #[serde(default = "default_secrets_source")]
    pub secrets_source: String,
    pub secrets_path: Option<String>,
    #[serde(default = "default_requirements")]
    pub requirements: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default)]
    pub parallel: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            secrets_source: default_secrets_source(),
            secrets_path: None,
            requirements: default_requirements(),
            static_dir: default_static_dir(),
            parallel: false,
        }
    }
}

fn default_secrets_source() -> String {
    "~/secrets.py".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

fn default_static_dir() -> String {
    "site_media".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TemplatesConfig {
    #[serde(default = "default_nginx_template")]
    pub nginx: PathBuf,
    #[serde(default = "default_supervisor_template")]
    pub supervisor: PathBuf,
    #[serde(default = "default_runserver_template")]
    pub runserver: PathBuf,
    #[serde(default = "default_mail_template")]
    pub mail: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            nginx: default_nginx_template(),
            supervisor: default_supervisor_template(),
            runserver: default_runserver_template(),
            mail: default_mail_template(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_nginx_template() -> PathBuf {
    PathBuf::from("deployment/nginx_conf_template")
}
fn default_supervisor_template() -> PathBuf {
    PathBuf::from("deployment/supervisor.conf")
}
fn default_runserver_template() -> PathBuf {
    PathBuf::from("deployment/runserver_template.sh")
}
fn default_mail_template() -> PathBuf {
    PathBuf::from("deployment/django_mail_template.sh")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".pyship")
}

fn default_packages() -> Vec<String> {
    [
        "python-software-properties",
        "python-dev",
        "build-essential",
        "nginx",
        "libxslt1-dev",
        "supervisor",
        "git",
        "tig",
        "vim",
        "multitail",
        "curl",
        "tmux",
        "htop",
        "ack-grep",
        "libmysqlclient-dev",
        "mysql-server",
        "mysql-client",
        "python-mysqldb",
        "libjpeg-dev",
        "libtiff-dev",
        "zlib1g-dev",
        "python-virtualenv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TargetConfig {
    /// nginx server_name.
    pub site: String,
    pub upstream: String,
    /// Name of the file under /etc/nginx/sites-available.
    pub available: String,
    pub cert_name: String,
    /// Local settings file uploaded into the checkout.
    pub local_settings: PathBuf,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HostConfig {
    /// `host` or `user@host`.
    pub address: String,
    pub user: Option<String>,
}

impl HostConfig {
    /// SSH login for this host: explicit `user`, then a `user@` prefix in
    /// the address, then `default_user`.
    pub fn login<'a>(&'a self, default_user: &'a str) -> (&'a str, &'a str) {
        let (prefix, host) = match self.address.split_once('@') {
            Some((u, h)) => (Some(u), h),
            None => (None, self.address.as_str()),
        };
        let user = self.user.as_deref().or(prefix).unwrap_or(default_user);
        (user, host)
    }
}

impl PyshipConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        content
            .parse()
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Select a deployment target by name.
    pub fn target(&self, name: &str) -> Result<&TargetConfig> {
        self.targets.get(name).ok_or_else(|| {
            ConfigError::UnknownTarget {
                name: name.to_string(),
                known: self.targets.keys().cloned().collect::<Vec<_>>().join(", "),
            }
            .into()
        })
    }

    pub fn home(&self) -> String {
        self.app
            .home
            .clone()
            .unwrap_or_else(|| format!("/home/{}", self.app.service_user))
    }

    pub fn site_path(&self) -> String {
        format!("{}/site", self.home())
    }

    pub fn venv_dir(&self) -> String {
        self.app
            .venv_dir
            .clone()
            .unwrap_or_else(|| format!("{}/venvs", self.home()))
    }

    pub fn repo_path(&self) -> String {
        format!("{}/{}", self.site_path(), self.repo_dir())
    }

    pub fn repo_dir(&self) -> String {
        if let Some(dir) = &self.app.repo_dir {
            return dir.clone();
        }
        let trimmed = self.app.repository.trim_end_matches('/');
        let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
        last.trim_end_matches(".git").to_string()
    }

    pub fn settings_path(&self) -> String {
        self.deploy
            .settings_path
            .clone()
            .unwrap_or_else(|| format!("{}/local_settings.py", self.app.name))
    }

    pub fn secrets_path(&self) -> String {
        self.deploy
            .secrets_path
            .clone()
            .unwrap_or_else(|| format!("{}/secrets.py", self.app.name))
    }

    pub fn default_ref(&self) -> String {
        format!("origin/{}", self.app.branch)
    }
}

impl std::str::FromStr for PyshipConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        validate::validate(&config)?;
        Ok(config)
    }
}
