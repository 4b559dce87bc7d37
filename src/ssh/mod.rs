pub mod exec;
#[cfg(test)]
pub mod testing;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder};
use tracing::debug;

pub use exec::quote;

/// A host that runs shell command strings and reports success or failure.
///
/// Implementors provide `exec`, `exec_with_input` and `exec_ok`; privilege
/// switching, uploads and listings are composed from those as plain
/// command strings.
#[async_trait]
pub trait Remote: Send + Sync {
    fn host(&self) -> &str;

    /// Run `cmd` unprivileged and return stdout. Non-zero exit is an error.
    async fn exec(&self, cmd: &str) -> Result<String>;

    /// Run `cmd` with `input` as its stdin, byte for byte.
    async fn exec_with_input(&self, cmd: &str, input: &[u8]) -> Result<String>;

    /// Run `cmd`, returning Ok(true) on exit 0 and Ok(false) otherwise.
    async fn exec_ok(&self, cmd: &str) -> Result<bool>;

    /// Run `cmd` as root.
    async fn run_privileged(&self, cmd: &str) -> Result<String> {
        self.exec(&format!("sudo bash -c {}", quote(cmd))).await
    }

    /// Run `cmd` as `user` with that user's HOME.
    async fn run_as(&self, user: &str, cmd: &str) -> Result<String> {
        self.exec(&format!("sudo -u {} -H bash -c {}", user, quote(cmd)))
            .await
    }

    async fn path_exists(&self, path: &str) -> Result<bool> {
        self.exec_ok(&format!("test -e {}", path)).await
    }

    /// Names in `dir`, one per entry. A missing directory is an error.
    async fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
        let out = self.exec(&format!("ls -1 {}", dir)).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Write `content` to `path` as root. The file holds exactly the bytes
    /// of `content`.
    async fn sudo_write_file(&self, path: &str, content: &str) -> Result<()> {
        self.exec_with_input(&format!("sudo tee {} > /dev/null", path), content.as_bytes())
            .await?;
        Ok(())
    }
}

pub struct SshSession {
    session: Session,
    host: String,
}

impl SshSession {
    pub async fn connect(
        user: &str,
        host: &str,
        port: Option<u16>,
        identity_file: Option<&Path>,
    ) -> Result<Self> {
        debug!("Connecting to {}@{}", user, host);

        let mut builder = SessionBuilder::default();
        builder.known_hosts_check(KnownHosts::Accept);
        builder.user(user.to_string());

        if let Some(port) = port {
            builder.port(port);
        }

        if let Some(key) = identity_file {
            builder.keyfile(key);
        }

        let session = builder
            .connect(host)
            .await
            .with_context(|| format!("Failed to connect to {}@{}", user, host))?;

        Ok(Self {
            session,
            host: host.to_string(),
        })
    }

    pub async fn close(self) -> Result<()> {
        self.session
            .close()
            .await
            .with_context(|| format!("Failed to close SSH session to {}", self.host))?;
        Ok(())
    }
}
