use anyhow::{Context, Result};
use async_trait::async_trait;
use openssh::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Remote, SshSession};

/// A remote command exited non-zero.
#[derive(Debug, Error)]
#[error("Command failed on {host} (exit {status}): {cmd}\nstdout: {stdout}\nstderr: {stderr}")]
pub struct CommandFailed {
    pub host: String,
    pub cmd: String,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// Single-quote `s` for a POSIX shell.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

impl SshSession {
    fn checked(&self, cmd: &str, output: std::process::Output) -> Result<String> {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommandFailed {
                host: self.host.clone(),
                cmd: cmd.to_string(),
                status: output.status.to_string(),
                stdout: stdout.trim().to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(stdout)
    }
}

#[async_trait]
impl Remote for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, cmd: &str) -> Result<String> {
        debug!("[{}] exec: {}", self.host, cmd);

        let output = self
            .session
            .command("bash")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .with_context(|| format!("Failed to execute command on {}: {}", self.host, cmd))?;

        self.checked(cmd, output)
    }

    async fn exec_with_input(&self, cmd: &str, input: &[u8]) -> Result<String> {
        debug!("[{}] exec ({} bytes on stdin): {}", self.host, input.len(), cmd);

        let mut child = self
            .session
            .command("bash")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .await
            .with_context(|| format!("Failed to start command on {}: {}", self.host, cmd))?;

        if let Some(mut stdin) = child.stdin().take() {
            stdin
                .write_all(input)
                .await
                .with_context(|| format!("Failed to stream input to {}", self.host))?;
            stdin.shutdown().await?;
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to execute command on {}: {}", self.host, cmd))?;

        self.checked(cmd, output)
    }

    async fn exec_ok(&self, cmd: &str) -> Result<bool> {
        debug!("[{}] exec_ok: {}", self.host, cmd);

        let output = self
            .session
            .command("bash")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .with_context(|| format!("Failed to execute command on {}: {}", self.host, cmd))?;

        Ok(output.status.success())
    }
}
