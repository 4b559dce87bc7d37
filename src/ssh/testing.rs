use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::exec::CommandFailed;
use super::Remote;

#[derive(Clone)]
enum Reply {
    Output(String),
    Fail,
    Drop,
}

/// In-memory host: records every command and answers from a script of
/// substring rules. The first matching rule wins; unmatched commands
/// succeed with empty output. Clones share the command log.
#[derive(Clone)]
pub struct ScriptedRemote {
    host: String,
    rules: Vec<(String, Reply)>,
    log: Arc<Mutex<Vec<String>>>,
    inputs: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl ScriptedRemote {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            rules: Vec::new(),
            log: Arc::default(),
            inputs: Arc::default(),
        }
    }

    pub fn reply(mut self, pattern: &str, output: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Output(output.to_string())));
        self
    }

    /// Matching commands exit non-zero.
    pub fn fail(mut self, pattern: &str) -> Self {
        self.rules.push((pattern.to_string(), Reply::Fail));
        self
    }

    /// Matching commands never complete: the connection is lost.
    pub fn drop_connection(mut self, pattern: &str) -> Self {
        self.rules.push((pattern.to_string(), Reply::Drop));
        self
    }

    /// Every command run so far. Commands fed stdin are logged as the
    /// command line, a newline, then the input.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    /// Exact stdin bytes of the first command containing `needle`.
    pub fn input_for(&self, needle: &str) -> Option<Vec<u8>> {
        self.inputs
            .lock()
            .unwrap()
            .iter()
            .find(|(cmd, _)| cmd.contains(needle))
            .map(|(_, input)| input.clone())
    }

    fn answer(&self, logged: String, cmd: &str) -> Option<&Reply> {
        self.log.lock().unwrap().push(logged);
        self.rules
            .iter()
            .find(|(pattern, _)| cmd.contains(pattern.as_str()))
            .map(|(_, reply)| reply)
    }

    fn respond(&self, cmd: &str, reply: Option<&Reply>) -> Result<String> {
        match reply {
            Some(Reply::Output(out)) => Ok(out.clone()),
            Some(Reply::Fail) => Err(CommandFailed {
                host: self.host.clone(),
                cmd: cmd.to_string(),
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: String::new(),
            }
            .into()),
            Some(Reply::Drop) => Err(anyhow!("Connection to {} closed", self.host)),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl Remote for ScriptedRemote {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, cmd: &str) -> Result<String> {
        let reply = self.answer(cmd.to_string(), cmd);
        self.respond(cmd, reply)
    }

    async fn exec_with_input(&self, cmd: &str, input: &[u8]) -> Result<String> {
        self.inputs
            .lock()
            .unwrap()
            .push((cmd.to_string(), input.to_vec()));
        let logged = format!("{}\n{}", cmd, String::from_utf8_lossy(input));
        let reply = self.answer(logged, cmd);
        self.respond(cmd, reply)
    }

    async fn exec_ok(&self, cmd: &str) -> Result<bool> {
        match self.answer(cmd.to_string(), cmd) {
            Some(Reply::Fail) => Ok(false),
            Some(Reply::Drop) => Err(anyhow!("Connection to {} closed", self.host)),
            _ => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn uploads_keep_exact_bytes() -> Result<()> {
        let remote = ScriptedRemote::new("web1");

        remote
            .sudo_write_file("/srv/site/x/secrets.py", "SECRET_KEY = 'x'")
            .await?;
        remote
            .sudo_write_file("/srv/site/notes", "a\nPYSHIP_EOF\nb\n")
            .await?;

        assert_eq!(
            remote.input_for("/srv/site/x/secrets.py").unwrap(),
            b"SECRET_KEY = 'x'"
        );
        assert_eq!(
            remote.input_for("/srv/site/notes").unwrap(),
            b"a\nPYSHIP_EOF\nb\n"
        );
        assert_eq!(
            remote.commands()[0],
            "sudo tee /srv/site/x/secrets.py > /dev/null\nSECRET_KEY = 'x'"
        );
        Ok(())
    }
}
