//! OpenSSH-client-backed command executor.
//!
//! Drives the system `ssh`/`scp` binaries through `std::process`. Key
//! authentication runs in batch mode so a missing key fails fast instead of
//! prompting; password authentication requires `sshpass` on the local host.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::{CommandExecutor, ExecOutput};

/// Connection settings for the OpenSSH executor.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: String::new(),
            password: None,
            key_path: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Executor over the system OpenSSH client.
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    /// Verify connectivity with a no-op command, then hand back the
    /// executor.
    pub fn connect(config: SshConfig) -> Result<SshExecutor> {
        let mut executor = SshExecutor { config };
        let probe = executor.execute("true")?;
        if !probe.success() {
            return Err(Error::connection(format!(
                "ssh probe failed ({}): {}",
                probe.exit_code,
                probe.stderr.trim()
            )));
        }
        debug!(host = %executor.config.host, "ssh executor connected");
        Ok(executor)
    }

    fn base_command(&self, program: &str) -> Command {
        let mut cmd = match &self.config.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-p").arg(password).arg(program);
                cmd
            }
            None => Command::new(program),
        };

        cmd.arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.connect_timeout.as_secs()));
        if self.config.password.is_none() {
            cmd.arg("-o").arg("BatchMode=yes");
        }
        if let Some(key) = &self.config.key_path {
            cmd.arg("-i").arg(key);
        }
        cmd
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.config.user, self.config.host)
    }
}

impl CommandExecutor for SshExecutor {
    fn execute(&mut self, command: &str) -> Result<ExecOutput> {
        trace!(command, "ssh execute");
        let output = self
            .base_command("ssh")
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(self.destination())
            .arg(command)
            .output()
            .map_err(|e| Error::connection(format!("spawning ssh: {e}")))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    fn upload(&mut self, data: &[u8], remote_path: &str, mode: u32) -> Result<()> {
        // stream through ssh so the bytes never touch the local disk
        let mut child = self
            .base_command("ssh")
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(self.destination())
            .arg(format!("cat > '{remote_path}' && chmod {mode:o} '{remote_path}'"))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::connection(format!("spawning ssh upload: {e}")))?;

        child
            .stdin
            .take()
            .ok_or_else(|| Error::connection("ssh upload stdin unavailable"))?
            .write_all(data)
            .map_err(|e| Error::connection(format!("ssh upload write: {e}")))?;

        let status = child
            .wait_with_output()
            .map_err(|e| Error::connection(format!("ssh upload: {e}")))?;
        if !status.status.success() {
            return Err(Error::connection(format!(
                "upload to {remote_path} failed: {}",
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }
        debug!(remote_path, bytes = data.len(), "uploaded");
        Ok(())
    }

    fn remove(&mut self, remote_path: &str) -> Result<()> {
        let out = self.execute(&format!("rm -f '{remote_path}'"))?;
        if !out.success() {
            return Err(Error::connection(format!("remove {remote_path} failed")));
        }
        Ok(())
    }
}
