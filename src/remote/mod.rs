//! Remote benchmark orchestration.
//!
//! The orchestrator drives an opaque remote command executor: anything that
//! can run a command, push bytes to a path, and remove a path. The bundled
//! implementation shells out to the system OpenSSH client; tests substitute
//! a scripted executor.

pub mod orchestrator;
pub mod report;
pub mod ssh;

pub use orchestrator::{BenchPlan, Orchestrator};
pub use report::{BenchReport, LatencyResult, ThroughputResult};
pub use ssh::{SshConfig, SshExecutor};

use crate::error::Result;

/// Output of one remote command.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The remote command executor capability the orchestrator consumes.
///
/// Dropping an executor disconnects it.
pub trait CommandExecutor {
    /// Run a command to completion, capturing output and exit code.
    fn execute(&mut self, command: &str) -> Result<ExecOutput>;

    /// Write `data` to `remote_path` with the given permission bits.
    fn upload(&mut self, data: &[u8], remote_path: &str, mode: u32) -> Result<()>;

    /// Remove a remote path. Best-effort cleanup helper.
    fn remove(&mut self, remote_path: &str) -> Result<()>;

    /// Read the hardware address of a remote interface from sysfs.
    fn remote_mac(&mut self, iface: &str) -> Result<String> {
        let out = self.execute(&format!("cat /sys/class/net/{iface}/address"))?;
        if !out.success() {
            return Err(crate::error::Error::InterfaceNotFound(iface.to_string()));
        }
        Ok(out.stdout.trim().to_string())
    }

    /// Read the MTU of a remote interface from sysfs.
    fn remote_mtu(&mut self, iface: &str) -> Result<u32> {
        let out = self.execute(&format!("cat /sys/class/net/{iface}/mtu"))?;
        out.stdout
            .trim()
            .parse()
            .map_err(|_| crate::error::Error::InterfaceNotFound(iface.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted executor: hands back canned outputs in order and records
    /// every call for assertions.
    #[derive(Debug, Default)]
    pub struct ScriptedExecutor {
        pub responses: VecDeque<ExecOutput>,
        pub commands: Vec<String>,
        pub uploads: Vec<(String, u32, usize)>,
        pub removed: Vec<String>,
    }

    impl ScriptedExecutor {
        pub fn respond(&mut self, stdout: &str) -> &mut Self {
            self.responses.push_back(ExecOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            });
            self
        }
    }

    impl CommandExecutor for ScriptedExecutor {
        fn execute(&mut self, command: &str) -> Result<ExecOutput> {
            self.commands.push(command.to_string());
            Ok(self.responses.pop_front().unwrap_or_default())
        }

        fn upload(&mut self, data: &[u8], remote_path: &str, mode: u32) -> Result<()> {
            self.uploads.push((remote_path.to_string(), mode, data.len()));
            Ok(())
        }

        fn remove(&mut self, remote_path: &str) -> Result<()> {
            self.removed.push(remote_path.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedExecutor;
    use super::*;

    #[test]
    fn test_remote_mac_trims_sysfs_output() {
        let mut exec = ScriptedExecutor::default();
        exec.respond("aa:bb:cc:dd:ee:ff\n");
        let mac = exec.remote_mac("eth0").unwrap();
        assert_eq!(mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(exec.commands, vec!["cat /sys/class/net/eth0/address"]);
    }

    #[test]
    fn test_remote_mtu_parses() {
        let mut exec = ScriptedExecutor::default();
        exec.respond("9000\n");
        assert_eq!(exec.remote_mtu("eth0").unwrap(), 9000);
    }

    #[test]
    fn test_remote_mac_failure() {
        let mut exec = ScriptedExecutor::default();
        exec.responses.push_back(ExecOutput {
            stdout: String::new(),
            stderr: "No such file".to_string(),
            exit_code: 1,
        });
        assert!(exec.remote_mac("nope0").is_err());
    }
}
