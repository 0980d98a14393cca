//! Benchmark orchestration across two hosts.
//!
//! Deploys the node binary to the remote side, starts the server role
//! there for each payload size, runs the matching client role locally, and
//! folds the parsed reports into one [`BenchReport`]. Remote state is
//! cleaned up best-effort at the end.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::cancel;
use crate::error::{Error, Result};
use crate::iface::Interface;
use crate::mtu;

use super::report::{BenchReport, LatencyResult, ThroughputResult};
use super::CommandExecutor;

/// Everything one orchestrated run needs to know.
#[derive(Debug, Clone)]
pub struct BenchPlan {
    pub local_iface: String,
    pub remote_iface: String,
    /// Auto-detected from the interface registry when empty.
    pub local_mac: String,
    /// Auto-detected over the executor when empty.
    pub remote_mac: String,
    pub payload_sizes: Vec<u32>,
    pub packets_per_test: u64,
    pub test_timeout: Duration,
    /// `(vlan_id, priority)` when tagging is requested.
    pub vlan: Option<(u16, u8)>,
    pub local_binary: PathBuf,
    pub remote_binary_path: String,
    pub remote_host_label: String,
    pub verbose: bool,
}

impl Default for BenchPlan {
    fn default() -> Self {
        Self {
            local_iface: String::new(),
            remote_iface: String::new(),
            local_mac: String::new(),
            remote_mac: String::new(),
            payload_sizes: vec![64, 128, 256, 512, 1024, 1400, 4096, 8192],
            packets_per_test: 10_000,
            test_timeout: Duration::from_secs(60),
            vlan: None,
            local_binary: PathBuf::new(),
            remote_binary_path: "/tmp/l2link_node".to_string(),
            remote_host_label: String::new(),
            verbose: false,
        }
    }
}

/// Settle time between starting the remote server and driving traffic.
const SERVER_SETTLE: Duration = Duration::from_millis(500);

/// Drives one benchmark run over a remote command executor.
pub struct Orchestrator<E: CommandExecutor> {
    plan: BenchPlan,
    executor: E,
}

impl<E: CommandExecutor> Orchestrator<E> {
    pub fn new(plan: BenchPlan, executor: E) -> Self {
        Self { plan, executor }
    }

    /// Run the full sequence: deploy, detect, measure, clean up.
    pub fn run(&mut self) -> Result<BenchReport> {
        let mut report = BenchReport {
            timestamp: unix_timestamp(),
            remote_host: self.plan.remote_host_label.clone(),
            local_interface: self.plan.local_iface.clone(),
            remote_interface: self.plan.remote_iface.clone(),
            local_host: local_hostname(),
            ..Default::default()
        };

        info!("deploying benchmark binary");
        self.deploy()?;

        info!("detecting mac addresses");
        self.detect_macs()?;
        report.local_mac = self.plan.local_mac.clone();
        report.remote_mac = self.plan.remote_mac.clone();

        let sizes = self.negotiated_sizes()?;
        info!(?sizes, "payload sizes after MTU negotiation");

        info!("running latency tests");
        for &size in &sizes {
            if !cancel::is_running() {
                break;
            }
            match self.run_latency_test(size) {
                Ok(result) => report.latency_results.push(result),
                Err(err) => warn!(size, error = %err, "latency test failed"),
            }
        }

        info!("running throughput tests");
        for &size in &sizes {
            if !cancel::is_running() {
                break;
            }
            match self.run_throughput_test(size) {
                Ok(result) => report.throughput_results.push(result),
                Err(err) => warn!(size, error = %err, "throughput test failed"),
            }
        }

        self.cleanup();
        Ok(report)
    }

    /// Upload the node binary with executable permissions and verify it
    /// landed.
    fn deploy(&mut self) -> Result<()> {
        let binary = std::fs::read(&self.plan.local_binary).map_err(|e| {
            Error::connection(format!(
                "local binary {} unreadable: {e}",
                self.plan.local_binary.display()
            ))
        })?;

        self.executor.upload(&binary, &self.plan.remote_binary_path, 0o755)?;

        let check = self
            .executor
            .execute(&format!("test -x '{}' && echo ok", self.plan.remote_binary_path))?;
        if !check.stdout.contains("ok") {
            return Err(Error::connection("deployed binary failed verification"));
        }
        debug!(path = %self.plan.remote_binary_path, bytes = binary.len(), "binary deployed");
        Ok(())
    }

    /// Fill in any MAC address the plan left empty.
    fn detect_macs(&mut self) -> Result<()> {
        if self.plan.local_mac.is_empty() {
            let iface = Interface::query(&self.plan.local_iface)?;
            self.plan.local_mac = iface.mac().to_string();
        }
        if self.plan.remote_mac.is_empty() {
            self.plan.remote_mac = self.executor.remote_mac(&self.plan.remote_iface)?;
        }
        debug!(local = %self.plan.local_mac, remote = %self.plan.remote_mac, "macs resolved");
        Ok(())
    }

    /// Negotiate the effective MTU and drop payload sizes that cannot
    /// cross it.
    fn negotiated_sizes(&mut self) -> Result<Vec<u32>> {
        let local_mtu = Interface::query(&self.plan.local_iface)?.mtu();
        let remote_mtu = self.executor.remote_mtu(&self.plan.remote_iface)?;
        let negotiated = mtu::negotiate(local_mtu, remote_mtu, self.plan.vlan.is_some());

        let before = self.plan.payload_sizes.len();
        let sizes: Vec<u32> = mtu::filter_sizes(
            self.plan.payload_sizes.iter().copied(),
            negotiated.effective_mtu,
            negotiated.has_vlan,
        )
        .collect();
        if sizes.len() < before {
            warn!(
                effective_mtu = negotiated.effective_mtu,
                dropped = before - sizes.len(),
                "payload sizes exceed the negotiated MTU"
            );
        }
        Ok(sizes)
    }

    fn run_latency_test(&mut self, payload_size: u32) -> Result<LatencyResult> {
        self.kill_remote();
        self.start_remote_server("echo", 30_000)?;

        let output = self.run_local_role("ping", payload_size)?;
        self.kill_remote();

        Ok(parse_latency_report(&output, payload_size))
    }

    fn run_throughput_test(&mut self, payload_size: u32) -> Result<ThroughputResult> {
        self.kill_remote();
        self.start_remote_server("sink", 5_000)?;

        let output = self.run_local_role("flood", payload_size)?;
        self.kill_remote();

        Ok(parse_throughput_report(&output, payload_size))
    }

    /// Start the remote role under nohup and give it time to come up.
    fn start_remote_server(&mut self, mode: &str, timeout_ms: u64) -> Result<()> {
        let command = format!(
            "nohup sudo {} {} {} --timeout {}{} --quiet > {} 2>&1 & echo $!",
            self.plan.remote_binary_path,
            mode,
            self.plan.remote_iface,
            timeout_ms,
            self.vlan_args(),
            self.server_log_path(),
        );
        if self.plan.verbose {
            info!(%command, "starting remote server");
        }
        self.executor.execute(&command)?;
        std::thread::sleep(SERVER_SETTLE);

        let pattern = self.process_pattern();
        let check = self.executor.execute(&format!("pgrep -f {pattern}"))?;
        if check.stdout.trim().is_empty() {
            let log = self
                .executor
                .execute(&format!("cat {} 2>/dev/null", self.server_log_path()))
                .map(|out| out.stdout)
                .unwrap_or_default();
            return Err(Error::connection(format!("remote {mode} failed to start: {log}")));
        }
        Ok(())
    }

    /// Run the local client role as a child process and capture its
    /// report.
    fn run_local_role(&self, mode: &str, payload_size: u32) -> Result<String> {
        let mut cmd = Command::new(&self.plan.local_binary);
        cmd.arg(mode)
            .arg(&self.plan.local_iface)
            .arg("--peer-mac")
            .arg(&self.plan.remote_mac)
            .arg("--payload-size")
            .arg(payload_size.to_string())
            .arg("--count")
            .arg(self.plan.packets_per_test.to_string())
            .arg("--quiet");
        if let Some((vlan_id, priority)) = self.plan.vlan {
            cmd.arg("--vlan")
                .arg(vlan_id.to_string())
                .arg("--priority")
                .arg(priority.to_string());
        }

        if self.plan.verbose {
            info!(?cmd, "running local role");
        }
        cmd.stdout(std::process::Stdio::piped()).stderr(std::process::Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::connection(format!("spawning local {mode}: {e}")))?;

        // bound the whole client run by the per-test timeout
        let deadline = std::time::Instant::now() + self.plan.test_timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if std::time::Instant::now() >= deadline => {
                    warn!(mode, "local role exceeded the test timeout, killing it");
                    let _ = child.kill();
                    break;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    let _ = child.kill();
                    return Err(Error::connection(format!("waiting for local {mode}: {e}")));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::connection(format!("collecting local {mode}: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() && stdout.is_empty() {
            return Err(Error::connection(format!(
                "local {mode} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(stdout)
    }

    fn kill_remote(&mut self) {
        let pattern = self.process_pattern();
        // best-effort: a stale server may simply not exist
        let _ = self
            .executor
            .execute(&format!("sudo pkill -9 -f {pattern} 2>/dev/null || true"));
        std::thread::sleep(Duration::from_millis(100));
    }

    /// Remove the deployed binary and the server log.
    fn cleanup(&mut self) {
        info!("cleaning up remote host");
        self.kill_remote();
        let binary = self.plan.remote_binary_path.clone();
        let log = self.server_log_path();
        let _ = self.executor.remove(&binary);
        let _ = self.executor.remove(&log);
    }

    fn vlan_args(&self) -> String {
        match self.plan.vlan {
            Some((vlan_id, priority)) => format!(" --vlan {vlan_id} --priority {priority}"),
            None => String::new(),
        }
    }

    fn server_log_path(&self) -> String {
        format!("{}.log", self.plan.remote_binary_path)
    }

    fn process_pattern(&self) -> String {
        std::path::Path::new(&self.plan.remote_binary_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.plan.remote_binary_path.clone())
    }
}

/// Parse a ping report. Tolerant: any missing field stays zero.
///
/// Accepts both the six-value `min/avg/max/p50/p95/p99` line this crate's
/// node prints and the older five-value form without p95 (there, p95 is
/// reported equal to p99).
pub fn parse_latency_report(output: &str, payload_size: u32) -> LatencyResult {
    let mut result = LatencyResult { payload_size: payload_size as u64, ..Default::default() };

    for line in output.lines() {
        if line.contains("packets transmitted") {
            let mut numbers = line
                .split(|c: char| !c.is_ascii_digit() && c != '.')
                .filter(|s| !s.is_empty());
            result.packets_sent = numbers.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            result.packets_received = numbers.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            if result.packets_sent > 0 {
                result.loss_percent = 100.0
                    * (result.packets_sent - result.packets_received) as f64
                    / result.packets_sent as f64;
            }
        } else if line.contains("rtt min/avg/max") {
            let values: Vec<f64> = line
                .split('=')
                .nth(1)
                .unwrap_or("")
                .trim()
                .trim_end_matches("us")
                .trim()
                .split('/')
                .filter_map(|v| v.trim().parse().ok())
                .collect();
            match values.as_slice() {
                [min, avg, max, p50, p95, p99] => {
                    result.min_us = *min;
                    result.avg_us = *avg;
                    result.max_us = *max;
                    result.p50_us = *p50;
                    result.p95_us = *p95;
                    result.p99_us = *p99;
                }
                [min, avg, max, p50, p99] => {
                    result.min_us = *min;
                    result.avg_us = *avg;
                    result.max_us = *max;
                    result.p50_us = *p50;
                    result.p95_us = *p99;
                    result.p99_us = *p99;
                }
                _ => {}
            }
        }
    }

    // no stddev in the report; estimate from the spread
    result.stddev_us = (result.max_us - result.min_us) / 4.0;
    result
}

/// Parse a flood report. Tolerant: any missing field stays zero.
pub fn parse_throughput_report(output: &str, payload_size: u32) -> ThroughputResult {
    let mut result = ThroughputResult { payload_size: payload_size as u64, ..Default::default() };

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("Packets sent:") {
            result.packets_sent = first_number(rest) as u64;
        } else if let Some(rest) = line.strip_prefix("Bytes sent:") {
            result.bytes_sent = first_number(rest) as u64;
        } else if let Some(rest) = line.strip_prefix("Duration:") {
            result.duration_ms = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("Average:") {
            let mut parts = rest.split(',');
            result.packets_per_sec = parts.next().map(first_number).unwrap_or(0.0);
            result.mbps = parts.next().map(first_number).unwrap_or(0.0);
        }
    }

    result.gbps = result.mbps / 1000.0;
    result
}

fn first_number(text: &str) -> f64 {
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default()
}

fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return String::new();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
