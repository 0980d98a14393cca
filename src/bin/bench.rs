//! Benchmark orchestrator: deploys the node binary to a remote host over
//! SSH and measures latency and throughput between the two machines.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use l2link::remote::{BenchPlan, Orchestrator, SshConfig, SshExecutor};

#[derive(Parser)]
#[command(name = "l2link-bench")]
#[command(about = "Remote Layer-2 benchmark orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Remote host to benchmark against
    #[arg(long)]
    remote_host: String,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    ssh_port: u16,

    /// SSH username
    #[arg(long)]
    ssh_user: String,

    /// SSH password (requires sshpass; prefer --ssh-key)
    #[arg(long)]
    ssh_pass: Option<String>,

    /// SSH private key path
    #[arg(long)]
    ssh_key: Option<PathBuf>,

    /// Local network interface
    #[arg(long)]
    local_iface: String,

    /// Remote network interface
    #[arg(long)]
    remote_iface: String,

    /// Local MAC address (auto-detected if omitted)
    #[arg(long)]
    local_mac: Option<String>,

    /// Remote MAC address (auto-detected if omitted)
    #[arg(long)]
    remote_mac: Option<String>,

    /// Path to the locally built node binary to deploy
    #[arg(long)]
    binary: PathBuf,

    /// Comma-separated payload sizes in bytes
    #[arg(long, value_delimiter = ',')]
    payload_sizes: Option<Vec<u32>>,

    /// Packets per test
    #[arg(long, default_value_t = 10_000)]
    packets: u64,

    /// Per-test timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Tag traffic with this VLAN id
    #[arg(long)]
    vlan: Option<u16>,

    /// VLAN priority 0-7
    #[arg(long, default_value_t = 0)]
    priority: u8,

    /// Output file stem; writes <stem>.json and two CSV files
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).without_time())
        .try_init()
        .ok();

    if cli.ssh_pass.is_none() && cli.ssh_key.is_none() {
        bail!("one of --ssh-pass or --ssh-key is required");
    }

    l2link::cancel::install();

    let ssh_config = SshConfig {
        host: cli.remote_host.clone(),
        port: cli.ssh_port,
        user: cli.ssh_user.clone(),
        password: cli.ssh_pass.clone(),
        key_path: cli.ssh_key.clone(),
        connect_timeout: Duration::from_secs(30),
    };

    let executor = SshExecutor::connect(ssh_config)
        .with_context(|| format!("connecting to {}", cli.remote_host))?;

    let mut plan = BenchPlan {
        local_iface: cli.local_iface,
        remote_iface: cli.remote_iface,
        local_mac: cli.local_mac.unwrap_or_default(),
        remote_mac: cli.remote_mac.unwrap_or_default(),
        packets_per_test: cli.packets,
        test_timeout: Duration::from_secs(cli.timeout),
        vlan: cli.vlan.map(|vlan_id| (vlan_id, cli.priority)),
        local_binary: cli.binary,
        remote_host_label: cli.remote_host,
        verbose: cli.verbose,
        ..Default::default()
    };
    if let Some(sizes) = cli.payload_sizes {
        plan.payload_sizes = sizes;
    }

    let mut orchestrator = Orchestrator::new(plan, executor);
    let report = orchestrator.run().context("benchmark run failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_table();
    }

    if let Some(stem) = cli.output {
        let json_path = stem.with_extension("json");
        let latency_path = stem.with_extension("latency.csv");
        let throughput_path = stem.with_extension("throughput.csv");

        report.write_json(&json_path).context("writing json report")?;
        report.write_latency_csv(&latency_path).context("writing latency csv")?;
        report.write_throughput_csv(&throughput_path).context("writing throughput csv")?;
        println!(
            "\nResults written to {}, {}, {}",
            json_path.display(),
            latency_path.display(),
            throughput_path.display()
        );
    }

    Ok(())
}
