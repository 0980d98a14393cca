//! Benchmark node: the role binary deployed to both ends of a test.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use l2link::bench::{run_echo, run_flood, run_ping, run_sink, RoleConfig};
use l2link::iface::Interface;
use l2link::packet::Tci;
use l2link::MacAddress;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Receive frames and send them back (latency tests)
    Echo,
    /// Receive frames silently (throughput tests)
    Sink,
    /// Send frames and wait for the echo (latency measurement)
    Ping,
    /// Send frames as fast as possible (throughput measurement)
    Flood,
}

#[derive(Parser)]
#[command(name = "l2link-node")]
#[command(about = "Layer-2 benchmark node (echo/sink/ping/flood)")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Benchmark role
    #[arg(value_enum)]
    mode: Mode,

    /// Network interface to use
    interface: String,

    /// Peer MAC address (required for client modes)
    #[arg(long)]
    peer_mac: Option<String>,

    /// Payload size in bytes
    #[arg(long, default_value_t = 64)]
    payload_size: usize,

    /// Number of packets to send (0 = infinite)
    #[arg(long, default_value_t = 1000)]
    count: u64,

    /// Microseconds between sends (default 0 for flood, 1000 for ping)
    #[arg(long)]
    interval: Option<u64>,

    /// Receive timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout: u64,

    /// Tag frames with this VLAN id
    #[arg(long)]
    vlan: Option<u16>,

    /// VLAN priority 0-7
    #[arg(long, default_value_t = 0)]
    priority: u8,

    /// Suppress per-packet output
    #[arg(long)]
    quiet: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    std::process::exit(match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            1
        }
    });
}

fn run() -> Result<i32> {
    // argument errors exit 1, like every other failure here
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        use clap::error::ErrorKind;
        let code = match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        };
        let _ = err.print();
        std::process::exit(code);
    });

    let fallback = if cli.verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).without_time())
        .try_init()
        .ok();

    if cli.payload_size == 0 {
        bail!("payload size must be at least 1");
    }

    let peer_mac = match &cli.peer_mac {
        Some(text) => text
            .parse::<MacAddress>()
            .map_err(|_| anyhow::anyhow!("invalid MAC address: {text}"))?,
        None => MacAddress::NULL,
    };

    let vlan = match cli.vlan {
        Some(vlan_id) => {
            let tci = Tci::new(cli.priority, false, vlan_id);
            if !tci.is_valid() {
                bail!("invalid VLAN settings: id {} priority {}", vlan_id, cli.priority);
            }
            Some(tci)
        }
        None => None,
    };

    let interval_us = cli.interval.unwrap_or(match cli.mode {
        Mode::Ping => 1000,
        _ => 0,
    });

    let cfg = RoleConfig {
        peer_mac,
        payload_size: cli.payload_size,
        count: cli.count,
        interval: Duration::from_micros(interval_us),
        timeout: Duration::from_millis(cli.timeout),
        vlan,
        quiet: cli.quiet,
    };

    l2link::cancel::install();

    let iface = Interface::query(&cli.interface)
        .map_err(|_| anyhow::anyhow!("interface '{}' not found", cli.interface))?;
    if !iface.is_up() {
        bail!("interface '{}' is not up", cli.interface);
    }

    let code = match cli.mode {
        Mode::Echo => {
            run_echo(&iface, &cfg)?;
            0
        }
        Mode::Sink => {
            run_sink(&iface, &cfg)?;
            0
        }
        Mode::Ping => {
            let summary = run_ping(&iface, &cfg)?;
            // zero responses is a failed measurement
            if summary.received > 0 {
                0
            } else {
                1
            }
        }
        Mode::Flood => {
            run_flood(&iface, &cfg)?;
            0
        }
    };

    Ok(code)
}
