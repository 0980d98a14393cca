//! Benchmark roles: echo and sink servers, ping and flood clients.
//!
//! The textual reports these loops print are part of the wire contract:
//! the orchestrator captures and parses them, so the formats stay stable.
//! Per-frame errors are counted, never printed, to keep the hot loops
//! clean; every loop polls the process-wide running flag each iteration
//! and bounds blocking receives so cancellation latency stays capped.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel;
use crate::error::{Error, Result};
use crate::iface::Interface;
use crate::net::{EtherFilter, RawSocket};
use crate::packet::{FrameParser, ETHERTYPE_BENCH};

use super::stats::{Counters, LatencySummary, RateReporter, ThroughputSummary};
use super::{
    build_bench_frame, read_seq, send_with_retry, write_seq, MsgType, RoleConfig, SEND_BACKOFF,
    SEND_RETRIES,
};

const RECV_BUFFER_LEN: usize = 65536;

/// Echo server: reflect every ping back at its sender with the type byte
/// flipped to pong. Runs until interrupted.
pub fn run_echo(iface: &Interface, cfg: &RoleConfig) -> Result<Counters> {
    println!("Echo server starting on {} (MAC: {})", iface.name(), iface.mac());
    if let Some(tci) = cfg.vlan {
        println!("  VLAN ID: {}, Priority: {}", tci.vlan_id, tci.priority);
    }
    println!("  Timeout: {} ms", cfg.timeout.as_millis());
    println!("Waiting for packets...\n");

    let sock = RawSocket::open_bound(iface, EtherFilter::All)?;
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let mut counters = Counters::default();
    let started = Instant::now();

    while cancel::is_running() {
        let received = match sock.receive_with_timeout(&mut buf, cfg.timeout) {
            Ok(n) => n,
            Err(Error::Timeout) => continue,
            Err(err) => {
                debug!(error = %err, "echo receive error");
                continue;
            }
        };

        let parser = FrameParser::new(&buf[..received]);
        if !parser.is_valid() || parser.ethertype() != ETHERTYPE_BENCH {
            continue;
        }
        let payload = parser.payload();
        if payload.first() != Some(&(MsgType::Ping as u8)) {
            continue;
        }

        counters.packets_received += 1;
        counters.bytes_received += received as u64;

        // swap src/dest, flip ping to pong
        let mut response = payload.to_vec();
        response[0] = MsgType::Pong as u8;
        let frame = match build_bench_frame(parser.src_mac(), iface.mac(), &response, cfg.vlan) {
            Ok(frame) => frame,
            Err(_) => continue,
        };

        if let Ok(sent) = sock.send_raw(&frame, iface) {
            counters.packets_sent += 1;
            counters.bytes_sent += sent as u64;
            if !cfg.quiet {
                println!("Echo: {} bytes from {}", payload.len(), parser.src_mac());
            }
        }
    }

    let elapsed = started.elapsed();
    println!("\n--- Echo Server Statistics ---");
    println!("Packets: {} received, {} sent", counters.packets_received, counters.packets_sent);
    println!("Bytes: {} received, {} sent", counters.bytes_received, counters.bytes_sent);
    println!("Duration: {} ms", elapsed.as_millis());

    Ok(counters)
}

/// Sink server: count benchmark frames silently, reporting the interval
/// rate about once a second. Runs until interrupted.
pub fn run_sink(iface: &Interface, cfg: &RoleConfig) -> Result<ThroughputSummary> {
    println!("Sink server starting on {} (MAC: {})", iface.name(), iface.mac());
    if let Some(tci) = cfg.vlan {
        println!("  VLAN ID: {}, Priority: {}", tci.vlan_id, tci.priority);
    }
    println!("Waiting for packets...\n");

    let sock = RawSocket::open_bound(iface, EtherFilter::All)?;
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let mut counters = Counters::default();
    let mut reporter = RateReporter::new();
    let started = Instant::now();

    while cancel::is_running() {
        let received = match sock.receive_with_timeout(&mut buf, cfg.timeout) {
            Ok(n) => n,
            Err(Error::Timeout) => {
                if let Some((pps, mbps)) =
                    reporter.tick(counters.packets_received, counters.bytes_received)
                {
                    println!("Rate: {pps} pps, {mbps} Mbps");
                }
                continue;
            }
            Err(_) => continue,
        };

        let parser = FrameParser::new(&buf[..received]);
        if !parser.is_valid() || parser.ethertype() != ETHERTYPE_BENCH {
            continue;
        }

        counters.packets_received += 1;
        counters.bytes_received += received as u64;

        if let Some((pps, mbps)) = reporter.tick(counters.packets_received, counters.bytes_received)
        {
            println!("Rate: {pps} pps, {mbps} Mbps");
        }
    }

    let elapsed = started.elapsed();
    let summary =
        ThroughputSummary::compute(counters.packets_received, counters.bytes_received, elapsed);

    println!("\n--- Sink Server Statistics ---");
    println!("Packets received: {}", counters.packets_received);
    println!("Bytes received: {}", counters.bytes_received);
    println!("Duration: {} ms", elapsed.as_millis());
    if !elapsed.is_zero() {
        println!("Average: {:.0} pps, {:.0} Mbps", summary.packets_per_sec, summary.mbps);
    }

    Ok(summary)
}

/// Ping client: stamp, send, wait for the matching pong, record the
/// round trip. Early pongs with stale sequence numbers are discarded and
/// the wait continues until the per-iteration deadline.
pub fn run_ping(iface: &Interface, cfg: &RoleConfig) -> Result<LatencySummary> {
    if cfg.peer_mac.is_null() {
        return Err(Error::InvalidMacAddress("peer MAC required for ping".to_string()));
    }

    println!("Ping client starting on {} (MAC: {})", iface.name(), iface.mac());
    println!("  Target: {}", cfg.peer_mac);
    println!("  Payload size: {} bytes", cfg.payload_size);
    print_count(cfg.count);
    println!("  Interval: {} us", cfg.interval.as_micros());
    if let Some(tci) = cfg.vlan {
        println!("  VLAN ID: {}, Priority: {}", tci.vlan_id, tci.priority);
    }
    println!();

    let sock = RawSocket::open_bound(iface, EtherFilter::All)?;

    let mut payload = vec![0u8; cfg.payload_size.max(1)];
    payload[0] = MsgType::Ping as u8;

    let mut recv_buf = vec![0u8; RECV_BUFFER_LEN];
    let mut latencies: Vec<Duration> = Vec::with_capacity(if cfg.count > 0 {
        cfg.count as usize
    } else {
        10_000
    });
    let mut sent_count: u64 = 0;
    let mut seq: u64 = 0;

    while cancel::is_running() && (cfg.count == 0 || seq < cfg.count) {
        write_seq(&mut payload, seq);
        let frame = build_bench_frame(cfg.peer_mac, iface.mac(), &payload, cfg.vlan)?;

        let send_time = Instant::now();
        if let Err(err) = send_with_retry(&sock, &frame, iface, SEND_RETRIES, SEND_BACKOFF) {
            warn!(error = %err, seq, "ping send failed");
            seq += 1;
            continue;
        }
        sent_count += 1;

        let deadline = send_time + cfg.timeout;
        let mut matched = None;

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            let received = match sock.receive_with_timeout(&mut recv_buf, remaining) {
                Ok(n) => n,
                Err(Error::Timeout) => break,
                Err(_) => continue,
            };
            let recv_time = Instant::now();

            let parser = FrameParser::new(&recv_buf[..received]);
            if !parser.is_valid() || parser.ethertype() != ETHERTYPE_BENCH {
                continue;
            }
            let resp = parser.payload();
            if resp.first() != Some(&(MsgType::Pong as u8)) {
                continue;
            }
            // a pong for an earlier probe: keep waiting for ours
            if let Some(resp_seq) = read_seq(resp) {
                if resp_seq != seq {
                    continue;
                }
            }

            matched = Some((recv_time - send_time, resp.len(), parser.src_mac()));
            break;
        }

        match matched {
            Some((latency, resp_len, responder)) => {
                latencies.push(latency);
                if !cfg.quiet {
                    println!(
                        "{} bytes from {}: seq={} time={} us",
                        resp_len,
                        responder,
                        seq,
                        latency.as_micros()
                    );
                }
            }
            None => {
                if !cfg.quiet {
                    println!("Request timeout for seq={seq}");
                }
            }
        }

        seq += 1;
        if !cfg.interval.is_zero() && cancel::is_running() {
            std::thread::sleep(cfg.interval);
        }
    }

    let summary = LatencySummary::compute(sent_count, latencies);

    println!("\n--- Ping Statistics ---");
    println!(
        "{} packets transmitted, {} received, {:.1}% packet loss",
        summary.sent, summary.received, summary.loss_percent
    );
    if summary.received > 0 {
        println!(
            "rtt min/avg/max/p50/p95/p99 = {:.0}/{:.0}/{:.0}/{:.0}/{:.0}/{:.0} us",
            summary.min_us,
            summary.avg_us,
            summary.max_us,
            summary.p50_us,
            summary.p95_us,
            summary.p99_us
        );
    }

    Ok(summary)
}

/// Flood client: pre-build one frame and emit it flat out until the count
/// is reached or the process is interrupted.
pub fn run_flood(iface: &Interface, cfg: &RoleConfig) -> Result<ThroughputSummary> {
    if cfg.peer_mac.is_null() {
        return Err(Error::InvalidMacAddress("peer MAC required for flood".to_string()));
    }

    println!("Flood client starting on {} (MAC: {})", iface.name(), iface.mac());
    println!("  Target: {}", cfg.peer_mac);
    println!("  Payload size: {} bytes", cfg.payload_size);
    print_count(cfg.count);
    if let Some(tci) = cfg.vlan {
        println!("  VLAN ID: {}, Priority: {}", tci.vlan_id, tci.priority);
    }
    println!();

    let sock = RawSocket::open_bound(iface, EtherFilter::All)?;

    let mut payload = vec![0x42u8; cfg.payload_size.max(1)];
    payload[0] = MsgType::Data as u8;
    let frame = build_bench_frame(cfg.peer_mac, iface.mac(), &payload, cfg.vlan)?;

    let mut counters = Counters::default();
    let mut reporter = RateReporter::new();
    let started = Instant::now();

    while cancel::is_running() && (cfg.count == 0 || counters.packets_sent < cfg.count) {
        if let Ok(sent) = send_with_retry(&sock, &frame, iface, SEND_RETRIES, SEND_BACKOFF) {
            counters.packets_sent += 1;
            counters.bytes_sent += sent as u64;
        }

        if counters.packets_sent % 10_000 == 0 {
            if let Some((pps, mbps)) = reporter.tick(counters.packets_sent, counters.bytes_sent) {
                println!("Sent {} packets ({mbps} Mbps, {pps} pps)", counters.packets_sent);
            }
        }

        if !cfg.interval.is_zero() {
            std::thread::sleep(cfg.interval);
        }
    }

    let elapsed = started.elapsed();
    let summary = ThroughputSummary::compute(counters.packets_sent, counters.bytes_sent, elapsed);

    println!("\n--- Flood Statistics ---");
    println!("Packets sent: {}", counters.packets_sent);
    println!("Bytes sent: {}", counters.bytes_sent);
    println!("Duration: {} ms", elapsed.as_millis());
    if !elapsed.is_zero() {
        println!("Average: {:.0} pps, {:.0} Mbps", summary.packets_per_sec, summary.mbps);
    }

    Ok(summary)
}

fn print_count(count: u64) {
    if count == 0 {
        println!("  Count: infinite");
    } else {
        println!("  Count: {count}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::MacAddress;

    #[test]
    fn test_client_roles_require_peer_mac() {
        let iface = crate::iface::loopback().unwrap();
        let cfg = RoleConfig::default();
        assert!(matches!(run_ping(&iface, &cfg), Err(Error::InvalidMacAddress(_))));
        assert!(matches!(run_flood(&iface, &cfg), Err(Error::InvalidMacAddress(_))));
    }

    #[test]
    #[ignore] // requires CAP_NET_RAW
    fn test_ping_against_local_echo() {
        use std::thread;

        crate::cancel::reset();
        let iface = crate::iface::loopback().unwrap();

        let echo_iface = iface.clone();
        let echo = thread::spawn(move || {
            let cfg = RoleConfig {
                quiet: true,
                timeout: Duration::from_millis(200),
                ..Default::default()
            };
            run_echo(&echo_iface, &cfg)
        });

        thread::sleep(Duration::from_millis(200));
        let cfg = RoleConfig {
            peer_mac: MacAddress::new(0, 0, 0, 0, 0, 1),
            payload_size: 64,
            count: 10,
            timeout: Duration::from_millis(500),
            quiet: true,
            ..Default::default()
        };
        let summary = run_ping(&iface, &cfg).unwrap();
        assert_eq!(summary.sent, 10);
        assert!(summary.received > 0);

        crate::cancel::shutdown();
        echo.join().unwrap().unwrap();
        crate::cancel::reset();
    }
}
