//! Benchmark engine: message envelope, role configuration, send retry.
//!
//! Benchmark traffic rides ethertype 0xBEEF. The payload's first octet
//! names the sub-message; ping/pong payloads of at least nine octets carry
//! a little-endian 64-bit sequence number in bytes 1..9.

pub mod roles;
pub mod stats;

pub use roles::{run_echo, run_flood, run_ping, run_sink};
pub use stats::{Counters, LatencySummary, RateReporter, ThroughputSummary};

use std::time::Duration;

use crate::error::Result;
use crate::iface::Interface;
use crate::mac::MacAddress;
use crate::net::RawSocket;
use crate::packet::{build_frame, build_vlan_frame, Tci, ETHERTYPE_BENCH};

/// Benchmark message types, one octet at payload offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Latency test request
    Ping = 0x01,
    /// Latency test response
    Pong = 0x02,
    /// Throughput data
    Data = 0x03,
    /// Throughput ack
    Ack = 0x04,
    /// Start signal
    Start = 0x10,
    /// Stop signal
    Stop = 0x11,
    /// Ready signal
    Ready = 0x12,
    /// Stats request
    Stats = 0x20,
    /// Stats response
    StatsResp = 0x21,
}

impl MsgType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Ping),
            0x02 => Some(Self::Pong),
            0x03 => Some(Self::Data),
            0x04 => Some(Self::Ack),
            0x10 => Some(Self::Start),
            0x11 => Some(Self::Stop),
            0x12 => Some(Self::Ready),
            0x20 => Some(Self::Stats),
            0x21 => Some(Self::StatsResp),
            _ => None,
        }
    }
}

/// Embed a sequence number in payload bytes 1..9 when capacity allows;
/// shorter payloads carry the type byte only.
pub fn write_seq(payload: &mut [u8], seq: u64) {
    if payload.len() >= 9 {
        payload[1..9].copy_from_slice(&seq.to_le_bytes());
    }
}

/// Read the sequence number back out, if the payload carries one.
pub fn read_seq(payload: &[u8]) -> Option<u64> {
    if payload.len() >= 9 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&payload[1..9]);
        Some(u64::from_le_bytes(bytes))
    } else {
        None
    }
}

/// Configuration of one benchmark role.
#[derive(Debug, Clone)]
pub struct RoleConfig {
    /// Required by the client roles; servers learn peers from traffic.
    pub peer_mac: MacAddress,
    pub payload_size: usize,
    /// 0 means run until interrupted.
    pub count: u64,
    /// Pause between sends.
    pub interval: Duration,
    /// Receive timeout, also the cancellation latency bound.
    pub timeout: Duration,
    /// Tag frames when set.
    pub vlan: Option<Tci>,
    /// Suppress per-packet output.
    pub quiet: bool,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            peer_mac: MacAddress::NULL,
            payload_size: 64,
            count: 1000,
            interval: Duration::ZERO,
            timeout: Duration::from_millis(1000),
            vlan: None,
            quiet: false,
        }
    }
}

/// Build one benchmark frame, tagged or not per the config.
pub fn build_bench_frame(
    dst: MacAddress,
    src: MacAddress,
    payload: &[u8],
    vlan: Option<Tci>,
) -> Result<Vec<u8>> {
    match vlan {
        Some(tci) => build_vlan_frame(dst, src, tci, ETHERTYPE_BENCH, payload),
        None => Ok(build_frame(dst, src, ETHERTYPE_BENCH, payload)),
    }
}

/// Bounded send retry for flood-style callers.
///
/// Only transient conditions (full send queue, interrupted call) are
/// retried; a permanent failure propagates immediately with its OS error
/// attached.
pub fn send_with_retry(
    sock: &RawSocket,
    frame: &[u8],
    iface: &Interface,
    max_retries: u32,
    backoff: Duration,
) -> Result<usize> {
    for _ in 0..max_retries {
        match sock.send_raw(frame, iface) {
            Ok(sent) => return Ok(sent),
            Err(err) if err.is_transient_send() => std::thread::sleep(backoff),
            Err(err) => return Err(err),
        }
    }
    // out of budget: report whatever the final attempt says
    sock.send_raw(frame, iface)
}

/// Default retry budget used by the client roles.
pub const SEND_RETRIES: u32 = 200;

/// Default backoff between retries.
pub const SEND_BACKOFF: Duration = Duration::from_micros(10);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FrameParser;

    #[test]
    fn test_msg_type_roundtrip() {
        for msg in [
            MsgType::Ping,
            MsgType::Pong,
            MsgType::Data,
            MsgType::Ack,
            MsgType::Start,
            MsgType::Stop,
            MsgType::Ready,
            MsgType::Stats,
            MsgType::StatsResp,
        ] {
            assert_eq!(MsgType::from_u8(msg as u8), Some(msg));
        }
        assert_eq!(MsgType::from_u8(0x7F), None);
    }

    #[test]
    fn test_seq_roundtrip() {
        let mut payload = vec![0u8; 64];
        payload[0] = MsgType::Ping as u8;
        write_seq(&mut payload, 0xDEAD_BEEF_0042);
        assert_eq!(read_seq(&payload), Some(0xDEAD_BEEF_0042));
    }

    #[test]
    fn test_seq_needs_nine_bytes() {
        let mut payload = vec![0u8; 8];
        write_seq(&mut payload, 7);
        assert!(payload[1..].iter().all(|&b| b == 0));
        assert_eq!(read_seq(&payload), None);
    }

    #[test]
    fn test_bench_frame_untagged() {
        let frame = build_bench_frame(
            MacAddress::BROADCAST,
            MacAddress::NULL,
            &[MsgType::Ping as u8],
            None,
        )
        .unwrap();
        let parser = FrameParser::new(&frame);
        assert_eq!(parser.ethertype(), ETHERTYPE_BENCH);
        assert!(!parser.has_vlan());
    }

    #[test]
    fn test_bench_frame_tagged() {
        let frame = build_bench_frame(
            MacAddress::BROADCAST,
            MacAddress::NULL,
            &[MsgType::Data as u8],
            Some(Tci::new(3, false, 100)),
        )
        .unwrap();
        let parser = FrameParser::new(&frame);
        assert_eq!(parser.ethertype(), ETHERTYPE_BENCH);
        assert!(parser.has_vlan());
        assert_eq!(parser.vlan_id(), 100);
        assert_eq!(parser.priority(), 3);
    }
}
