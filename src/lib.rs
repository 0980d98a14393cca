//! l2link - Layer-2 Ethernet library and benchmark harness.
//!
//! User-space construction, transmission, and measurement of raw Ethernet
//! frames, bypassing the host IP stack:
//!
//! - bit-exact Ethernet II and 802.1Q codecs over caller-owned buffers
//! - owned raw packet socket endpoints with bounded-timeout receive
//! - a hybrid session: TCP handshake for peer discovery, tagged raw frames
//!   for data
//! - loopback IPC under a dedicated ethertype
//! - latency and throughput benchmark roles plus an SSH-driven
//!   orchestrator
//!
//! The design targets Linux packet sockets (`AF_PACKET`) and parallel OS
//! threads; there is no async runtime.

pub mod bench;
pub mod cancel;
pub mod error;
pub mod iface;
pub mod ipc;
pub mod mac;
pub mod mtu;
pub mod net;
pub mod packet;
pub mod remote;
pub mod session;

pub use error::{Error, Result};
pub use iface::Interface;
pub use mac::MacAddress;
pub use net::{EtherFilter, RawSocket, SocketOptions};
pub use packet::{FrameParser, Tci};
pub use session::{HybridSession, SessionConfig};

/// Default TCP port for the hybrid session handshake.
pub const DEFAULT_HANDSHAKE_PORT: u16 = 9000;
