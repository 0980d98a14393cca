//! Socket endpoints.
//!
//! - [`raw`]: the AF_PACKET data-plane endpoint carrying whole frames.
//! - [`tcp`]: the connection-oriented endpoint used only for the handshake.

pub mod raw;
pub mod tcp;

pub use raw::{EtherFilter, RawSocket, SocketOptions};
pub use tcp::{TcpPeer, TcpServer};
