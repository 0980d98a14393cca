//! Error types for the l2link library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type covering every fallible operation in the crate.
///
/// Resource variants carry the underlying [`std::io::Error`] so callers can
/// inspect `raw_os_error()` and decide whether a failure is transient (the
/// flood benchmark's retry helper does exactly that).
#[derive(Error, Debug)]
pub enum Error {
    /// Opening a socket failed
    #[error("socket creation failed: {0}")]
    SocketCreation(#[source] std::io::Error),

    /// Binding or configuring a socket failed
    #[error("socket bind failed: {0}")]
    SocketBind(#[source] std::io::Error),

    /// A send on a socket failed
    #[error("socket send failed: {0}")]
    SocketSend(#[source] std::io::Error),

    /// A receive on a socket failed
    #[error("socket receive failed: {0}")]
    SocketRecv(#[source] std::io::Error),

    /// Raw packet sockets need CAP_NET_RAW or root
    #[error("permission denied (raw sockets require CAP_NET_RAW)")]
    PermissionDenied,

    /// Named interface does not exist (or the name is invalid)
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    /// The kernel refused an interface attribute query
    #[error("interface query failed: {0}")]
    InterfaceQueryFailed(#[source] std::io::Error),

    /// Text did not parse as a MAC address
    #[error("invalid MAC address: {0:?}")]
    InvalidMacAddress(String),

    /// A frame buffer is structurally too short
    #[error("invalid frame size: {0} bytes")]
    InvalidFrameSize(usize),

    /// VLAN id above 4095
    #[error("invalid VLAN id: {0} (max 4095)")]
    InvalidVlanId(u16),

    /// VLAN priority above 7
    #[error("invalid VLAN priority: {0} (max 7)")]
    InvalidPriority(u8),

    /// Caller-supplied buffer cannot hold the frame
    #[error("buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// TCP connection establishment failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The MAC exchange did not complete
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A bounded wait expired. Not an I/O failure; loops routinely swallow it.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Stable short name for every variant, suitable for logs and exit
    /// diagnostics. Total over the enum.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::SocketCreation(_) => "socket_creation_failed",
            Self::SocketBind(_) => "socket_bind_failed",
            Self::SocketSend(_) => "socket_send_failed",
            Self::SocketRecv(_) => "socket_recv_failed",
            Self::PermissionDenied => "permission_denied",
            Self::InterfaceNotFound(_) => "interface_not_found",
            Self::InterfaceQueryFailed(_) => "interface_query_failed",
            Self::InvalidMacAddress(_) => "invalid_mac_address",
            Self::InvalidFrameSize(_) => "invalid_frame_size",
            Self::InvalidVlanId(_) => "invalid_vlan_id",
            Self::InvalidPriority(_) => "invalid_priority",
            Self::BufferTooSmall { .. } => "buffer_too_small",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::HandshakeFailed(_) => "handshake_failed",
            Self::Timeout => "timeout",
        }
    }

    /// True when the wrapped OS error is one of the transient send
    /// conditions worth retrying (full queue, interrupted call).
    pub fn is_transient_send(&self) -> bool {
        match self {
            Self::SocketSend(io) => matches!(
                io.raw_os_error(),
                Some(libc::EAGAIN) | Some(libc::ENOBUFS) | Some(libc::EINTR)
            ),
            Self::Timeout => true,
            _ => false,
        }
    }

    /// Create a connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    /// Create a handshake error.
    pub fn handshake<S: Into<String>>(msg: S) -> Self {
        Self::HandshakeFailed(msg.into())
    }

    pub(crate) fn last_os_send() -> Self {
        Self::SocketSend(std::io::Error::last_os_error())
    }

    pub(crate) fn last_os_recv() -> Self {
        Self::SocketRecv(std::io::Error::last_os_error())
    }
}
