//! Local IPC over the loopback link.
//!
//! A convenience channel for single-host messaging: frames ride the
//! loopback interface under the dedicated 0xAAAA ethertype with null MACs
//! (the kernel ignores addressing on loopback, the frame format still
//! requires the fields). Receives hand back only the payload; a frame for a
//! different ethertype yields an empty payload rather than an error so the
//! caller can keep looping.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::iface::{loopback, Interface};
use crate::mac::MacAddress;
use crate::net::{EtherFilter, RawSocket, SocketOptions};
use crate::packet::{build_frame, FrameParser, ETHERTYPE_IPC};

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct IpcConfig {
    pub interface_name: String,
    pub ethertype: u16,
    /// Loopback handles jumbo frames, so default generously.
    pub recv_buffer_size: usize,
    pub recv_timeout: Option<Duration>,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            interface_name: "lo".to_string(),
            ethertype: ETHERTYPE_IPC,
            recv_buffer_size: 70000,
            recv_timeout: None,
        }
    }
}

/// Bidirectional local messaging endpoint.
pub struct IpcChannel {
    socket: RawSocket,
    iface: Interface,
    config: IpcConfig,
    recv_buf: Vec<u8>,
}

impl IpcChannel {
    /// Open a channel on the configured interface, falling back to
    /// whatever loopback device the host has.
    pub fn open(config: IpcConfig) -> Result<IpcChannel> {
        let iface = match Interface::query(&config.interface_name) {
            Ok(iface) => iface,
            Err(_) => loopback()?,
        };

        let mut socket = RawSocket::open(EtherFilter::Raw(config.ethertype))?;
        socket.bind(&iface)?;

        if config.recv_timeout.is_some() {
            let opts = SocketOptions { recv_timeout: config.recv_timeout, ..Default::default() };
            socket.set_options(&opts)?;
        }

        debug!(iface = iface.name(), ethertype = config.ethertype, "ipc channel open");
        let recv_buf = vec![0u8; config.recv_buffer_size];
        Ok(IpcChannel { socket, iface, config, recv_buf })
    }

    /// Send one message, wrapped in a null-MAC frame.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let frame = build_frame(MacAddress::NULL, MacAddress::NULL, self.config.ethertype, data);
        self.socket.send_raw(&frame, &self.iface)
    }

    /// Blocking receive. Returns the payload, or an empty vector when the
    /// arriving frame carries a different ethertype (callers loop).
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        let received = self.socket.receive(&mut self.recv_buf)?;
        Self::extract(&self.recv_buf[..received], self.config.ethertype)
    }

    /// Receive bounded by a one-shot timeout.
    pub fn receive_with_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let received = self.socket.receive_with_timeout(&mut self.recv_buf, timeout)?;
        Self::extract(&self.recv_buf[..received], self.config.ethertype)
    }

    /// Non-blocking probe: `None` when nothing is queued.
    pub fn try_receive(&mut self) -> Result<Option<Vec<u8>>> {
        match self.receive_with_timeout(Duration::ZERO) {
            Ok(payload) => Ok(Some(payload)),
            Err(Error::Timeout) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Receive forever, forwarding every non-empty payload. Returns on the
    /// first receive error.
    pub fn receive_loop<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]),
    {
        loop {
            let payload = self.receive()?;
            if !payload.is_empty() {
                callback(&payload);
            }
        }
    }

    pub fn interface(&self) -> &Interface {
        &self.iface
    }

    fn extract(frame: &[u8], ethertype: u16) -> Result<Vec<u8>> {
        let parser = FrameParser::new(frame);
        if !parser.is_valid() {
            return Err(Error::InvalidFrameSize(frame.len()));
        }
        if parser.ethertype() != ethertype {
            // foreign protocol: empty payload, not an error
            return Ok(Vec::new());
        }
        Ok(parser.payload().to_vec())
    }
}

/// Two independent channels over the same loopback/ethertype combination.
pub fn channel_pair(config: IpcConfig) -> Result<(IpcChannel, IpcChannel)> {
    let first = IpcChannel::open(config.clone())?;
    let second = IpcChannel::open(config)?;
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_matching_payload() {
        let frame = build_frame(MacAddress::NULL, MacAddress::NULL, ETHERTYPE_IPC, b"hello");
        assert_eq!(IpcChannel::extract(&frame, ETHERTYPE_IPC).unwrap(), b"hello");
    }

    #[test]
    fn test_extract_mismatch_is_empty_not_error() {
        let frame = build_frame(MacAddress::NULL, MacAddress::NULL, 0x0800, b"hello");
        assert_eq!(IpcChannel::extract(&frame, ETHERTYPE_IPC).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_extract_runt_frame_is_error() {
        assert!(IpcChannel::extract(&[0u8; 7], ETHERTYPE_IPC).is_err());
    }

    #[test]
    #[ignore] // requires CAP_NET_RAW
    fn test_pair_roundtrip() {
        let (tx, mut rx) = channel_pair(IpcConfig::default()).unwrap();
        tx.send(b"ipc message").unwrap();
        let payload = rx.receive_with_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(payload, b"ipc message");
    }

    #[test]
    #[ignore] // requires CAP_NET_RAW
    fn test_try_receive_empty_queue() {
        let (_tx, mut rx) = channel_pair(IpcConfig::default()).unwrap();
        assert!(rx.try_receive().unwrap().is_none());
    }
}
