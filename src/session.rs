//! Hybrid session: TCP control plane for peer discovery, raw link for data.
//!
//! The control channel lives only long enough to exchange six-octet MAC
//! addresses over a well-known port (server sends first). Everything after
//! that flows as 802.1Q-tagged frames over an AF_PACKET socket bound to the
//! interface with a receive-all filter, so tagged and untagged arrivals of
//! the configured ethertype are both observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::iface::Interface;
use crate::mac::MacAddress;
use crate::net::{EtherFilter, RawSocket};
use crate::packet::{build_vlan_frame, FrameParser, Tci, ETHERTYPE_CUSTOM};

/// Session configuration. Defaults follow the protocol's conventional
/// values: port 9000, VLAN 10 at top priority, the experimental ethertype.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tcp_port: u16,
    pub data_ethertype: u16,
    pub vlan_id: u16,
    pub priority: u8,
    pub send_interval: Duration,
    pub recv_buffer_size: usize,
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tcp_port: 9000,
            data_ethertype: ETHERTYPE_CUSTOM,
            vlan_id: 10,
            priority: 7,
            send_interval: Duration::from_millis(500),
            recv_buffer_size: 2048,
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

/// One received data-plane message.
#[derive(Debug, Clone)]
pub struct DataMessage {
    pub source: MacAddress,
    pub priority: u8,
    pub vlan_id: u16,
    pub was_tagged: bool,
    pub payload: Vec<u8>,
}

/// MAC exchange over the control channel, exposed for testing.
///
/// The protocol is exactly six bytes each way with the server sending
/// first; there is no framing or versioning, and a short read is a hard
/// handshake failure.
pub mod handshake {
    use super::*;
    use crate::net::{TcpPeer, TcpServer};

    /// Server side: accept one peer within `timeout`, send the local MAC,
    /// read the peer's.
    pub fn serve(port: u16, local_mac: MacAddress, timeout: Duration) -> Result<MacAddress> {
        let server = TcpServer::listen(port)?;
        info!(port, "waiting for handshake peer");

        let mut peer = server.accept_deadline(timeout)?;
        peer.set_timeout(timeout)?;
        exchange(&mut peer, local_mac, true)
    }

    /// Client side: connect within `timeout`, read the server's MAC, send
    /// the local one.
    pub fn connect(
        server_ip: &str,
        port: u16,
        local_mac: MacAddress,
        timeout: Duration,
    ) -> Result<MacAddress> {
        let mut peer = TcpPeer::connect(server_ip, port, timeout)?;
        peer.set_timeout(timeout)?;
        exchange(&mut peer, local_mac, false)
    }

    fn exchange(peer: &mut TcpPeer, local_mac: MacAddress, send_first: bool) -> Result<MacAddress> {
        let mut remote = [0u8; MacAddress::LEN];

        if send_first {
            send_mac(peer, local_mac)?;
            peer.receive_exact(&mut remote)?;
        } else {
            peer.receive_exact(&mut remote)?;
            send_mac(peer, local_mac)?;
        }

        let peer_mac = MacAddress::from_octets(remote);
        info!(%peer_mac, "handshake complete");
        Ok(peer_mac)
    }

    fn send_mac(peer: &mut TcpPeer, mac: MacAddress) -> Result<()> {
        let sent = peer.send(mac.as_bytes())?;
        if sent != MacAddress::LEN {
            return Err(Error::handshake(format!("short write: {sent} of 6 bytes")));
        }
        Ok(())
    }
}

/// Poll granularity of the background receiver; bounds both cancellation
/// latency and join time.
const RECEIVER_POLL: Duration = Duration::from_millis(100);

/// A peer-to-peer session over one interface.
///
/// Owns the raw socket for its whole lifetime. The optional background
/// receiver is always stopped and joined before the socket can close.
pub struct HybridSession {
    iface: Interface,
    config: SessionConfig,
    peer_mac: MacAddress,
    socket: Arc<RawSocket>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl HybridSession {
    /// Server role: listen for the peer, learn its MAC, open the data
    /// plane. Every handshake or socket error surfaces directly.
    pub fn serve(iface: &Interface, config: SessionConfig) -> Result<HybridSession> {
        let peer_mac = handshake::serve(config.tcp_port, iface.mac(), config.handshake_timeout)?;
        Self::open_data_plane(iface, config, peer_mac)
    }

    /// Client role: connect to the server, learn its MAC, open the data
    /// plane.
    pub fn connect(
        iface: &Interface,
        server_ip: &str,
        config: SessionConfig,
    ) -> Result<HybridSession> {
        let peer_mac = handshake::connect(
            server_ip,
            config.tcp_port,
            iface.mac(),
            config.handshake_timeout,
        )?;
        Self::open_data_plane(iface, config, peer_mac)
    }

    fn open_data_plane(
        iface: &Interface,
        config: SessionConfig,
        peer_mac: MacAddress,
    ) -> Result<HybridSession> {
        // receive-all so tagged and untagged arrivals are both visible
        let socket = RawSocket::open_bound(iface, EtherFilter::All)?;
        debug!(iface = iface.name(), %peer_mac, "data plane up");

        Ok(HybridSession {
            iface: iface.clone(),
            config,
            peer_mac,
            socket: Arc::new(socket),
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
        })
    }

    /// Send one payload as an 802.1Q-tagged frame addressed at the peer.
    pub fn send_data(&self, payload: &[u8]) -> Result<usize> {
        let tci = Tci::new(self.config.priority, false, self.config.vlan_id);
        let frame = build_vlan_frame(
            self.peer_mac,
            self.iface.mac(),
            tci,
            self.config.data_ethertype,
            payload,
        )?;
        self.socket.send_raw(&frame, &self.iface)
    }

    /// Block until a frame carrying the configured data ethertype arrives;
    /// frames for other protocols are dropped silently.
    pub fn receive_data(&self) -> Result<DataMessage> {
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        loop {
            let received = self.socket.receive(&mut buf)?;
            if let Some(message) = decode_data(&buf[..received], self.config.data_ethertype) {
                return Ok(message);
            }
        }
    }

    /// Like [`receive_data`](Self::receive_data), bounded by a deadline
    /// across however many foreign frames arrive in between.
    pub fn receive_data_timeout(&self, timeout: Duration) -> Result<DataMessage> {
        let deadline = std::time::Instant::now() + timeout;
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .ok_or(Error::Timeout)?;
            let received = self.socket.receive_with_timeout(&mut buf, remaining)?;
            if let Some(message) = decode_data(&buf[..received], self.config.data_ethertype) {
                return Ok(message);
            }
        }
    }

    /// Spawn the single background receive worker. The worker polls in
    /// 100 ms slices: timeouts continue, matching frames reach the
    /// callback, any other error ends the loop.
    pub fn start_receiver<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(DataMessage) + Send + 'static,
    {
        if self.running.swap(true, Ordering::AcqRel) {
            // already running; the single-worker invariant holds
            return Ok(());
        }

        let socket = Arc::clone(&self.socket);
        let running = Arc::clone(&self.running);
        let ethertype = self.config.data_ethertype;
        let buffer_size = self.config.recv_buffer_size;

        self.receiver = Some(std::thread::spawn(move || {
            let mut buf = vec![0u8; buffer_size];
            while running.load(Ordering::Acquire) {
                match socket.receive_with_timeout(&mut buf, RECEIVER_POLL) {
                    Ok(received) => {
                        if let Some(message) = decode_data(&buf[..received], ethertype) {
                            callback(message);
                        }
                    }
                    Err(Error::Timeout) => continue,
                    Err(err) => {
                        warn!(error = %err, "receiver loop exiting");
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Clear the running flag and join the worker.
    pub fn stop_receiver(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
    }

    /// Blocking send loop: every `send_interval`, send whatever the
    /// generator produces, until the process-wide running flag clears.
    pub fn send_loop<F>(&self, mut generator: F) -> Result<()>
    where
        F: FnMut() -> Vec<u8>,
    {
        while crate::cancel::is_running() {
            let payload = generator();
            self.send_data(&payload)?;
            std::thread::sleep(self.config.send_interval);
        }
        Ok(())
    }

    pub fn peer(&self) -> MacAddress {
        self.peer_mac
    }

    pub fn interface(&self) -> &Interface {
        &self.iface
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for HybridSession {
    fn drop(&mut self) {
        // worker must be gone before the socket closes
        self.stop_receiver();
    }
}

fn decode_data(frame: &[u8], ethertype: u16) -> Option<DataMessage> {
    let parser = FrameParser::new(frame);
    if !parser.is_valid() || parser.ethertype() != ethertype {
        return None;
    }
    Some(DataMessage {
        source: parser.src_mac(),
        priority: parser.priority(),
        vlan_id: parser.vlan_id(),
        was_tagged: parser.has_vlan(),
        payload: parser.payload().to_vec(),
    })
}
