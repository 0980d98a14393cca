//! Connection-oriented stream endpoint for the handshake.
//!
//! Thin owned wrappers over the platform TCP stack. Connect performs a
//! single non-blocking connect with a readiness wait (total deadline, not
//! per attempt); accept is bounded by a readiness wait on the listening
//! socket so a missing peer cannot park the server forever.

use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Listening side of the handshake channel. Move-only; drop closes.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Listen on every local address at `port`, with address reuse.
    pub fn listen(port: u16) -> Result<TcpServer> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(Error::SocketBind)?;
        debug!(port, "handshake listener up");
        Ok(TcpServer { listener })
    }

    /// Accept one peer, waiting at most `deadline`.
    ///
    /// The wait is a readiness poll on the listening descriptor; expiry
    /// surfaces as `Timeout` without ever calling accept.
    pub fn accept_deadline(&self, deadline: Duration) -> Result<TcpPeer> {
        let mut pfd = libc::pollfd {
            fd: self.listener.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, deadline.as_millis() as libc::c_int) };
        if rc < 0 {
            return Err(Error::connection(std::io::Error::last_os_error().to_string()));
        }
        if rc == 0 {
            return Err(Error::Timeout);
        }

        let (stream, peer_addr) = self
            .listener
            .accept()
            .map_err(|e| Error::connection(e.to_string()))?;
        debug!(%peer_addr, "handshake peer accepted");
        Ok(TcpPeer { stream })
    }

    /// The port actually bound (useful when listening on port 0 in tests).
    pub fn local_port(&self) -> Result<u16> {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(Error::SocketBind)
    }
}

/// One connected byte-stream peer. Move-only; drop closes.
#[derive(Debug)]
pub struct TcpPeer {
    stream: TcpStream,
}

impl TcpPeer {
    /// Connect to `ip:port` within a total deadline.
    pub fn connect(ip: &str, port: u16, timeout: Duration) -> Result<TcpPeer> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| Error::connection(format!("bad address {ip:?}")))?;
        let addr = SocketAddr::new(ip, port);

        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                Error::Timeout
            } else {
                Error::connection(e.to_string())
            }
        })?;
        debug!(%addr, "handshake connected");
        Ok(TcpPeer { stream })
    }

    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write(data).map_err(Error::SocketSend)
    }

    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::SocketRecv)
    }

    /// Read exactly `buf.len()` bytes; a short read (peer closed early) is
    /// a handshake failure, not a partial success.
    pub fn receive_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream
            .read_exact(buf)
            .map_err(|e| Error::handshake(format!("short read: {e}")))
    }

    /// Bound both stream directions with a timeout.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.stream
            .set_read_timeout(Some(timeout))
            .and_then(|()| self.stream.set_write_timeout(Some(timeout)))
            .map_err(Error::SocketBind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_accept_deadline_times_out() {
        let server = TcpServer::listen(0).unwrap();
        let err = server.accept_deadline(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn test_connect_refused() {
        // a port we just bound and dropped is very likely closed
        let port = {
            let server = TcpServer::listen(0).unwrap();
            server.local_port().unwrap()
        };
        let err = TcpPeer::connect("127.0.0.1", port, Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_) | Error::Timeout));
    }

    #[test]
    fn test_exchange_bytes() {
        let server = TcpServer::listen(0).unwrap();
        let port = server.local_port().unwrap();

        let client = thread::spawn(move || {
            let mut peer = TcpPeer::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
            peer.send(b"ping?").unwrap();
            let mut reply = [0u8; 5];
            peer.receive_exact(&mut reply).unwrap();
            reply
        });

        let mut peer = server.accept_deadline(Duration::from_secs(2)).unwrap();
        let mut buf = [0u8; 5];
        peer.receive_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping?");
        peer.send(b"pong!").unwrap();

        assert_eq!(&client.join().unwrap(), b"pong!");
    }

    #[test]
    fn test_short_read_is_handshake_failure() {
        let server = TcpServer::listen(0).unwrap();
        let port = server.local_port().unwrap();

        let client = thread::spawn(move || {
            let mut peer = TcpPeer::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
            peer.send(b"abc").unwrap();
            // drop closes the stream after three bytes
        });

        let mut peer = server.accept_deadline(Duration::from_secs(2)).unwrap();
        let mut buf = [0u8; 6];
        let err = peer.receive_exact(&mut buf).unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed(_)));
        client.join().unwrap();
    }
}
