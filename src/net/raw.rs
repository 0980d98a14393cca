//! Raw AF_PACKET socket endpoint.
//!
//! Owns the descriptor exclusively: the type is move-only and the drop
//! releases the socket exactly once. Sends and receives carry complete
//! Ethernet frames including headers; the kernel's IP stack never sees
//! them.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::iface::Interface;
use crate::mac::MacAddress;
use crate::packet::{ETHERTYPE_BENCH, ETHERTYPE_CUSTOM, ETHERTYPE_IPC};

/// EtherType filter applied at socket creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherFilter {
    /// Every protocol (ETH_P_ALL). Needed to observe both tagged and
    /// untagged arrivals of one ethertype.
    All,
    /// The default experimental payload type, 0x88B5.
    Custom,
    /// The loopback IPC type, 0xAAAA.
    Ipc,
    /// The benchmark type, 0xBEEF.
    Bench,
    /// Any other 16-bit EtherType.
    Raw(u16),
}

impl EtherFilter {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::All => libc::ETH_P_ALL as u16,
            Self::Custom => ETHERTYPE_CUSTOM,
            Self::Ipc => ETHERTYPE_IPC,
            Self::Bench => ETHERTYPE_BENCH,
            Self::Raw(value) => value,
        }
    }
}

/// Socket options consumed by [`RawSocket::set_options`]. Plain record;
/// unset fields are left at kernel defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    pub recv_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub reuse_addr: bool,
    pub broadcast: bool,
    pub recv_buffer_size: Option<i32>,
    pub send_buffer_size: Option<i32>,
}

/// Scoped owner of a raw packet socket.
#[derive(Debug)]
pub struct RawSocket {
    fd: libc::c_int,
    filter: EtherFilter,
    bound: Option<Interface>,
}

impl RawSocket {
    /// Open a packet socket filtered to `filter`.
    ///
    /// `PermissionDenied` is reported distinctly when the kernel refuses
    /// for lack of privilege; every other failure is `SocketCreation`.
    pub fn open(filter: EtherFilter) -> Result<RawSocket> {
        let proto = filter.as_u16().to_be() as libc::c_int;
        let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, proto) };
        if fd < 0 {
            let err = std::io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EPERM) | Some(libc::EACCES) => Err(Error::PermissionDenied),
                _ => Err(Error::SocketCreation(err)),
            };
        }
        debug!(fd, filter = filter.as_u16(), "raw socket opened");
        Ok(RawSocket { fd, filter, bound: None })
    }

    /// Open and bind in one step.
    pub fn open_bound(iface: &Interface, filter: EtherFilter) -> Result<RawSocket> {
        let mut sock = Self::open(filter)?;
        sock.bind(iface)?;
        Ok(sock)
    }

    /// Bind to a specific interface index. The descriptor is retained so
    /// later sends do not re-query the kernel.
    pub fn bind(&mut self, iface: &Interface) -> Result<()> {
        let mut sll: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = self.filter.as_u16().to_be();
        sll.sll_ifindex = iface.index();

        let rc = unsafe {
            libc::bind(
                self.fd,
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(Error::SocketBind(std::io::Error::last_os_error()));
        }

        self.bound = Some(iface.clone());
        Ok(())
    }

    /// Apply socket options.
    pub fn set_options(&self, opts: &SocketOptions) -> Result<()> {
        if let Some(timeout) = opts.recv_timeout {
            self.set_timeval(libc::SO_RCVTIMEO, timeout)?;
        }
        if let Some(timeout) = opts.send_timeout {
            self.set_timeval(libc::SO_SNDTIMEO, timeout)?;
        }
        if opts.reuse_addr {
            self.set_flag(libc::SO_REUSEADDR)?;
        }
        if opts.broadcast {
            self.set_flag(libc::SO_BROADCAST)?;
        }
        if let Some(size) = opts.recv_buffer_size {
            self.set_int(libc::SO_RCVBUF, size)?;
        }
        if let Some(size) = opts.send_buffer_size {
            self.set_int(libc::SO_SNDBUF, size)?;
        }
        Ok(())
    }

    /// Emit a complete frame as-is; the destination MAC is the one already
    /// embedded in the buffer. No internal retry.
    pub fn send_raw(&self, frame: &[u8], iface: &Interface) -> Result<usize> {
        self.sendto(frame, iface, None)
    }

    /// Convenience send when no builder is in play: the kernel addresses
    /// the frame at `dst`.
    pub fn send_to(&self, payload: &[u8], iface: &Interface, dst: MacAddress) -> Result<usize> {
        self.sendto(payload, iface, Some(dst))
    }

    fn sendto(&self, data: &[u8], iface: &Interface, dst: Option<MacAddress>) -> Result<usize> {
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_ifindex = iface.index();
        addr.sll_halen = MacAddress::LEN as u8;
        if let Some(mac) = dst {
            for (dst_byte, src_byte) in addr.sll_addr.iter_mut().zip(mac.octets()) {
                *dst_byte = src_byte;
            }
        }

        let sent = unsafe {
            libc::sendto(
                self.fd,
                data.as_ptr() as *const libc::c_void,
                data.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if sent < 0 {
            return Err(Error::last_os_send());
        }
        Ok(sent as usize)
    }

    /// Blocking receive into a caller buffer. The configured `SO_RCVTIMEO`
    /// surfaces as `Timeout`.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let received =
            unsafe { libc::recv(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
        if received < 0 {
            let err = std::io::Error::last_os_error();
            return if err.kind() == std::io::ErrorKind::WouldBlock {
                Err(Error::Timeout)
            } else {
                Err(Error::SocketRecv(err))
            };
        }
        Ok(received as usize)
    }

    /// One-shot timeout independent of the configured default: readiness
    /// wait, then a receive that cannot park.
    pub fn receive_with_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut pfd = libc::pollfd { fd: self.fd, events: libc::POLLIN, revents: 0 };

        let rc = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) };
        if rc < 0 {
            return Err(Error::last_os_recv());
        }
        if rc == 0 {
            return Err(Error::Timeout);
        }

        self.receive(buf)
    }

    /// The interface this socket is bound to, if any.
    pub fn bound_interface(&self) -> Option<&Interface> {
        self.bound.as_ref()
    }

    pub fn filter(&self) -> EtherFilter {
        self.filter
    }

    fn set_timeval(&self, opt: libc::c_int, timeout: Duration) -> Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        self.setsockopt(opt, &tv as *const libc::timeval as *const libc::c_void, std::mem::size_of::<libc::timeval>())
    }

    fn set_flag(&self, opt: libc::c_int) -> Result<()> {
        self.set_int(opt, 1)
    }

    fn set_int(&self, opt: libc::c_int, value: libc::c_int) -> Result<()> {
        self.setsockopt(opt, &value as *const libc::c_int as *const libc::c_void, std::mem::size_of::<libc::c_int>())
    }

    fn setsockopt(&self, opt: libc::c_int, value: *const libc::c_void, len: usize) -> Result<()> {
        let rc = unsafe {
            libc::setsockopt(self.fd, libc::SOL_SOCKET, opt, value, len as libc::socklen_t)
        };
        if rc < 0 {
            return Err(Error::SocketBind(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
