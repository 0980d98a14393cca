//! Network interface registry.
//!
//! Snapshots of kernel interface state (index, hardware address, MTU,
//! flags) taken through ioctl on a throwaway datagram socket. Queries are
//! stateless; descriptors are plain values and do not track later changes.

use std::ffi::CStr;

use tracing::trace;

use crate::error::{Error, Result};
use crate::mac::MacAddress;

/// Immutable snapshot of one link interface at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
    index: i32,
    mac: MacAddress,
    mtu: u32,
    is_up: bool,
    is_loopback: bool,
}

impl Interface {
    /// Query a named interface.
    ///
    /// Invalid names (empty, at or above the kernel limit, containing
    /// whitespace or path separators) are rejected before any kernel call.
    pub fn query(name: &str) -> Result<Interface> {
        validate_name(name)?;

        let sock = IoctlSocket::open()?;
        let mut ifr = new_ifreq(name);

        // index: the authoritative existence check
        if unsafe { libc::ioctl(sock.fd, libc::SIOCGIFINDEX, &mut ifr) } < 0 {
            return Err(Error::InterfaceNotFound(name.to_string()));
        }
        let index = unsafe { ifr.ifr_ifru.ifru_ifindex };

        if unsafe { libc::ioctl(sock.fd, libc::SIOCGIFHWADDR, &mut ifr) } < 0 {
            return Err(Error::InterfaceQueryFailed(std::io::Error::last_os_error()));
        }
        let mut octets = [0u8; 6];
        let hw = unsafe { ifr.ifr_ifru.ifru_hwaddr.sa_data };
        for (dst, src) in octets.iter_mut().zip(hw.iter()) {
            *dst = *src as u8;
        }
        let mac = MacAddress::from_octets(octets);

        // flags and MTU are best-effort; missing values keep defaults
        let mut is_up = false;
        let mut is_loopback = false;
        if unsafe { libc::ioctl(sock.fd, libc::SIOCGIFFLAGS, &mut ifr) } >= 0 {
            let flags = unsafe { ifr.ifr_ifru.ifru_flags } as libc::c_int;
            is_up = flags & libc::IFF_UP != 0;
            is_loopback = flags & libc::IFF_LOOPBACK != 0;
        }

        let mut mtu = 0u32;
        if unsafe { libc::ioctl(sock.fd, libc::SIOCGIFMTU, &mut ifr) } >= 0 {
            mtu = unsafe { ifr.ifr_ifru.ifru_mtu } as u32;
        }

        trace!(name, index, %mac, mtu, is_up, "interface queried");

        Ok(Interface { name: name.to_string(), index, mac, mtu, is_up, is_loopback })
    }

    /// Cheap standalone MTU read for a named interface.
    pub fn query_mtu(name: &str) -> Result<u32> {
        validate_name(name)?;

        let sock = IoctlSocket::open()?;
        let mut ifr = new_ifreq(name);
        if unsafe { libc::ioctl(sock.fd, libc::SIOCGIFMTU, &mut ifr) } < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENODEV) {
                return Err(Error::InterfaceNotFound(name.to_string()));
            }
            return Err(Error::InterfaceQueryFailed(err));
        }
        Ok(unsafe { ifr.ifr_ifru.ifru_mtu } as u32)
    }

    /// Enumerate every link interface, one descriptor per name.
    pub fn list_all() -> Result<Vec<Interface>> {
        let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if unsafe { libc::getifaddrs(&mut addrs) } < 0 {
            return Err(Error::InterfaceQueryFailed(std::io::Error::last_os_error()));
        }
        let guard = IfaddrsGuard(addrs);

        let mut seen: Vec<String> = Vec::new();
        let mut interfaces = Vec::new();

        let mut cursor = guard.0;
        while !cursor.is_null() {
            let entry = unsafe { &*cursor };
            cursor = entry.ifa_next;

            if entry.ifa_name.is_null() {
                continue;
            }
            let name = unsafe { CStr::from_ptr(entry.ifa_name) }
                .to_string_lossy()
                .into_owned();

            // interfaces repeat once per address family
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());

            if let Ok(iface) = Interface::query(&name) {
                interfaces.push(iface);
            }
        }

        Ok(interfaces)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    pub fn is_up(&self) -> bool {
        self.is_up
    }

    pub fn is_loopback(&self) -> bool {
        self.is_loopback
    }
}

/// Whether a named interface exists.
pub fn interface_exists(name: &str) -> bool {
    Interface::query(name).is_ok()
}

/// Find the loopback interface: common names first, then the first
/// descriptor with the loopback flag set.
pub fn loopback() -> Result<Interface> {
    for name in ["lo", "lo0", "loopback"] {
        if let Ok(iface) = Interface::query(name) {
            if iface.is_loopback() {
                return Ok(iface);
            }
        }
    }

    Interface::list_all()?
        .into_iter()
        .find(Interface::is_loopback)
        .ok_or_else(|| Error::InterfaceNotFound("loopback".to_string()))
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() < libc::IFNAMSIZ
        && !name.contains(char::is_whitespace)
        && !name.contains('/');
    if valid {
        Ok(())
    } else {
        Err(Error::InterfaceNotFound(name.to_string()))
    }
}

fn new_ifreq(name: &str) -> libc::ifreq {
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    // length checked by validate_name; trailing NUL guaranteed by zeroed init
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes()) {
        *dst = *src as libc::c_char;
    }
    ifr
}

struct IoctlSocket {
    fd: libc::c_int,
}

impl IoctlSocket {
    fn open() -> Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(Error::SocketCreation(std::io::Error::last_os_error()));
        }
        Ok(Self { fd })
    }
}

impl Drop for IoctlSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

struct IfaddrsGuard(*mut libc::ifaddrs);

impl Drop for IfaddrsGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { libc::freeifaddrs(self.0) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation_rejects_without_kernel() {
        assert!(matches!(Interface::query(""), Err(Error::InterfaceNotFound(_))));
        assert!(matches!(Interface::query("eth 0"), Err(Error::InterfaceNotFound(_))));
        assert!(matches!(Interface::query("eth\t0"), Err(Error::InterfaceNotFound(_))));
        assert!(matches!(Interface::query("../etc"), Err(Error::InterfaceNotFound(_))));
        let long = "x".repeat(libc::IFNAMSIZ);
        assert!(matches!(Interface::query(&long), Err(Error::InterfaceNotFound(_))));
    }

    #[test]
    fn test_query_loopback() {
        // every Linux host has a loopback device
        let lo = loopback().unwrap();
        assert!(lo.is_loopback());
        assert!(lo.index() > 0);
        assert!(lo.mtu() > 0);
    }

    #[test]
    fn test_list_all_contains_loopback() {
        let all = Interface::list_all().unwrap();
        assert!(!all.is_empty());
        assert!(all.iter().any(|iface| iface.is_loopback()));

        // names are unique
        let mut names: Vec<&str> = all.iter().map(Interface::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_exists() {
        assert!(interface_exists("lo"));
        assert!(!interface_exists("definitely-not-a-nic"));
    }

    #[test]
    fn test_query_mtu_matches_descriptor() {
        let lo = loopback().unwrap();
        let mtu = Interface::query_mtu(lo.name()).unwrap();
        assert_eq!(mtu, lo.mtu());
    }
}
