//! MTU and payload size arithmetic.
//!
//! Raw L2 has no fragmentation, so oversized frames vanish silently at the
//! driver. These helpers keep payload sizes inside the negotiated MTU before
//! anything reaches a socket. All functions are pure; the per-interface MTU
//! query lives with the interface registry.

/// Standard Ethernet MTU.
pub const STANDARD_MTU: u32 = 1500;

/// Conventional jumbo frame MTU.
pub const JUMBO_MTU: u32 = 9000;

/// Minimum 802.3 payload size.
pub const MIN_PAYLOAD: u32 = 46;

/// Absolute minimum MTU for Ethernet.
pub const MIN_MTU: u32 = 68;

/// L2 header overhead for the given tagging mode: 14 or 18 bytes.
pub const fn header_len(vlan: bool) -> u32 {
    if vlan {
        18
    } else {
        14
    }
}

/// Largest payload that fits inside `mtu`.
pub const fn max_payload(mtu: u32, vlan: bool) -> u32 {
    mtu.saturating_sub(header_len(vlan))
}

/// Smallest MTU able to carry `payload` bytes.
pub const fn required_mtu(payload: u32, vlan: bool) -> u32 {
    payload + header_len(vlan)
}

/// Whether `payload` bytes fit inside `mtu`.
pub const fn fits(payload: u32, mtu: u32, vlan: bool) -> bool {
    required_mtu(payload, vlan) <= mtu
}

/// Outcome of negotiating an effective MTU between two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub local_mtu: u32,
    pub remote_mtu: u32,
    /// min(local, remote)
    pub effective_mtu: u32,
    /// Largest safe payload under the effective MTU.
    pub max_payload: u32,
    pub has_vlan: bool,
    /// Both sides at or above the jumbo threshold.
    pub jumbo_capable: bool,
}

impl Negotiated {
    /// Whether a payload of `size` bytes is safe to send.
    pub const fn can_send(&self, size: u32) -> bool {
        size <= self.max_payload && size >= MIN_PAYLOAD
    }
}

/// Negotiate the effective MTU between a local and remote interface.
pub const fn negotiate(local_mtu: u32, remote_mtu: u32, vlan: bool) -> Negotiated {
    let effective = if local_mtu < remote_mtu { local_mtu } else { remote_mtu };
    Negotiated {
        local_mtu,
        remote_mtu,
        effective_mtu: effective,
        max_payload: max_payload(effective, vlan),
        has_vlan: vlan,
        jumbo_capable: local_mtu >= JUMBO_MTU && remote_mtu >= JUMBO_MTU,
    }
}

/// Lazily yield the subset of `sizes` whose frames fit inside `mtu`.
pub fn filter_sizes<I>(sizes: I, mtu: u32, vlan: bool) -> impl Iterator<Item = u32>
where
    I: IntoIterator<Item = u32>,
{
    sizes.into_iter().filter(move |&size| fits(size, mtu, vlan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_arithmetic() {
        assert_eq!(header_len(false), 14);
        assert_eq!(header_len(true), 18);
        assert_eq!(max_payload(1500, false), 1486);
        assert_eq!(max_payload(1500, true), 1482);
        assert_eq!(required_mtu(1486, false), 1500);
        assert_eq!(required_mtu(1482, true), 1500);
    }

    #[test]
    fn test_purity_invariants() {
        for mtu in [68u32, 1500, 9000] {
            for vlan in [false, true] {
                assert_eq!(max_payload(mtu, vlan) + header_len(vlan), mtu);
            }
        }
        for payload in [0u32, 46, 1486, 8982] {
            for vlan in [false, true] {
                assert!(fits(payload, required_mtu(payload, vlan), vlan));
            }
        }
    }

    #[test]
    fn test_fits_boundaries() {
        assert!(fits(1486, 1500, false));
        assert!(!fits(1487, 1500, false));
        assert!(fits(1482, 1500, true));
        assert!(!fits(1483, 1500, true));
    }

    #[test]
    fn test_negotiate_asymmetric() {
        let n = negotiate(9000, 1500, false);
        assert_eq!(n.effective_mtu, 1500);
        assert_eq!(n.max_payload, 1486);
        assert!(!n.jumbo_capable);
    }

    #[test]
    fn test_negotiate_jumbo() {
        let n = negotiate(9000, 9216, true);
        assert_eq!(n.effective_mtu, 9000);
        assert_eq!(n.max_payload, 8982);
        assert!(n.jumbo_capable);
    }

    #[test]
    fn test_can_send_respects_minimum() {
        let n = negotiate(1500, 1500, false);
        assert!(n.can_send(46));
        assert!(n.can_send(1486));
        assert!(!n.can_send(45));
        assert!(!n.can_send(1487));
    }

    #[test]
    fn test_filter_sizes() {
        let sizes = [64u32, 128, 256, 512, 1024, 1400, 4096, 8192];
        let kept: Vec<u32> = filter_sizes(sizes, 1500, false).collect();
        assert_eq!(kept, vec![64, 128, 256, 512, 1024, 1400]);

        let kept: Vec<u32> = filter_sizes(sizes, 9000, false).collect();
        assert_eq!(kept.len(), 8);
    }
}
