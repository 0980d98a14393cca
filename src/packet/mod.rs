//! Ethernet frame construction and parsing.
//!
//! Key design principle: minimize allocations by writing into caller-owned
//! buffers where possible. The `*_into` builders never allocate; parsers
//! borrow the received buffer and return slices into it.

pub mod frame;
pub mod vlan;

pub use frame::{build_frame, build_frame_into, FrameBuilder, FrameParser};
pub use vlan::{
    build_vlan_frame, build_vlan_frame_into, is_vlan_tagged, strip_vlan_tag, Tci, VlanFrameBuilder,
};

/// Ethernet II header: dst(6) + src(6) + ethertype(2).
pub const ETH_HEADER_LEN: usize = 14;

/// 802.1Q tag: TPID(2) + TCI(2), inserted after the source address.
pub const VLAN_TAG_LEN: usize = 4;

/// Header length of a tagged frame.
pub const ETH_VLAN_HEADER_LEN: usize = ETH_HEADER_LEN + VLAN_TAG_LEN;

/// Largest payload this library will build (conventional jumbo limit).
pub const MAX_JUMBO_PAYLOAD: usize = 9000;

/// 802.1Q tag protocol identifier (structural, not a payload type).
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// Default experimental payload ethertype.
pub const ETHERTYPE_CUSTOM: u16 = 0x88B5;

/// Loopback IPC channel ethertype.
pub const ETHERTYPE_IPC: u16 = 0xAAAA;

/// Benchmark traffic ethertype.
pub const ETHERTYPE_BENCH: u16 = 0xBEEF;

/// Highest valid VLAN identifier (12 bits).
pub const MAX_VLAN_ID: u16 = 4095;

/// Highest valid VLAN priority (3 bits).
pub const MAX_PRIORITY: u8 = 7;
