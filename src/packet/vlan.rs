//! 802.1Q VLAN tagging: TCI encoding and tagged frame construction.

use crate::error::{Error, Result};
use crate::mac::MacAddress;

use super::{
    ETHERTYPE_VLAN, ETH_HEADER_LEN, ETH_VLAN_HEADER_LEN, MAX_PRIORITY, MAX_VLAN_ID, VLAN_TAG_LEN,
};

/// Tag Control Information: priority (3 bits), drop-eligibility (1 bit),
/// VLAN identifier (12 bits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tci {
    pub priority: u8,
    pub dei: bool,
    pub vlan_id: u16,
}

impl Tci {
    pub const fn new(priority: u8, dei: bool, vlan_id: u16) -> Self {
        Self { priority, dei, vlan_id }
    }

    /// Both fields inside their wire ranges.
    pub const fn is_valid(&self) -> bool {
        self.priority <= MAX_PRIORITY && self.vlan_id <= MAX_VLAN_ID
    }

    /// Encode to the 16-bit wire value: `priority<<13 | dei<<12 | vlan_id`.
    pub const fn encode(&self) -> u16 {
        ((self.priority as u16) << 13) | ((self.dei as u16) << 12) | (self.vlan_id & 0x0FFF)
    }

    /// Decode from the 16-bit wire value.
    pub const fn decode(tci: u16) -> Self {
        Self {
            priority: ((tci >> 13) & 0x07) as u8,
            dei: (tci >> 12) & 0x01 != 0,
            vlan_id: tci & 0x0FFF,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.vlan_id > MAX_VLAN_ID {
            return Err(Error::InvalidVlanId(self.vlan_id));
        }
        if self.priority > MAX_PRIORITY {
            return Err(Error::InvalidPriority(self.priority));
        }
        Ok(())
    }
}

/// Build an 802.1Q-tagged frame into a fresh buffer.
///
/// This is the only place TCI ranges are enforced; out-of-range values fail
/// with `InvalidVlanId` / `InvalidPriority`.
pub fn build_vlan_frame(
    dst: MacAddress,
    src: MacAddress,
    tci: Tci,
    inner_ethertype: u16,
    payload: &[u8],
) -> Result<Vec<u8>> {
    tci.validate()?;
    let mut buf = vec![0u8; ETH_VLAN_HEADER_LEN + payload.len()];
    build_vlan_frame_into(dst, src, tci, inner_ethertype, payload, &mut buf)?;
    Ok(buf)
}

/// Build a tagged frame into a caller-owned buffer. No allocation.
pub fn build_vlan_frame_into(
    dst: MacAddress,
    src: MacAddress,
    tci: Tci,
    inner_ethertype: u16,
    payload: &[u8],
    buf: &mut [u8],
) -> Result<usize> {
    tci.validate()?;

    let total = ETH_VLAN_HEADER_LEN + payload.len();
    if buf.len() < total {
        return Err(Error::BufferTooSmall { needed: total, capacity: buf.len() });
    }

    buf[0..6].copy_from_slice(dst.as_bytes());
    buf[6..12].copy_from_slice(src.as_bytes());
    buf[12..14].copy_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
    buf[14..16].copy_from_slice(&tci.encode().to_be_bytes());
    buf[16..18].copy_from_slice(&inner_ethertype.to_be_bytes());
    buf[ETH_VLAN_HEADER_LEN..total].copy_from_slice(payload);

    Ok(total)
}

/// Fluent builder for tagged frames.
#[derive(Debug, Default, Clone)]
pub struct VlanFrameBuilder {
    dst: MacAddress,
    src: MacAddress,
    tci: Tci,
    inner_ethertype: u16,
    payload: Vec<u8>,
}

impl VlanFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dest(mut self, mac: MacAddress) -> Self {
        self.dst = mac;
        self
    }

    pub fn source(mut self, mac: MacAddress) -> Self {
        self.src = mac;
        self
    }

    pub fn vlan_id(mut self, id: u16) -> Self {
        self.tci.vlan_id = id;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.tci.priority = priority;
        self
    }

    pub fn dei(mut self, dei: bool) -> Self {
        self.tci.dei = dei;
        self
    }

    pub fn tci(mut self, tci: Tci) -> Self {
        self.tci = tci;
        self
    }

    pub fn inner_ethertype(mut self, ethertype: u16) -> Self {
        self.inner_ethertype = ethertype;
        self
    }

    pub fn payload(mut self, data: impl AsRef<[u8]>) -> Self {
        self.payload = data.as_ref().to_vec();
        self
    }

    pub fn required_len(&self) -> usize {
        ETH_VLAN_HEADER_LEN + self.payload.len()
    }

    pub fn build(self) -> Result<Vec<u8>> {
        build_vlan_frame(self.dst, self.src, self.tci, self.inner_ethertype, &self.payload)
    }

    pub fn build_into(&self, buf: &mut [u8]) -> Result<usize> {
        build_vlan_frame_into(self.dst, self.src, self.tci, self.inner_ethertype, &self.payload, buf)
    }
}

/// True when the type field at offset 12 is the 802.1Q TPID.
pub fn is_vlan_tagged(frame: &[u8]) -> bool {
    frame.len() >= ETH_HEADER_LEN && u16::from_be_bytes([frame[12], frame[13]]) == ETHERTYPE_VLAN
}

/// Return a copy of `frame` with the 4-byte tag removed, so the inner
/// ethertype moves to offset 12. Untagged input is copied unchanged; a
/// tagged frame shorter than the tagged header fails with
/// `InvalidFrameSize`.
pub fn strip_vlan_tag(frame: &[u8]) -> Result<Vec<u8>> {
    if !is_vlan_tagged(frame) {
        return Ok(frame.to_vec());
    }
    if frame.len() < ETH_VLAN_HEADER_LEN {
        return Err(Error::InvalidFrameSize(frame.len()));
    }

    let mut out = Vec::with_capacity(frame.len() - VLAN_TAG_LEN);
    out.extend_from_slice(&frame[..12]);
    out.extend_from_slice(&frame[16..]);
    Ok(out)
}
