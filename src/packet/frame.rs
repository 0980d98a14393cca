//! Ethernet II frame builder and zero-copy parser.

use crate::error::{Error, Result};
use crate::mac::MacAddress;

use super::{ETHERTYPE_VLAN, ETH_HEADER_LEN, ETH_VLAN_HEADER_LEN};

/// Build an untagged Ethernet II frame into a fresh buffer.
///
/// The returned buffer is exactly `14 + payload.len()` bytes; the ethertype
/// is written big-endian at offset 12.
pub fn build_frame(dst: MacAddress, src: MacAddress, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; ETH_HEADER_LEN + payload.len()];
    // infallible: the buffer is sized to fit by construction
    let _ = build_frame_into(dst, src, ethertype, payload, &mut buf);
    buf
}

/// Build an untagged frame into a caller-owned buffer, returning the number
/// of bytes written. No allocation.
pub fn build_frame_into(
    dst: MacAddress,
    src: MacAddress,
    ethertype: u16,
    payload: &[u8],
    buf: &mut [u8],
) -> Result<usize> {
    let total = ETH_HEADER_LEN + payload.len();
    if buf.len() < total {
        return Err(Error::BufferTooSmall { needed: total, capacity: buf.len() });
    }

    buf[0..6].copy_from_slice(dst.as_bytes());
    buf[6..12].copy_from_slice(src.as_bytes());
    buf[12..14].copy_from_slice(&ethertype.to_be_bytes());
    buf[ETH_HEADER_LEN..total].copy_from_slice(payload);

    Ok(total)
}

/// Fluent builder for untagged frames.
///
/// Consuming-self setters; validation and byte assembly happen in
/// [`build`](FrameBuilder::build) / [`build_into`](FrameBuilder::build_into).
#[derive(Debug, Default, Clone)]
pub struct FrameBuilder {
    dst: MacAddress,
    src: MacAddress,
    ethertype: u16,
    payload: Vec<u8>,
}

impl FrameBuilder {
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

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    pub fn payload(mut self, data: impl AsRef<[u8]>) -> Self {
        self.payload = data.as_ref().to_vec();
        self
    }

    /// Size the built frame will occupy.
    pub fn required_len(&self) -> usize {
        ETH_HEADER_LEN + self.payload.len()
    }

    pub fn build(self) -> Vec<u8> {
        build_frame(self.dst, self.src, self.ethertype, &self.payload)
    }

    pub fn build_into(&self, buf: &mut [u8]) -> Result<usize> {
        build_frame_into(self.dst, self.src, self.ethertype, &self.payload, buf)
    }
}

/// Zero-copy view over a received Ethernet frame.
///
/// One structural pass runs at construction: a frame is valid iff it holds a
/// full 14-byte header and, when the type field at offset 12 is 0x8100, a
/// full 18-byte tagged header. Accessors on an invalid parser return the
/// null MAC / zero / empty slice and never index out of range.
#[derive(Debug, Clone, Copy)]
pub struct FrameParser<'a> {
    data: &'a [u8],
    valid: bool,
    tagged: bool,
}

impl<'a> FrameParser<'a> {
    /// Parse a received byte range.
    pub fn new(data: &'a [u8]) -> Self {
        let mut parser = Self { data: &[], valid: false, tagged: false };
        parser.parse(data);
        parser
    }

    /// Re-seat the parser onto a new range; validity is recomputed.
    pub fn parse(&mut self, data: &'a [u8]) -> bool {
        self.data = data;
        self.valid = false;
        self.tagged = false;

        if data.len() < ETH_HEADER_LEN {
            return false;
        }

        let type_field = u16::from_be_bytes([data[12], data[13]]);
        if type_field == ETHERTYPE_VLAN {
            self.tagged = true;
            if data.len() < ETH_VLAN_HEADER_LEN {
                return false;
            }
        }

        self.valid = true;
        true
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn has_vlan(&self) -> bool {
        self.valid && self.tagged
    }

    pub fn dest_mac(&self) -> MacAddress {
        if !self.valid {
            return MacAddress::NULL;
        }
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&self.data[0..6]);
        MacAddress::from_octets(octets)
    }

    pub fn src_mac(&self) -> MacAddress {
        if !self.valid {
            return MacAddress::NULL;
        }
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&self.data[6..12]);
        MacAddress::from_octets(octets)
    }

    /// The payload ethertype: offset 16 when tagged, else offset 12.
    pub fn ethertype(&self) -> u16 {
        if !self.valid {
            return 0;
        }
        if self.tagged {
            u16::from_be_bytes([self.data[16], self.data[17]])
        } else {
            u16::from_be_bytes([self.data[12], self.data[13]])
        }
    }

    fn tci(&self) -> u16 {
        if !self.valid || !self.tagged {
            return 0;
        }
        u16::from_be_bytes([self.data[14], self.data[15]])
    }

    /// VLAN identifier; 0 for untagged frames.
    pub fn vlan_id(&self) -> u16 {
        self.tci() & 0x0FFF
    }

    /// VLAN priority; 0 for untagged frames.
    pub fn priority(&self) -> u8 {
        ((self.tci() >> 13) & 0x07) as u8
    }

    /// Drop-eligibility indicator; false for untagged frames.
    pub fn dei(&self) -> bool {
        (self.tci() >> 12) & 0x01 != 0
    }

    /// Header length for this frame: 18 when tagged, else 14.
    pub fn header_len(&self) -> usize {
        if self.tagged {
            ETH_VLAN_HEADER_LEN
        } else {
            ETH_HEADER_LEN
        }
    }

    /// The payload bytes after the header. Empty for invalid frames.
    pub fn payload(&self) -> &'a [u8] {
        if !self.valid {
            return &[];
        }
        &self.data[self.header_len()..]
    }

    pub fn payload_len(&self) -> usize {
        self.payload().len()
    }

    /// The whole borrowed range.
    pub fn raw(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ETHERTYPE_CUSTOM;

    const DST: MacAddress = MacAddress::new(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF);
    const SRC: MacAddress = MacAddress::new(0x11, 0x22, 0x33, 0x44, 0x55, 0x66);

    #[test]
    fn test_build_minimal_frame() {
        let frame = build_frame(MacAddress::BROADCAST, MacAddress::new(0, 0x11, 0x22, 0x33, 0x44, 0x55), 0x0800, &[]);
        assert_eq!(frame.len(), 14);
        assert_eq!(&frame[0..6], &[0xFF; 6]);
        assert_eq!(&frame[6..12], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(&frame[12..14], &[0x08, 0x00]);
    }

    #[test]
    fn test_build_frame_with_payload() {
        let frame = build_frame(DST, SRC, ETHERTYPE_CUSTOM, b"test payload data");
        assert_eq!(frame.len(), 14 + 17);
        assert_eq!(&frame[14..], b"test payload data");
    }

    #[test]
    fn test_build_into_insufficient_buffer() {
        let mut buf = [0u8; 10];
        let err = build_frame_into(DST, SRC, 0x0800, &[], &mut buf).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { needed: 14, capacity: 10 }));
    }

    #[test]
    fn test_build_into_reports_written_length() {
        let mut buf = [0u8; 64];
        let written = build_frame_into(DST, SRC, 0x0800, b"HI", &mut buf).unwrap();
        assert_eq!(written, 16);

        let parser = FrameParser::new(&buf[..written]);
        assert!(parser.is_valid());
        assert_eq!(parser.dest_mac(), DST);
        assert_eq!(parser.src_mac(), SRC);
        assert_eq!(parser.ethertype(), 0x0800);
        assert_eq!(parser.payload(), b"HI");
    }

    #[test]
    fn test_builder_required_len() {
        let builder = FrameBuilder::new();
        assert_eq!(builder.required_len(), 14);
        let builder = builder.payload("hello");
        assert_eq!(builder.required_len(), 19);
    }

    #[test]
    fn test_roundtrip() {
        let payload: Vec<u8> = (0..200u8).collect();
        let frame = build_frame(DST, SRC, ETHERTYPE_CUSTOM, &payload);
        let parser = FrameParser::new(&frame);
        assert!(parser.is_valid());
        assert!(!parser.has_vlan());
        assert_eq!(parser.dest_mac(), DST);
        assert_eq!(parser.src_mac(), SRC);
        assert_eq!(parser.ethertype(), ETHERTYPE_CUSTOM);
        assert_eq!(parser.payload(), &payload[..]);
        assert_eq!(parser.header_len(), 14);
    }

    #[test]
    fn test_parse_boundary_lengths() {
        // 13 bytes: invalid
        assert!(!FrameParser::new(&[0u8; 13]).is_valid());
        // 14 bytes: valid untagged
        let parser = FrameParser::new(&[0u8; 14]);
        assert!(parser.is_valid());
        assert!(!parser.has_vlan());
        assert_eq!(parser.payload_len(), 0);
    }

    #[test]
    fn test_parse_tagged_boundary_lengths() {
        let mut data = [0u8; 17];
        data[12] = 0x81;
        data[13] = 0x00;
        assert!(!FrameParser::new(&data).is_valid());

        let mut data = [0u8; 18];
        data[12] = 0x81;
        data[13] = 0x00;
        let parser = FrameParser::new(&data);
        assert!(parser.is_valid());
        assert!(parser.has_vlan());
    }

    #[test]
    fn test_invalid_parser_accessors_are_safe() {
        let parser = FrameParser::new(&[]);
        assert!(!parser.is_valid());
        assert_eq!(parser.dest_mac(), MacAddress::NULL);
        assert_eq!(parser.src_mac(), MacAddress::NULL);
        assert_eq!(parser.ethertype(), 0);
        assert_eq!(parser.vlan_id(), 0);
        assert_eq!(parser.priority(), 0);
        assert!(parser.payload().is_empty());
    }

    #[test]
    fn test_reparse_recomputes_validity() {
        let frame = build_frame(DST, SRC, 0x0800, b"x");
        let mut parser = FrameParser::new(&frame);
        assert!(parser.is_valid());
        assert!(!parser.parse(&frame[..10]));
        assert!(!parser.is_valid());
    }
}
