//! End-to-end codec scenarios over literal byte layouts.

use l2link::mac::MacAddress;
use l2link::packet::{
    build_frame, build_vlan_frame, strip_vlan_tag, FrameParser, Tci, ETHERTYPE_CUSTOM,
};

const DST: MacAddress = MacAddress::new(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF);
const SRC: MacAddress = MacAddress::new(0x11, 0x22, 0x33, 0x44, 0x55, 0x66);

#[test]
fn minimal_broadcast_frame_layout() {
    let src = MacAddress::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55);
    let frame = build_frame(MacAddress::BROADCAST, src, 0x0800, b"");

    assert_eq!(frame.len(), 14);
    assert_eq!(&frame[0..6], &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(&frame[6..12], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    assert_eq!(&frame[12..14], &[0x08, 0x00]);
}

#[test]
fn tagged_frame_layout() {
    let frame =
        build_vlan_frame(DST, SRC, Tci::new(7, false, 10), ETHERTYPE_CUSTOM, b"TEST").unwrap();

    assert_eq!(frame.len(), 22);
    assert_eq!(&frame[12..14], &[0x81, 0x00]);
    assert_eq!(&frame[14..16], &[0xE0, 0x0A]);
    assert_eq!(&frame[16..18], &[0x88, 0xB5]);
    assert_eq!(&frame[18..22], &[0x54, 0x45, 0x53, 0x54]);
}

#[test]
fn echo_swap_produces_pong() {
    let local_mac = MacAddress::new(0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01);

    // a tagged request arrives from SRC
    let mut request_payload = b"TEST".to_vec();
    request_payload[0] = 0x01;
    let request =
        build_vlan_frame(DST, SRC, Tci::new(7, false, 10), ETHERTYPE_CUSTOM, &request_payload)
            .unwrap();

    // echo logic: swap addresses, flip the type byte
    let parser = FrameParser::new(&request);
    let mut response_payload = parser.payload().to_vec();
    response_payload[0] = 0x02;
    let response = build_vlan_frame(
        parser.src_mac(),
        local_mac,
        Tci::new(7, false, 10),
        ETHERTYPE_CUSTOM,
        &response_payload,
    )
    .unwrap();

    assert_eq!(&response[0..6], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    assert_eq!(&response[6..12], local_mac.as_bytes());
    assert_eq!(response[18], 0x02);
}

#[test]
fn roundtrip_across_payload_sizes() {
    for len in [0usize, 1, 46, 64, 1400, 1500, 4096, 9000] {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        let frame = build_frame(DST, SRC, ETHERTYPE_CUSTOM, &payload);
        let parser = FrameParser::new(&frame);
        assert!(parser.is_valid());
        assert_eq!(parser.dest_mac(), DST);
        assert_eq!(parser.src_mac(), SRC);
        assert_eq!(parser.ethertype(), ETHERTYPE_CUSTOM);
        assert_eq!(parser.payload(), &payload[..]);

        let tci = Tci::new((len % 8) as u8, len % 2 == 0, (len % 4096) as u16);
        let tagged = build_vlan_frame(DST, SRC, tci, ETHERTYPE_CUSTOM, &payload).unwrap();
        let parser = FrameParser::new(&tagged);
        assert!(parser.is_valid());
        assert!(parser.has_vlan());
        assert_eq!(parser.vlan_id(), tci.vlan_id);
        assert_eq!(parser.priority(), tci.priority);
        assert_eq!(parser.dei(), tci.dei);
        assert_eq!(parser.payload(), &payload[..]);
    }
}

#[test]
fn strip_is_idempotent_on_parse_results() {
    let tci = Tci::new(3, false, 1234);
    let tagged = build_vlan_frame(DST, SRC, tci, ETHERTYPE_CUSTOM, b"payload bytes").unwrap();

    let before = FrameParser::new(&tagged);
    let stripped = strip_vlan_tag(&tagged).unwrap();
    let after = FrameParser::new(&stripped);

    assert!(!after.has_vlan());
    assert_eq!(after.dest_mac(), before.dest_mac());
    assert_eq!(after.src_mac(), before.src_mac());
    assert_eq!(after.ethertype(), before.ethertype());
    assert_eq!(after.payload(), before.payload());

    // stripping an already-untagged frame changes nothing
    assert_eq!(strip_vlan_tag(&stripped).unwrap(), stripped);
}
