use std::net::Ipv4Addr;

use ipnetwork::Ipv6Network;
use prismdns_domain::synthetic::{
    decode, embed, is_overlay_prefix, is_synthetic, DEFAULT_PREFIX_SUBNET,
};
use prismdns_domain::DomainError;

fn default_prefix() -> [u8; 16] {
    let network: Ipv6Network = DEFAULT_PREFIX_SUBNET.parse().unwrap();
    network.network().octets()
}

#[test]
fn test_embed_layout_is_byte_exact() {
    let addr = embed(&default_prefix(), 42, Ipv4Addr::new(203, 0, 113, 7));

    assert_eq!(
        addr.octets(),
        [
            0xfd, 0x7a, 0x11, 0x5c, 0xa1, 0xe0, 0x0b, 0x1a, // overlay prefix
            0x00, 0x00, // reserved
            0x00, 0x2a, // site id 42
            0xcb, 0x00, 0x71, 0x07, // 203.0.113.7
        ]
    );
}

#[test]
fn test_decode_inverts_embed() {
    let site_id = 0xbeef;
    let v4 = Ipv4Addr::new(10, 20, 30, 40);
    let addr = embed(&default_prefix(), site_id, v4);

    assert!(is_synthetic(addr));
    assert_eq!(decode(addr).unwrap(), (site_id, v4));
}

#[test]
fn test_decode_rejects_any_one_bit_deviation_in_marker() {
    let addr = embed(&default_prefix(), 100, Ipv4Addr::new(192, 168, 1, 1));

    for byte in 0..10 {
        for bit in 0..8 {
            let mut octets = addr.octets();
            octets[byte] ^= 1 << bit;
            let tweaked = octets.into();

            assert!(!is_synthetic(tweaked));
            assert!(matches!(decode(tweaked), Err(DomainError::NotSynthetic)));
        }
    }
}

#[test]
fn test_decode_accepts_deviation_outside_marker() {
    let addr = embed(&default_prefix(), 100, Ipv4Addr::new(192, 168, 1, 1));

    let mut octets = addr.octets();
    octets[11] ^= 0x01; // site id bits are payload, not marker
    assert!(decode(octets.into()).is_ok());
}

#[test]
fn test_overlay_prefix_check() {
    let inside: Ipv6Network = DEFAULT_PREFIX_SUBNET.parse().unwrap();
    assert!(is_overlay_prefix(&inside));

    // Differs in byte 7 of the network address.
    let near_miss: Ipv6Network = "fd7a:115c:a1e0:b1b::/64".parse().unwrap();
    assert!(!is_overlay_prefix(&near_miss));

    let outside: Ipv6Network = "2001:db8::/32".parse().unwrap();
    assert!(!is_overlay_prefix(&outside));
}
