//! The synthetic address layout.
//!
//! A synthetic AAAA answer packs three things into one IPv6 address:
//! the reserved overlay prefix, a per-zone site identifier, and the
//! IPv4 address of the resolved reflected target.
//!
//! ```text
//! bytes  0..7   fixed overlay prefix  fd 7a 11 5c a1 e0 0b 1a
//! bytes  8..9   reserved              00 00
//! bytes 10..11  site id               big-endian u16, nonzero
//! bytes 12..15  embedded IPv4
//! ```
//!
//! An address is synthetic iff its first ten bytes equal the marker
//! exactly; `decode` rejects everything else.

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnetwork::Ipv6Network;

use crate::errors::DomainError;

/// First 8 bytes of every prefix subnet a zone may configure.
pub const OVERLAY_PREFIX: [u8; 8] = [0xfd, 0x7a, 0x11, 0x5c, 0xa1, 0xe0, 0x0b, 0x1a];

/// First 10 bytes of every synthetic address (prefix + reserved zeros).
pub const SYNTHETIC_MARKER: [u8; 10] =
    [0xfd, 0x7a, 0x11, 0x5c, 0xa1, 0xe0, 0x0b, 0x1a, 0x00, 0x00];

/// Prefix subnet applied to synthesis zones that do not configure one.
pub const DEFAULT_PREFIX_SUBNET: &str = "fd7a:115c:a1e0:b1a::/64";

/// Builds a synthetic address from a zone's prefix network address, its
/// site id and a resolved IPv4.
pub fn embed(prefix: &[u8; 16], site_id: u16, v4: Ipv4Addr) -> Ipv6Addr {
    let mut octets = *prefix;
    octets[10..12].copy_from_slice(&site_id.to_be_bytes());
    octets[12..16].copy_from_slice(&v4.octets());
    Ipv6Addr::from(octets)
}

/// Inverse of [`embed`]: recovers the site id and embedded IPv4.
pub fn decode(addr: Ipv6Addr) -> Result<(u16, Ipv4Addr), DomainError> {
    let octets = addr.octets();
    if octets[..10] != SYNTHETIC_MARKER {
        return Err(DomainError::NotSynthetic);
    }
    let site_id = u16::from_be_bytes([octets[10], octets[11]]);
    let v4 = Ipv4Addr::new(octets[12], octets[13], octets[14], octets[15]);
    Ok((site_id, v4))
}

pub fn is_synthetic(addr: Ipv6Addr) -> bool {
    addr.octets()[..10] == SYNTHETIC_MARKER
}

/// Whether a configured prefix subnet lies within the reserved overlay
/// range (first 8 bytes of the network address equal the constant).
pub fn is_overlay_prefix(network: &Ipv6Network) -> bool {
    network.network().octets()[..8] == OVERLAY_PREFIX
}
