//! Source-address classification for the access gate.

use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientClass {
    /// Loopback, overlay CGNAT IPv4, or overlay ULA IPv6.
    Overlay,
    /// Everything else. External clients only reach zones that
    /// explicitly admit them.
    External,
}

impl ClientClass {
    pub fn is_overlay(&self) -> bool {
        matches!(self, ClientClass::Overlay)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientClass::Overlay => "overlay",
            ClientClass::External => "external",
        }
    }
}

/// Classifies a client source address.
///
/// Overlay clients are loopback addresses (internal probes), IPv4 in
/// the overlay's reserved CGNAT range `100.64.0.0/10`, or IPv6 under
/// the overlay ULA `fd7a:115c:a1e0::/48`.
pub fn classify(ip: IpAddr) -> ClientClass {
    let overlay = match ip {
        ip if ip.is_loopback() => true,
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 100 && (o[1] & 0xc0) == 0x40
        }
        IpAddr::V6(v6) => v6.octets()[..6] == [0xfd, 0x7a, 0x11, 0x5c, 0xa1, 0xe0],
    };

    if overlay {
        ClientClass::Overlay
    } else {
        ClientClass::External
    }
}
