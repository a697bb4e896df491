//! Interface descriptors and subnet containment (§3, §4.3 I1/I2/P2/P5).

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A single declared local network interface: its address, broadcast address,
/// and subnet mask. Immutable after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub local_ip: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl Interface {
    pub fn new(local_ip: Ipv4Addr, broadcast: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Interface {
            local_ip,
            broadcast,
            mask,
        }
    }

    /// `ip ∈ subnet` as `ip & mask == local_ip & mask`.
    pub fn contains(&self, ip: &Ipv4Addr) -> bool {
        match_ipv4(ip, &self.local_ip, &self.mask)
    }
}

/// Shared subnet-containment test, usable both for interface matching and for
/// the raw `Ipv4Addr` masking the listener binds against.
pub fn match_ipv4(addr: &Ipv4Addr, reference: &Ipv4Addr, mask: &Ipv4Addr) -> bool {
    let a = u32::from(*addr) & u32::from(*mask);
    let b = u32::from(*reference) & u32::from(*mask);
    a == b
}

/// Return the first declared interface whose subnet contains `ip`, or `None`
/// if `ip` isn't on any declared local subnet.
pub fn find_matching(interfaces: &[Interface], ip: &Ipv4Addr) -> Option<Interface> {
    interfaces.iter().copied().find(|iface| iface.contains(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustive_subnet_containment_on_byte_boundaries() {
        // Exhaustive over last-octet values for a /24, matching P5's exhaustive
        // mask-byte-boundary requirement without pulling in a property-test crate.
        let iface = Interface::new(
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(192, 168, 1, 255),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        for last in 0u8..=255 {
            let ip = Ipv4Addr::new(192, 168, 1, last);
            assert!(iface.contains(&ip), "{ip} should be in 192.168.1.0/24");
        }
        for last in 0u8..=255 {
            let ip = Ipv4Addr::new(192, 168, 2, last);
            assert!(!iface.contains(&ip), "{ip} should not be in 192.168.1.0/24");
        }
    }

    #[test]
    fn exhaustive_on_non_octet_masks() {
        // /22 spans four third-octet values; still must respect the mask exactly.
        let iface = Interface::new(
            Ipv4Addr::new(10, 0, 4, 1),
            Ipv4Addr::new(10, 0, 7, 255),
            Ipv4Addr::new(255, 255, 252, 0),
        );
        for third in 4u8..=7 {
            for last in [0u8, 1, 128, 255] {
                let ip = Ipv4Addr::new(10, 0, third, last);
                assert!(iface.contains(&ip));
            }
        }
        assert!(!iface.contains(&Ipv4Addr::new(10, 0, 8, 0)));
        assert!(!iface.contains(&Ipv4Addr::new(10, 0, 3, 255)));
    }

    #[test]
    fn find_matching_picks_the_right_interface() {
        let ifaces = [
            Interface::new(
                Ipv4Addr::new(172, 16, 0, 108),
                Ipv4Addr::new(172, 16, 0, 255),
                Ipv4Addr::new(255, 255, 255, 0),
            ),
            Interface::new(
                Ipv4Addr::new(192, 168, 100, 100),
                Ipv4Addr::new(192, 168, 100, 255),
                Ipv4Addr::new(255, 255, 255, 0),
            ),
        ];
        let m = find_matching(&ifaces, &Ipv4Addr::new(172, 16, 0, 50)).unwrap();
        assert_eq!(m.local_ip, Ipv4Addr::new(172, 16, 0, 108));
        assert!(find_matching(&ifaces, &Ipv4Addr::new(10, 10, 99, 5)).is_none());
    }
}
