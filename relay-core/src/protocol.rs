//! Protocol descriptors: the fixed set of discovery protocols the relay understands.

use std::net::Ipv4Addr;

/// Static description of one discovery protocol: its well-known port, optional
/// multicast group, wire TTL, and whether broadcast delivery applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    pub name: &'static str,
    pub port: u16,
    pub multicast_group: Option<Ipv4Addr>,
    pub ttl: u8,
    pub use_broadcast: bool,
}

pub const RAAT: Protocol = Protocol {
    name: "RAAT",
    port: 9003,
    multicast_group: Some(Ipv4Addr::new(239, 255, 90, 90)),
    ttl: 64,
    use_broadcast: true,
};

pub const AIRPLAY: Protocol = Protocol {
    name: "AirPlay",
    port: 5353,
    multicast_group: Some(Ipv4Addr::new(224, 0, 0, 251)),
    ttl: 255,
    use_broadcast: false,
};

pub const SSDP: Protocol = Protocol {
    name: "SSDP",
    port: 1900,
    multicast_group: Some(Ipv4Addr::new(239, 255, 255, 250)),
    ttl: 4,
    use_broadcast: true,
};

pub const SQUEEZEBOX: Protocol = Protocol {
    name: "Squeezebox",
    port: 3483,
    multicast_group: None,
    ttl: 64,
    use_broadcast: true,
};

/// All four built-in protocols, in the order they're checked against config flags.
pub const ALL: [Protocol; 4] = [RAAT, AIRPLAY, SSDP, SQUEEZEBOX];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_fidelity() {
        assert_eq!(RAAT.ttl, 64);
        assert_eq!(AIRPLAY.ttl, 255);
        assert_eq!(SSDP.ttl, 4);
        assert_eq!(SQUEEZEBOX.ttl, 64);
    }

    #[test]
    fn ports_are_unique() {
        let mut ports: Vec<u16> = ALL.iter().map(|p| p.port).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), ALL.len());
    }
}
