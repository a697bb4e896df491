//! On-disk JSON configuration shape (§3, §6) and its conversion into the
//! runtime types the forwarding engine actually operates on.

use crate::iface::Interface;
use crate::protocol;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot parse '{0}' as an IPv4 address: {1}")]
    InvalidAddress(String, String),
}

/// One entry of `LocalInterfaces` as it appears in the JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInterface {
    #[serde(rename = "LocalIp")]
    pub local_ip: String,
    #[serde(rename = "BroadcastAddress")]
    pub broadcast_address: String,
    #[serde(rename = "SubnetMask")]
    pub subnet_mask: String,
}

impl RawInterface {
    pub fn resolve(&self) -> Result<Interface, ConfigError> {
        let parse = |s: &str| -> Result<Ipv4Addr, ConfigError> {
            s.parse()
                .map_err(|e: std::net::AddrParseError| {
                    ConfigError::InvalidAddress(s.to_string(), e.to_string())
                })
        };
        Ok(Interface::new(
            parse(&self.local_ip)?,
            parse(&self.broadcast_address)?,
            parse(&self.subnet_mask)?,
        ))
    }
}

fn default_true() -> bool {
    true
}

/// Which of the four built-in protocols are enabled. Missing from the JSON
/// entirely ⇒ only RAAT (§6); an individual missing field within a present
/// `Protocols` object defaults the same way, field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFlags {
    #[serde(rename = "Raat", default = "default_true")]
    pub raat: bool,
    #[serde(rename = "AirPlay", default)]
    pub airplay: bool,
    #[serde(rename = "Ssdp", default)]
    pub ssdp: bool,
    #[serde(rename = "Squeezebox", default)]
    pub squeezebox: bool,
}

impl Default for ProtocolFlags {
    fn default() -> Self {
        ProtocolFlags {
            raat: true,
            airplay: false,
            ssdp: false,
            squeezebox: false,
        }
    }
}

impl ProtocolFlags {
    /// The built-in protocol descriptors enabled by this set of flags, in
    /// the fixed declaration order from §3.
    pub fn enabled(&self) -> Vec<protocol::Protocol> {
        let mut out = Vec::with_capacity(4);
        if self.raat {
            out.push(protocol::RAAT);
        }
        if self.airplay {
            out.push(protocol::AIRPLAY);
        }
        if self.ssdp {
            out.push(protocol::SSDP);
        }
        if self.squeezebox {
            out.push(protocol::SQUEEZEBOX);
        }
        out
    }
}

/// The relay's top-level configuration file, deserialized verbatim from JSON
/// with the casing given in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "SiteName")]
    pub site_name: String,
    #[serde(rename = "TunnelPort")]
    pub tunnel_port: u16,
    #[serde(rename = "RemoteRelayIp", default)]
    pub remote_relay_ip: String,
    #[serde(rename = "LocalInterfaces", default)]
    pub local_interfaces: Vec<RawInterface>,
    #[serde(rename = "UnicastTargets", default)]
    pub unicast_targets: Option<Vec<String>>,
    #[serde(rename = "Protocols", default)]
    pub protocols: ProtocolFlags,
}

impl Configuration {
    /// A self-describing default configuration written out when the file at
    /// the given path doesn't exist yet (§6, §2.2): one interface, RAAT and
    /// SSDP enabled, no tunnel peer.
    pub fn example() -> Self {
        Configuration {
            site_name: "my-site".to_string(),
            tunnel_port: 9100,
            remote_relay_ip: String::new(),
            local_interfaces: vec![RawInterface {
                local_ip: "192.168.1.10".to_string(),
                broadcast_address: "192.168.1.255".to_string(),
                subnet_mask: "255.255.255.0".to_string(),
            }],
            unicast_targets: None,
            protocols: ProtocolFlags {
                raat: true,
                airplay: false,
                ssdp: true,
                squeezebox: false,
            },
        }
    }

    pub fn interfaces(&self) -> Result<Vec<Interface>, ConfigError> {
        self.local_interfaces.iter().map(RawInterface::resolve).collect()
    }

    /// `None` when `RemoteRelayIp` is empty or absent (§3: "empty ⇒ no tunnel").
    pub fn remote_relay_ip(&self) -> Result<Option<Ipv4Addr>, ConfigError> {
        if self.remote_relay_ip.trim().is_empty() {
            return Ok(None);
        }
        self.remote_relay_ip
            .parse()
            .map(Some)
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidAddress(self.remote_relay_ip.clone(), e.to_string())
            })
    }

    pub fn unicast_targets(&self) -> Result<HashSet<Ipv4Addr>, ConfigError> {
        match &self.unicast_targets {
            None => Ok(HashSet::new()),
            Some(list) => list
                .iter()
                .map(|s| {
                    s.parse()
                        .map_err(|e: std::net::AddrParseError| {
                            ConfigError::InvalidAddress(s.clone(), e.to_string())
                        })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_protocols_object_enables_only_raat() {
        let json = r#"{
            "SiteName": "home",
            "TunnelPort": 9100,
            "LocalInterfaces": []
        }"#;
        let cfg: Configuration = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.protocols, ProtocolFlags::default());
        assert!(cfg.protocols.raat);
        assert!(!cfg.protocols.ssdp);
    }

    #[test]
    fn protocols_casing_matches_spec() {
        let json = r#"{
            "SiteName": "home",
            "TunnelPort": 9100,
            "LocalInterfaces": [],
            "Protocols": { "Raat": false, "AirPlay": true, "Ssdp": true, "Squeezebox": true }
        }"#;
        let cfg: Configuration = serde_json::from_str(json).unwrap();
        assert!(!cfg.protocols.raat);
        assert!(cfg.protocols.airplay);
        assert!(cfg.protocols.ssdp);
        assert!(cfg.protocols.squeezebox);
    }

    #[test]
    fn empty_remote_relay_ip_means_no_tunnel() {
        let json = r#"{
            "SiteName": "home",
            "TunnelPort": 9100,
            "RemoteRelayIp": "",
            "LocalInterfaces": []
        }"#;
        let cfg: Configuration = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.remote_relay_ip().unwrap(), None);
    }

    #[test]
    fn null_unicast_targets_is_empty_set() {
        let json = r#"{
            "SiteName": "home",
            "TunnelPort": 9100,
            "LocalInterfaces": [],
            "UnicastTargets": null
        }"#;
        let cfg: Configuration = serde_json::from_str(json).unwrap();
        assert!(cfg.unicast_targets().unwrap().is_empty());
    }

    #[test]
    fn interfaces_resolve_to_ipv4_addrs() {
        let cfg = Configuration::example();
        let ifaces = cfg.interfaces().unwrap();
        assert_eq!(ifaces.len(), 1);
        assert_eq!(ifaces[0].local_ip, Ipv4Addr::new(192, 168, 1, 10));
    }

    #[test]
    fn malformed_address_is_a_config_error() {
        let raw = RawInterface {
            local_ip: "not-an-ip".to_string(),
            broadcast_address: "192.168.1.255".to_string(),
            subnet_mask: "255.255.255.0".to_string(),
        };
        assert!(raw.resolve().is_err());
    }

    #[test]
    fn example_round_trips_through_json() {
        let cfg = Configuration::example();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let parsed: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.site_name, cfg.site_name);
        assert_eq!(parsed.protocols, cfg.protocols);
    }

    #[test]
    fn protocol_flags_select_expected_descriptors() {
        let flags = ProtocolFlags {
            raat: true,
            airplay: false,
            ssdp: true,
            squeezebox: false,
        };
        let enabled = flags.enabled();
        assert_eq!(enabled.len(), 2);
        assert_eq!(enabled[0].port, 9003);
        assert_eq!(enabled[1].port, 1900);
    }
}
