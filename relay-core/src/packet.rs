//! IPv4 + UDP datagram assembly for the Raw Emitter (§4.1, §4.2, I4, P3).

use crate::checksum::internet_checksum;
use std::net::Ipv4Addr;

/// Receive buffers are 4 KiB (§5); the IPv4+UDP header overhead is 28 bytes,
/// leaving this much room for payload.
pub const MAX_PAYLOAD_LEN: usize = 4088;

const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const IPV4_VERSION_IHL: u8 = 0x45; // version=4, IHL=5 (no options)
const IPV4_FLAGS_DF: u16 = 0x4000;
const IPV4_PROTO_UDP: u8 = 17;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketBuildError {
    #[error("payload of {0} bytes exceeds the maximum of {MAX_PAYLOAD_LEN} bytes")]
    PayloadTooLarge(usize),
}

/// Assemble a complete IPv4+UDP datagram with the caller-supplied source
/// address, ports, TTL and payload. The UDP checksum field is left zero
/// (legal for IPv4, per I4); the IPv4 header checksum is computed so that
/// re-checksumming the header yields zero (P3).
pub fn build_datagram(
    src_ip: Ipv4Addr,
    src_port: u16,
    dst_ip: Ipv4Addr,
    dst_port: u16,
    ttl: u8,
    payload: &[u8],
) -> Result<Vec<u8>, PacketBuildError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PacketBuildError::PayloadTooLarge(payload.len()));
    }

    let udp_len = UDP_HEADER_LEN + payload.len();
    let total_len = IPV4_HEADER_LEN + udp_len;

    let mut datagram = Vec::with_capacity(total_len);

    // --- IPv4 header (checksum field written as 0 first, patched below) ---
    datagram.push(IPV4_VERSION_IHL);
    datagram.push(0); // TOS
    datagram.extend_from_slice(&(total_len as u16).to_be_bytes());
    datagram.extend_from_slice(&0u16.to_be_bytes()); // identification
    datagram.extend_from_slice(&IPV4_FLAGS_DF.to_be_bytes()); // flags + fragment offset
    datagram.push(ttl);
    datagram.push(IPV4_PROTO_UDP);
    datagram.extend_from_slice(&0u16.to_be_bytes()); // header checksum placeholder
    datagram.extend_from_slice(&src_ip.octets());
    datagram.extend_from_slice(&dst_ip.octets());
    debug_assert_eq!(datagram.len(), IPV4_HEADER_LEN);

    let header_checksum = internet_checksum(&datagram[..IPV4_HEADER_LEN]);
    datagram[10..12].copy_from_slice(&header_checksum.to_be_bytes());

    // --- UDP header ---
    datagram.extend_from_slice(&src_port.to_be_bytes());
    datagram.extend_from_slice(&dst_port.to_be_bytes());
    datagram.extend_from_slice(&(udp_len as u16).to_be_bytes());
    datagram.extend_from_slice(&0u16.to_be_bytes()); // checksum, left zero

    datagram.extend_from_slice(payload);

    Ok(datagram)
}
