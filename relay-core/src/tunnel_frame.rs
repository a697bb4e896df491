//! Inter-site tunnel wire frame: 8-byte preamble + payload (§4.5, §6, I5, P4).

use std::net::Ipv4Addr;
use thiserror::Error;

pub const PREAMBLE_LEN: usize = 8;
/// I5: a tunnel frame shorter than this (8-byte preamble + >=1 payload byte)
/// is rejected outright.
pub const MIN_FRAME_LEN: usize = PREAMBLE_LEN + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TunnelFrameError {
    #[error("tunnel frame of {0} bytes is shorter than the minimum of {MIN_FRAME_LEN} bytes")]
    TooShort(usize),
}

/// A decoded inbound tunnel frame: original sender, its source port, and the
/// protocol port the packet is destined for at this site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelFrame<'a> {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

/// Build the 8-byte preamble followed by `payload` into a single outbound frame.
pub fn encode(src_ip: Ipv4Addr, src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PREAMBLE_LEN + payload.len());
    frame.extend_from_slice(&src_ip.octets());
    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Parse a raw inbound frame. Rejects anything shorter than [`MIN_FRAME_LEN`]
/// per I5; does not know about `enabled_protocols` - callers validate
/// `dst_port` themselves.
pub fn decode(frame: &[u8]) -> Result<TunnelFrame<'_>, TunnelFrameError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(TunnelFrameError::TooShort(frame.len()));
    }
    let src_ip = Ipv4Addr::new(frame[0], frame[1], frame[2], frame[3]);
    let src_port = u16::from_be_bytes([frame[4], frame[5]]);
    let dst_port = u16::from_be_bytes([frame[6], frame[7]]);
    Ok(TunnelFrame {
        src_ip,
        src_port,
        dst_port,
        payload: &frame[PREAMBLE_LEN..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MAX_PAYLOAD_LEN;

    #[test]
    fn round_trip_matches_scenario_s3() {
        let payload = vec![0u8; 20];
        let frame = encode(Ipv4Addr::new(192, 168, 100, 5), 54321, 9003, &payload);
        assert_eq!(&frame[..8], &[0xC0, 0xA8, 0x64, 0x05, 0xD4, 0x31, 0x23, 0x2B]);
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.src_ip, Ipv4Addr::new(192, 168, 100, 5));
        assert_eq!(decoded.src_port, 54321);
        assert_eq!(decoded.dst_port, 9003);
        assert_eq!(decoded.payload, payload.as_slice());
    }

    #[test]
    fn round_trip_over_representative_inputs() {
        let cases: &[(Ipv4Addr, u16, u16, &[u8])] = &[
            (Ipv4Addr::new(0, 0, 0, 0), 0, 0, &[0]),
            (Ipv4Addr::new(255, 255, 255, 255), 65535, 65535, &[1, 2, 3]),
            (Ipv4Addr::new(10, 0, 0, 1), 1024, 9003, &[0xFF; 64]),
            (Ipv4Addr::new(172, 16, 5, 200), 54321, 1900, b"M-SEARCH"),
        ];
        for (ip, sport, dport, payload) in cases {
            let frame = encode(*ip, *sport, *dport, payload);
            let decoded = decode(&frame).unwrap();
            assert_eq!(decoded.src_ip, *ip);
            assert_eq!(decoded.src_port, *sport);
            assert_eq!(decoded.dst_port, *dport);
            assert_eq!(decoded.payload, *payload);
        }
    }

    #[test]
    fn round_trip_at_max_payload_length() {
        let payload = vec![0x5Au8; MAX_PAYLOAD_LEN];
        let frame = encode(Ipv4Addr::new(1, 2, 3, 4), 1, 2, &payload);
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.payload, payload.as_slice());
    }

    #[test]
    fn six_byte_legacy_frame_is_rejected() {
        let legacy = [0xC0, 0xA8, 0x64, 0x05, 0xD4, 0x31];
        assert_eq!(decode(&legacy), Err(TunnelFrameError::TooShort(6)));
    }

    #[test]
    fn preamble_with_no_payload_is_rejected() {
        let just_preamble = [0u8; PREAMBLE_LEN];
        assert_eq!(
            decode(&just_preamble),
            Err(TunnelFrameError::TooShort(PREAMBLE_LEN))
        );
    }

    #[test]
    fn exactly_minimum_length_is_accepted() {
        let mut frame = vec![0u8; PREAMBLE_LEN];
        frame.push(0x42);
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.payload, &[0x42]);
    }
}
