//! The Raw Emitter (§4.1, §4.2, I3, I4): the one component that spoofs a
//! source address. Initialization failure is fatal (§7 RawInitError); a
//! per-datagram send failure is logged and swallowed (§7 RawSendError) so one
//! bad send never takes the relay down.

use relay_core::packet::build_datagram;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::RelayError;
use crate::net::create_raw_socket;

/// Owns the single raw IPv4 socket used to emit spoofed-source datagrams.
/// `socket2::Socket::send_to` takes `&self`, so concurrent callers across
/// listener tasks can share one instance behind an `Arc` without a mutex -
/// each `sendto(2)` call is independently atomic at the kernel boundary.
pub struct RawEmitter {
    socket: socket2::Socket,
}

impl RawEmitter {
    pub fn new() -> Result<Self, RelayError> {
        let socket = create_raw_socket().map_err(RelayError::RawInit)?;
        Ok(RawEmitter { socket })
    }

    /// Build and send one spoofed-source datagram. Errors here are meant to
    /// be logged and discarded by the caller, not propagated as fatal.
    pub fn send(
        &self,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst_ip: Ipv4Addr,
        dst_port: u16,
        ttl: u8,
        payload: &[u8],
    ) -> Result<(), RelayError> {
        let datagram = build_datagram(src_ip, src_port, dst_ip, dst_port, ttl, payload)?;
        let dst = SocketAddr::new(IpAddr::V4(dst_ip), dst_port);
        self.socket
            .send_to(&datagram, &socket2::SockAddr::from(dst))
            .map(|_| ())
            .map_err(|source| RelayError::RawSend { dst, source })
    }
}
