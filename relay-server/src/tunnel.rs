//! The Tunnel Endpoint (§4.5): one UDP socket shared between an outbound
//! path (fed by every listener's `tunnel_tx`) and an inbound path (frames
//! arriving from the remote site), run as a single task the way the
//! teacher's report receivers multiplex a timer and a command channel in
//! one `tokio::select!` loop.

use relay_core::tunnel_frame::{decode, encode};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::error::RelayError;
use crate::runtime::{Shared, TunnelOutbound};

pub struct TunnelEndpoint {
    socket: Arc<UdpSocket>,
    remote: SocketAddrV4,
    shared: Arc<Shared>,
    outbound_rx: mpsc::Receiver<TunnelOutbound>,
}

impl TunnelEndpoint {
    pub fn new(
        socket: Arc<UdpSocket>,
        remote: SocketAddrV4,
        shared: Arc<Shared>,
        outbound_rx: mpsc::Receiver<TunnelOutbound>,
    ) -> Self {
        TunnelEndpoint {
            socket,
            remote,
            shared,
            outbound_rx,
        }
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<(), std::io::Error> {
        log::info!("tunnel: starting, remote peer {}", self.remote);
        let mut buf = vec![0u8; relay_core::packet::MAX_PAYLOAD_LEN + relay_core::tunnel_frame::PREAMBLE_LEN];

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::info!("tunnel: shutting down");
                    return Ok(());
                }

                res = self.socket.recv_from(&mut buf) => {
                    match res {
                        Ok((n, _)) => self.handle_inbound(&buf[..n]).await,
                        Err(source) => log::warn!(
                            "{}",
                            RelayError::Recv { label: "tunnel".to_string(), source }
                        ),
                    }
                }

                msg = self.outbound_rx.recv() => {
                    match msg {
                        Some(out) => self.handle_outbound(out).await,
                        None => {
                            // All listeners dropped their sender; nothing left to relay out.
                            log::warn!("tunnel: all outbound senders dropped");
                        }
                    }
                }
            }
        }
    }

    async fn handle_outbound(&self, out: TunnelOutbound) {
        let protocol_name = self
            .shared
            .enabled_protocols
            .get(&out.dst_port)
            .map(|p| p.name)
            .unwrap_or("unknown");
        let frame = encode(out.src_ip, out.src_port, out.dst_port, &out.payload);
        let dst = SocketAddr::V4(self.remote);
        match self.socket.send_to(&frame, dst).await {
            Ok(_) => self.log_forward(out.dst_port, protocol_name, "lan->tunnel", out.src_ip, out.src_port, dst),
            Err(source) => log::warn!("{}", RelayError::UdpSend { dst, source }),
        }
    }

    async fn handle_inbound(&self, frame: &[u8]) {
        let decoded = match decode(frame) {
            Ok(f) => f,
            Err(e) => {
                // I5: malformed/legacy preamble, dropped silently.
                log::trace!("tunnel: dropping {}", RelayError::TunnelFrame(e));
                return;
            }
        };

        let protocol = match self.shared.enabled_protocols.get(&decoded.dst_port) {
            Some(p) => *p,
            None => {
                log::warn!("tunnel: {}", RelayError::TunnelUnknownPort(decoded.dst_port));
                return;
            }
        };

        let orig_ip = decoded.src_ip;
        let orig_port = decoded.src_port;
        let payload = decoded.payload;

        let proceed = self.shared.dedup.check_and_record(orig_port);
        if proceed {
            for iface in &self.shared.interfaces {
                if protocol.use_broadcast {
                    let dst = SocketAddr::new(std::net::IpAddr::V4(iface.broadcast), protocol.port);
                    match self.shared.raw.send(
                        orig_ip,
                        orig_port,
                        iface.broadcast,
                        protocol.port,
                        protocol.ttl,
                        payload,
                    ) {
                        Ok(()) => self.log_forward(protocol.port, protocol.name, "tunnel->lan(broadcast)", orig_ip, orig_port, dst),
                        Err(e) => log::warn!("tunnel: raw broadcast emit failed: {e}"),
                    }
                }
                if let Some(group) = protocol.multicast_group {
                    let dst = SocketAddr::new(std::net::IpAddr::V4(group), protocol.port);
                    match self.shared.raw.send(
                        orig_ip, orig_port, group, protocol.port, protocol.ttl, payload,
                    ) {
                        Ok(()) => self.log_forward(protocol.port, protocol.name, "tunnel->lan(multicast)", orig_ip, orig_port, dst),
                        Err(e) => log::warn!("tunnel: raw multicast emit failed: {e}"),
                    }
                }
            }
        } else if let Some(stats) = self.shared.stats.get(&protocol.port) {
            stats.record_dedup();
        }

        if let Some(lan_socket) = self.shared.lan_sockets.get(&protocol.port) {
            for target in &self.shared.unicast_targets {
                if *target == orig_ip {
                    continue;
                }
                let dst = SocketAddr::new(std::net::IpAddr::V4(*target), protocol.port);
                match lan_socket.send_to(payload, dst).await {
                    Ok(_) => self.log_forward(protocol.port, protocol.name, "tunnel->lan(unicast)", orig_ip, orig_port, dst),
                    Err(source) => log::warn!("{}", RelayError::UdpSend { dst, source }),
                }
            }
        }
    }

    /// One log line per forwarded packet (§6), plus the forwarded-count bump
    /// for that protocol's shutdown summary (§2.2).
    #[allow(clippy::too_many_arguments)]
    fn log_forward(
        &self,
        protocol_port: u16,
        protocol_name: &str,
        direction: &str,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst: SocketAddr,
    ) {
        if let Some(stats) = self.shared.stats.get(&protocol_port) {
            stats.record_forward();
        }
        log::debug!(
            "{}: {protocol_name} {direction} {src_ip}:{src_port} -> {dst}",
            self.shared.site_name,
        );
    }
}

