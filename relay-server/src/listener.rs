//! The Protocol Listener (§4.3): one per enabled protocol, receiving on that
//! protocol's well-known port and running the classify/tunnel/unicast/
//! interface fan-out steps for every inbound datagram.

use relay_core::iface::find_matching;
use relay_core::protocol::Protocol;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::error::RelayError;
use crate::runtime::{Shared, TunnelOutbound};

pub struct ProtocolListener {
    protocol: Protocol,
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
}

impl ProtocolListener {
    pub fn new(protocol: Protocol, socket: Arc<UdpSocket>, shared: Arc<Shared>) -> Self {
        ProtocolListener {
            protocol,
            socket,
            shared,
        }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), std::io::Error> {
        log::info!(
            "{}: listener starting on port {}",
            self.protocol.name,
            self.protocol.port
        );
        let mut buf = vec![0u8; relay_core::packet::MAX_PAYLOAD_LEN];

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::info!("{}: listener shutting down", self.protocol.name);
                    if let Some(stats) = self.shared.stats.get(&self.protocol.port) {
                        log::info!("{}", stats.summary_line(&self.shared.site_name, self.protocol.name));
                    }
                    return Ok(());
                }
                res = self.socket.recv_from(&mut buf) => {
                    match res {
                        Ok((n, SocketAddr::V4(from))) => {
                            self.handle(&buf[..n], *from.ip(), from.port()).await;
                        }
                        Ok((_, SocketAddr::V6(_))) => {
                            // IPv6 senders can't appear on an IPv4-only relay; ignore.
                        }
                        Err(source) => {
                            log::warn!(
                                "{}",
                                RelayError::Recv { label: self.protocol.name.to_string(), source }
                            );
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, payload: &[u8], sender_ip: Ipv4Addr, sender_port: u16) {
        // I2: never process our own emissions.
        if self.shared.local_ips.contains(&sender_ip) {
            return;
        }

        let from_unicast = self.shared.unicast_targets.contains(&sender_ip);
        let source_iface = find_matching(&self.shared.interfaces, &sender_ip);

        if source_iface.is_none() && !from_unicast {
            log::trace!(
                "{}: dropping packet from {sender_ip} (not a declared interface or unicast target)",
                self.protocol.name
            );
            return;
        }

        if let Some(tx) = &self.shared.tunnel_tx {
            let msg = TunnelOutbound {
                payload: payload.to_vec(),
                src_ip: sender_ip,
                src_port: sender_port,
                dst_port: self.protocol.port,
            };
            if tx.try_send(msg).is_err() {
                log::warn!("{}: tunnel queue full, dropping one packet", self.protocol.name);
            }
        }

        for target in &self.shared.unicast_targets {
            if *target == sender_ip {
                continue;
            }
            let dst = SocketAddr::new(std::net::IpAddr::V4(*target), self.protocol.port);
            match self.socket.send_to(payload, dst).await {
                Ok(_) => self.log_forward("lan->lan(unicast)", sender_ip, sender_port, dst),
                Err(source) => log::warn!("{}", RelayError::UdpSend { dst, source }),
            }
        }

        // Coarse collision guard: one check gates the whole interface
        // fan-out for this packet, not a per-interface re-check - it exists
        // to suppress an echo that arrives via both the tunnel and the LAN
        // nearly simultaneously, not to stagger delivery across interfaces.
        let proceed = !from_unicast || self.shared.dedup.check_and_record(sender_port);
        if !proceed {
            if let Some(stats) = self.shared.stats.get(&self.protocol.port) {
                stats.record_dedup();
            }
            return;
        }

        for iface in &self.shared.interfaces {
            if Some(*iface) == source_iface {
                continue;
            }

            if from_unicast {
                if self.protocol.use_broadcast {
                    let dst = SocketAddr::new(std::net::IpAddr::V4(iface.broadcast), self.protocol.port);
                    match self.shared.raw.send(
                        sender_ip,
                        sender_port,
                        iface.broadcast,
                        self.protocol.port,
                        self.protocol.ttl,
                        payload,
                    ) {
                        Ok(()) => self.log_forward("unicast->lan(broadcast,spoofed)", sender_ip, sender_port, dst),
                        Err(e) => log::warn!("{}: raw broadcast emit failed: {e}", self.protocol.name),
                    }
                }
                if let Some(group) = self.protocol.multicast_group {
                    let dst = SocketAddr::new(std::net::IpAddr::V4(group), self.protocol.port);
                    match self.shared.raw.send(
                        sender_ip,
                        sender_port,
                        group,
                        self.protocol.port,
                        self.protocol.ttl,
                        payload,
                    ) {
                        Ok(()) => self.log_forward("unicast->lan(multicast,spoofed)", sender_ip, sender_port, dst),
                        Err(e) => log::warn!("{}: raw multicast emit failed: {e}", self.protocol.name),
                    }
                }
            } else {
                if self.protocol.use_broadcast {
                    let dst = SocketAddr::new(iface.broadcast.into(), self.protocol.port);
                    match self.socket.send_to(payload, dst).await {
                        Ok(_) => self.log_forward("lan->lan(broadcast)", sender_ip, sender_port, dst),
                        Err(source) => log::warn!("{}", RelayError::UdpSend { dst, source }),
                    }
                }
                if let Some(group) = self.protocol.multicast_group {
                    let dst = SocketAddr::new(group.into(), self.protocol.port);
                    match self.socket.send_to(payload, dst).await {
                        Ok(_) => self.log_forward("lan->lan(multicast)", sender_ip, sender_port, dst),
                        Err(source) => log::warn!("{}", RelayError::UdpSend { dst, source }),
                    }
                }
            }
        }
    }

    /// One log line per forwarded packet (§6): site name, protocol,
    /// direction, and endpoints. Also bumps this protocol's forwarded
    /// counter for the shutdown summary (§2.2).
    fn log_forward(&self, direction: &str, src_ip: Ipv4Addr, src_port: u16, dst: SocketAddr) {
        if let Some(stats) = self.shared.stats.get(&self.protocol.port) {
            stats.record_forward();
        }
        log::debug!(
            "{}: {} {direction} {src_ip}:{src_port} -> {dst}",
            self.shared.site_name,
            self.protocol.name,
        );
    }
}
