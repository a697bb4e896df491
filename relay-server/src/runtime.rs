//! Shared runtime state (§5 "RuntimeState"): everything the listener and
//! tunnel workers read, built once at startup and handed around behind an
//! `Arc`, the way the teacher's `Session`/`SessionInner` split owns shared
//! state separately from the per-connection tasks that read it.

use relay_core::config::Configuration;
use relay_core::dedup::DedupWindow;
use relay_core::iface::Interface;
use relay_core::protocol::Protocol;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::raw_emitter::RawEmitter;

/// Per-protocol operational counters (§2.2), surfaced only via a log line
/// when that protocol's worker shuts down - there is no metrics endpoint.
#[derive(Debug, Default)]
pub struct ProtocolStats {
    pub forwarded: AtomicU64,
    pub deduped: AtomicU64,
    pub bind_failures: AtomicU64,
}

impl ProtocolStats {
    pub fn record_forward(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup(&self) {
        self.deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bind_failure(&self) {
        self.bind_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// One summary line: "forwarded=N deduped=N bind_failures=N".
    pub fn summary_line(&self, site_name: &str, protocol_name: &str) -> String {
        format!(
            "{site_name}: {protocol_name} shutdown summary - forwarded={}, deduped={}, bind_failures={}",
            self.forwarded.load(Ordering::Relaxed),
            self.deduped.load(Ordering::Relaxed),
            self.bind_failures.load(Ordering::Relaxed),
        )
    }
}

/// A payload queued by a listener for delivery to the remote site over the
/// tunnel (§4.3 step 3).
#[derive(Debug)]
pub struct TunnelOutbound {
    pub payload: Vec<u8>,
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Everything a listener or tunnel worker needs to process one packet.
/// Immutable except for `dedup`, which has its own interior mutability.
pub struct Shared {
    pub site_name: String,
    pub local_ips: HashSet<Ipv4Addr>,
    pub interfaces: Vec<Interface>,
    pub unicast_targets: HashSet<Ipv4Addr>,
    pub enabled_protocols: HashMap<u16, Protocol>,
    pub dedup: DedupWindow,
    pub raw: RawEmitter,
    /// Each enabled protocol's own listening socket, keyed by port, so the
    /// tunnel worker can deliver an inbound frame to a unicast target using
    /// a socket already bound for that protocol rather than opening a new
    /// ephemeral one.
    pub lan_sockets: HashMap<u16, Arc<UdpSocket>>,
    pub tunnel_tx: Option<mpsc::Sender<TunnelOutbound>>,
    pub stats: HashMap<u16, Arc<ProtocolStats>>,
}

impl Shared {
    pub fn build(
        config: &Configuration,
        enabled: &[Protocol],
        raw: RawEmitter,
        lan_sockets: HashMap<u16, Arc<UdpSocket>>,
        tunnel_tx: Option<mpsc::Sender<TunnelOutbound>>,
        stats: HashMap<u16, Arc<ProtocolStats>>,
    ) -> Result<Self, RelayError> {
        let interfaces = config.interfaces()?;
        let local_ips = interfaces.iter().map(|i| i.local_ip).collect();
        let unicast_targets = config.unicast_targets()?;
        let enabled_protocols = enabled.iter().map(|p| (p.port, *p)).collect();

        Ok(Shared {
            site_name: config.site_name.clone(),
            local_ips,
            interfaces,
            unicast_targets,
            enabled_protocols,
            dedup: DedupWindow::new(),
            raw,
            lan_sockets,
            tunnel_tx,
            stats,
        })
    }
}
