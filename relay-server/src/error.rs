//! Error taxonomy (§7). `thiserror`-derived, matching the teacher's
//! `RadarError`/`ParseError` enums: one flat enum per crate, `#[from]` for
//! cheap conversions, `#[source]` where context needs to travel along.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// ConfigError: missing file.
    #[error("configuration file not found at '{0}'; a default has been written there")]
    ConfigMissing(PathBuf),

    /// ConfigError: unparseable JSON or malformed address.
    #[error("invalid configuration: {0}")]
    Config(#[from] relay_core::config::ConfigError),

    /// ConfigError: unparseable JSON.
    #[error("cannot parse configuration JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// BindError: UDP bind on a protocol port refused.
    #[error("failed to bind {protocol} listener on port {port}: {source}")]
    Bind {
        protocol: &'static str,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// RawInitError: cannot create or configure the raw socket. Fatal.
    #[error("failed to initialize raw IPv4 socket (are we running as root?): {0}")]
    RawInit(std::io::Error),

    /// RawSendError: per-datagram send failure on the raw socket.
    #[error("raw send to {dst} failed: {source}")]
    RawSend {
        dst: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// UdpSendError: per-datagram send failure on a plain UDP socket.
    #[error("UDP send to {dst} failed: {source}")]
    UdpSend {
        dst: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// RecvError: transient receive failure.
    #[error("receive error on {label}: {source}")]
    Recv {
        label: String,
        #[source]
        source: std::io::Error,
    },

    /// TunnelProtocolError: malformed preamble.
    #[error("malformed tunnel frame: {0}")]
    TunnelFrame(#[from] relay_core::tunnel_frame::TunnelFrameError),

    /// TunnelProtocolError: unknown destination port.
    #[error("tunnel frame destination port {0} is not an enabled protocol")]
    TunnelUnknownPort(u16),

    #[error("failed to build outbound datagram: {0}")]
    PacketBuild(#[from] relay_core::packet::PacketBuildError),
}
