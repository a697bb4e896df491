//! Platform-independent forwarding logic for the discovery relay.
//!
//! Everything in this crate is pure: no sockets, no async runtime, no
//! platform-specific code. `relay-server` builds the actual UDP listeners,
//! the raw emitter, and the supervisor on top of these types, the same way
//! the teacher splits protocol-independent parsing from its tokio-based I/O
//! layer.

pub mod checksum;
pub mod config;
pub mod dedup;
pub mod iface;
pub mod packet;
pub mod protocol;
pub mod tunnel_frame;
