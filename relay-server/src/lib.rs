//! Cross-subnet relay for link-local discovery traffic (RAAT, AirPlay,
//! SSDP, Squeezebox).
//!
//! `relay-core` holds the pure forwarding logic (checksums, packet framing,
//! subnet matching, dedup); this crate wires that logic to real sockets with
//! `tokio`, the way the teacher splits `mayara-core`'s protocol parsing from
//! `mayara-server`'s I/O layer.

use clap_verbosity_flag::{InfoLevel, Verbosity};
use relay_core::config::Configuration;
use std::path::Path;

pub mod error;
pub mod listener;
pub mod net;
pub mod raw_emitter;
pub mod runtime;
pub mod supervisor;
pub mod tunnel;

use error::RelayError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load configuration from `path`, or write a documented example there and
/// report it missing (§2.2) if no file exists yet.
pub fn load_or_write_default(path: &Path) -> Result<Configuration, RelayError> {
    if !path.exists() {
        let example = Configuration::example();
        let json = serde_json::to_string_pretty(&example)?;
        std::fs::write(path, json)?;
        return Err(RelayError::ConfigMissing(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    let config: Configuration = serde_json::from_str(&contents)?;
    Ok(config)
}

#[derive(clap::Parser, Clone, Debug)]
#[command(author, version, about = "Cross-subnet relay for link-local discovery traffic")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Path to the JSON configuration file. Written with a documented
    /// example and the process exits if it doesn't exist yet.
    #[arg(default_value = "./appsettings.json")]
    pub config: std::path::PathBuf,
}
