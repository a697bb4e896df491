use clap::Parser;
use miette::{IntoDiagnostic, Result};
use relay_server::{load_or_write_default, supervisor, Cli};
use std::time::Duration;
use tokio_graceful_shutdown::Toplevel;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    log::info!("relay-server {}", relay_server::VERSION);

    let config = match load_or_write_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    Toplevel::new(move |s| async move {
        if let Err(e) = supervisor::run(s.clone(), config).await {
            log::error!("supervisor failed to start: {e}");
            s.request_shutdown();
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .into_diagnostic()?;

    Ok(())
}
