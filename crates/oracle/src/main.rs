//! Bridge deposit oracle.
//!
//! Relays deposits locked on the source ledger to the destination relay endpoint:
//!
//! 1. Poll the source ledger for `BridgeDepositInitiated` logs
//! 2. Decode each log into a deposit
//! 3. Post the deposit to the relay endpoint, retrying transient failures
//! 4. Reconnect with backoff when the source ledger becomes unreachable
//!
//! ## Architecture
//!
//! ```text
//!   Source ledger          Oracle               Relay endpoint
//!        |                   |                        |
//!        |<---eth_getLogs----|                        |
//!        |-----logs--------->|                        |
//!        |                   |                        |
//!        |             (decode, order)                |
//!        |                   |                        |
//!        |                   |--POST /relay---------->|
//!        |                   |<--------2xx------------|
//!        |                   |                        |
//!        |            (advance cursor)                |
//! ```

use std::{
    fs::OpenOptions,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, bail};
use bridge_oracle::{
    Config, RelayLoop,
    config::API_KEY_ENV,
    metrics::describe_metrics,
};
use clap::Parser;
use futures::future::select_all;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{Subscriber, info};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*, registry::LookupSpan};

#[derive(Parser, Debug)]
#[command(name = "bridge-oracle")]
#[command(about = "Relay bridge deposit events to the destination relay endpoint")]
struct Cli {
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,
    /// Also append logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Plain-text log layer appending to `path`.
fn log_file_layer<S>(path: &Path) -> anyhow::Result<impl Layer<S> + use<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_layer = cli
        .log_file
        .as_deref()
        .map(log_file_layer::<Registry>)
        .transpose()?;
    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded environment file");
    }

    let mut config = Config::load(&cli.config)?;
    config.override_api_key(std::env::var(API_KEY_ENV).ok());
    config.validate()?;

    info!(
        source_chain_id = config.source_chain_id,
        rpc_url = %config.source.rpc_url,
        contract = %config.source.contract_address,
        event_signature = %config.source.event_signature,
        destination = %config.destination.url,
        "Loaded configuration"
    );

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        describe_metrics();
        info!(%addr, "Prometheus exporter listening");
    }

    let relay_loop = RelayLoop::new(
        config.ledger_source(),
        config.relay_client()?,
        config.relay_settings(),
    );

    let shutdown_token = CancellationToken::new();
    let handle = {
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move { relay_loop.run(shutdown_token).await })
    };

    info!("Relay loop started, waiting for shutdown signal");

    let mut signals: Vec<_> = [SignalKind::interrupt(), SignalKind::terminate()]
        .into_iter()
        .filter_map(|kind| signal(kind).ok())
        .collect();

    if signals.is_empty() {
        bail!("No shutdown signals could be registered");
    }

    let _ = select_all(signals.iter_mut().map(|s| Box::pin(s.recv()))).await;

    info!("Received shutdown signal, shutting down");

    shutdown_token.cancel();

    let stats = handle.await?;

    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        skipped = stats.skipped,
        duplicates = stats.duplicates,
        "Oracle stopped, exiting"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use tracing::info;
    use tracing_subscriber::{Registry, prelude::*};

    use crate::{Cli, log_file_layer};

    #[test]
    fn test_cli_log_file_is_optional() {
        let cli = Cli::try_parse_from(["bridge-oracle"]).unwrap();
        assert_eq!(cli.config.to_str(), Some("config.toml"));
        assert!(cli.log_file.is_none());

        let cli =
            Cli::try_parse_from(["bridge-oracle", "--log-file", "oracle.log"]).unwrap();
        assert_eq!(cli.log_file.unwrap().to_str(), Some("oracle.log"));
    }

    #[test]
    fn test_log_file_layer_appends() {
        let path = std::env::temp_dir().join(format!("bridge-oracle-{}.log", std::process::id()));
        fs::write(&path, "previous run\n").unwrap();

        let subscriber = Registry::default().with(log_file_layer::<Registry>(&path).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            info!(block_number = 100, "Relayed deposit");
        });

        let contents = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(contents.starts_with("previous run\n"));
        assert!(contents.contains("Relayed deposit"));
        assert!(contents.contains("block_number=100"));
        assert!(!contents.contains('\u{1b}'));
    }
}
