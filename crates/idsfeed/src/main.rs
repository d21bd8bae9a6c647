//! idsfeed: live classified-connection feed
//!
//! Connects to the traffic classifier, keeps a bounded window of validated
//! events, and serves health, metrics and the live window over HTTP.

mod display;
mod shutdown;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idsfeed_config::FeedConfig;
use idsfeed_lib::{FeedClient, ServerState, WebSocketConnector};

use crate::display::ConsoleTail;
use crate::shutdown::ShutdownSignal;

#[derive(Parser, Debug)]
#[command(name = "idsfeed")]
#[command(about = "Live feed of classified network connections")]
struct Args {
    /// Path to feed configuration file
    #[arg(short, long, env = "IDSFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Classifier WebSocket endpoint, overrides the config file
    #[arg(long, env = "IDSFEED_ENDPOINT")]
    endpoint: Option<String>,

    /// Number of recent events to keep
    #[arg(long, env = "IDSFEED_CAPACITY")]
    capacity: Option<usize>,

    /// Health server bind address
    #[arg(long, env = "IDSFEED_HEALTH_ADDR")]
    health_addr: Option<String>,

    /// Do not print events to stdout
    #[arg(short, long, env = "IDSFEED_QUIET")]
    quiet: bool,
}

impl Args {
    fn apply(&self, config: &mut FeedConfig) {
        if let Some(ref endpoint) = self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(capacity) = self.capacity {
            config.buffer_capacity = capacity;
        }
        if let Some(ref addr) = self.health_addr {
            config.health_addr = addr.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => {
            let config = FeedConfig::load(path)?;
            info!(path = %path.display(), feed = %config.name, "Loaded feed configuration");
            config
        }
        None => FeedConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let health_addr: SocketAddr = config.health_addr.parse()?;
    let signal = ShutdownSignal::register()?;

    info!(
        endpoint = %config.endpoint,
        capacity = config.buffer_capacity,
        "Starting feed client"
    );
    let connector = WebSocketConnector::new(config.endpoint.clone());
    let handle = FeedClient::new(&config, connector).spawn();

    let server_state = ServerState::new(&config.name, handle.publisher(), handle.stats());
    tokio::spawn(async move {
        if let Err(e) = idsfeed_lib::run_server(health_addr, server_state).await {
            error!(error = %e, "Health server error");
        }
    });
    info!(addr = %health_addr, "Health server started");

    let tail = if args.quiet {
        None
    } else {
        Some(handle.subscribe(ConsoleTail::stdout()))
    };

    signal.wait().await?;
    info!("Received shutdown signal");

    if let Some(id) = tail {
        handle.unsubscribe(id);
    }
    let stats = handle.stats();
    handle.shutdown().await?;

    let snapshot = stats.snapshot();
    info!(
        accepted = snapshot.accepted,
        dropped = snapshot.dropped,
        reconnects = snapshot.reconnects,
        "Feed stopped gracefully"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "idsfeed",
            "--endpoint",
            "wss://classifier.internal/stream",
            "--capacity",
            "250",
            "--quiet",
        ]);
        let mut config = FeedConfig::default();
        args.apply(&mut config);

        assert!(args.quiet);
        assert_eq!(config.endpoint, "wss://classifier.internal/stream");
        assert_eq!(config.buffer_capacity, 250);
        assert_eq!(config.health_addr, "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_args_defaults_keep_config() {
        let args = Args::parse_from(["idsfeed"]);
        let mut config = FeedConfig::default();
        args.apply(&mut config);
        assert_eq!(config, FeedConfig::default());
    }
}
