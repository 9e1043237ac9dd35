//! Jobfair server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults, reading ./jobfair.toml if present
//! jobfair-server --bind 0.0.0.0:4041
//!
//! # Require the configured minimum number of players before a game starts
//! jobfair-server --config /etc/jobfair.toml --enforce-minimum-players
//! ```

use std::path::PathBuf;

use clap::Parser;
use jobfair_server::{Server, ServerRuntimeConfig, config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Jobfair party game server
#[derive(Parser, Debug)]
#[command(name = "jobfair-server")]
#[command(about = "WebSocket server for the jobfair improv party game")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4041")]
    bind: String,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "jobfair.toml")]
    config: PathBuf,

    /// Require `limits.minimum_number_of_players` before a game may start
    #[arg(long)]
    enforce_minimum_players: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Jobfair server starting");

    let mut game = config::load(&args.config);
    if args.enforce_minimum_players {
        game.limits.enforce_minimum_players = true;
    }
    if let Some(required) = game.required_players() {
        tracing::info!("Games need at least {} players", required);
    }

    let server = Server::bind(ServerRuntimeConfig { bind_address: args.bind, game }).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received");
                signal.cancel();
            },
            Err(e) => tracing::error!("Failed to listen for interrupt: {}", e),
        }
    });

    server.run(shutdown).await?;

    Ok(())
}
