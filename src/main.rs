//! Chat history service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ axum serve ─▶ Logger ─▶ Auth ─▶ Recoverer ─▶ Router ─▶ handler
//!                                                                             │
//!                                                                             ▼
//!     Client Response                                                ConversationStore
//!     ◀───────────── axum serve ◀─ Logger ◀─ Auth ◀─ Recoverer ◀─ Router ◀─┘ (memory | sqlite)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use chat_history::config::{self, ConfigOverrides};
use chat_history::http::HttpServer;
use chat_history::lifecycle::{wait_for_termination, Shutdown};
use chat_history::observability::{logging, metrics};
use chat_history::store;

#[derive(Debug, Parser)]
#[command(name = "chat-history", version, about = "Chat history HTTP service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "CHAT_HISTORY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        bind_address: cli.bind.clone(),
    };
    let config = config::load_config(cli.config.as_deref(), &overrides)?;

    if cli.check_config {
        println!("configuration OK");
        return Ok(());
    }

    logging::init(&config.observability)?;
    tracing::info!("chat-history v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.backend,
        request_timeout_secs = config.timeouts.request_secs,
        auth_enabled = config.auth.enabled,
        "Configuration loaded"
    );
    if config.auth.enabled && config.auth.tokens.is_empty() {
        tracing::warn!("Auth is enabled but no tokens are configured; every protected request will be rejected");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let store = store::open(&config.store).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, store)?;
    let mut serving = tokio::spawn(server.run(listener, shutdown.clone()));

    tokio::select! {
        _ = wait_for_termination() => {
            shutdown.trigger();
            serving.await??;
        }
        result = &mut serving => {
            result??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
