//! `MarketChat` reference backend.
//!
//! An axum JSON server implementing the catalog, wishlist and chat room
//! contracts the client consumes. State is held in memory.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:5000
//! cargo run --bin marketchat-server
//!
//! # Run on custom address with provisioned accounts
//! cargo run --bin marketchat-server -- --bind 127.0.0.1:8080 --config accounts.toml
//! ```

use std::sync::Arc;

use clap::Parser;
use marketchat_server::config::{ServerCliArgs, ServerConfig};
use marketchat_server::server::{self, AppState};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if config.accounts.is_empty() {
        tracing::warn!("no accounts configured; every authenticated request will be rejected");
    }

    let state = AppState::with_accounts(
        config
            .accounts
            .iter()
            .map(|account| (account.token.clone(), account.user())),
    );
    tracing::info!(
        addr = %config.bind_addr,
        accounts = state.accounts.len(),
        "starting marketchat server"
    );

    match server::start_server_with_state(&config.bind_addr, Arc::new(state)).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "marketchat server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}
