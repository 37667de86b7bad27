//! Shared canvas relay.
//!
//! Clients connect to `ws://host:port/<room>` and exchange JSON messages.
//! Every connection in a room sees the same items, users and edit locks.
//!
//!   cargo run -p roomkeeper-relay -- --port 8080
//!   RUST_LOG=roomkeeper_core=debug cargo run -p roomkeeper-relay

use clap::Parser;
use roomkeeper_relay::{Config, server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting relay on {}", config.bind_addr());
    if config.keep_empty_rooms {
        tracing::info!("Empty rooms are kept until shutdown");
    }

    server::run(config).await
}
