use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use huddle_server::{app, AppState, Registry, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::parse();
    let minter = config.minter();
    if minter.is_none() {
        info!("no TURN secret configured, serving STUN only");
    }

    let state = Arc::new(AppState {
        registry: Registry::new(),
        stun_url: Some(config.stun_url.clone()),
        minter,
    });

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("signaling relay listening on {}", config.bind);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
