pub mod config;
pub mod credentials;
pub mod registry;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use huddle_core::IceServerConfig;

pub use config::ServerConfig;
pub use credentials::CredentialMinter;
pub use registry::{ws_handler, Registry};

pub struct AppState {
    pub registry: Registry,
    pub stun_url: Option<String>,
    pub minter: Option<CredentialMinter>,
}

/// Router with the signaling WebSocket and the relay credential endpoint.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ice-servers", get(ice_servers))
        .layer(cors)
        .with_state(state)
}

/// Time-limited relay connection parameters. Clients treat the response as
/// opaque configuration for their peer connections.
async fn ice_servers(State(state): State<Arc<AppState>>) -> Json<Vec<IceServerConfig>> {
    let mut servers = Vec::new();

    if let Some(url) = &state.stun_url {
        servers.push(IceServerConfig {
            urls: vec![url.clone()],
            username: None,
            credential: None,
        });
    }

    if let Some(minter) = &state.minter {
        servers.push(minter.mint());
    }

    Json(servers)
}
