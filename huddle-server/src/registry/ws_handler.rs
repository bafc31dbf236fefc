use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use huddle_core::{Envelope, PeerId};

use crate::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let registry = state.registry.clone();
    let peer_id = PeerId::new();
    info!("new signaling connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();

    // Register before snapshotting the membership: two peers connecting at
    // the same time must not both snapshot before either is in the map, or
    // one side would never learn of the other. Relayed traffic queues in
    // the channel until the writer task starts, so Welcome stays frame 0.
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let existing = registry.register(peer_id.clone(), tx);

    let hello = [
        Envelope::Welcome {
            peer_id: peer_id.clone(),
        },
        Envelope::PeerList { peers: existing },
    ];
    for envelope in hello {
        if send_envelope(&mut sender, &envelope).await.is_err() {
            warn!("connection {} lost during handshake", peer_id);
            registry.remove_peer(&peer_id);
            return;
        }
    }

    registry.broadcast_except(
        &peer_id,
        Envelope::Join {
            peer_id: peer_id.clone(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if send_envelope(&mut sender, &envelope).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let registry = registry.clone();
        let peer_id = peer_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => registry.relay(&peer_id, envelope),
                        // Malformed frame: drop it, keep the connection.
                        Err(e) => warn!("invalid envelope from {}: {}", peer_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    registry.remove_peer(&peer_id);
    registry.broadcast_except(
        &peer_id,
        Envelope::Leave {
            peer_id: peer_id.clone(),
        },
    );
    info!("signaling connection closed: {}", peer_id);
}

async fn send_envelope(
    sender: &mut SplitSink<WebSocket, Message>,
    envelope: &Envelope,
) -> Result<(), axum::Error> {
    match serde_json::to_string(envelope) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("failed to serialize envelope: {}", e);
            Ok(())
        }
    }
}
