use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitStream, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use huddle_core::{Envelope, PeerId};

use crate::connection::SignalSender;
use crate::error::{NegotiationError, TransportError};
use crate::supervisor::SessionSupervisor;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound envelope queue feeding the socket writer task. Cheap to clone
/// into sessions and observers.
pub struct SignalChannel {
    tx: mpsc::UnboundedSender<Envelope>,
}

#[async_trait]
impl SignalSender for SignalChannel {
    async fn send(&self, envelope: Envelope) -> Result<(), NegotiationError> {
        self.tx
            .send(envelope)
            .map_err(|_| NegotiationError::SignalClosed)
    }
}

/// Client side of the duplex signaling channel: connects, learns its
/// server-assigned identity from frame 0, then pumps envelopes both ways.
pub struct SignalingClient {
    peer_id: PeerId,
    sender: Arc<SignalChannel>,
    read: SplitStream<Ws>,
    send_task: JoinHandle<()>,
}

impl SignalingClient {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _) = connect_async(url).await?;
        let (mut write, mut read) = ws.split();

        let peer_id = match next_envelope(&mut read).await? {
            Envelope::Welcome { peer_id } => peer_id,
            other => {
                return Err(TransportError::Protocol(format!(
                    "expected welcome as frame 0, got {:?}",
                    other
                )))
            }
        };
        info!("connected to signaling relay as {}", peer_id);

        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let send_task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let Ok(json) = serde_json::to_string(&envelope) else {
                    continue;
                };
                if write.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            peer_id,
            sender: Arc::new(SignalChannel { tx }),
            read,
            send_task,
        })
    }

    /// The identity the registry assigned to this connection.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn sender(&self) -> Arc<SignalChannel> {
        self.sender.clone()
    }

    /// Feed inbound envelopes to the supervisor until the channel ends,
    /// then tear down every session.
    pub async fn run(mut self, supervisor: Arc<SessionSupervisor>) {
        while let Some(Ok(msg)) = self.read.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<Envelope>(text.as_str()) {
                    Ok(envelope) => supervisor.handle_envelope(envelope).await,
                    Err(e) => warn!("invalid envelope from relay: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }

        info!("signaling channel ended for {}", self.peer_id);
        self.send_task.abort();
        supervisor.shutdown().await;
    }
}

async fn next_envelope(read: &mut SplitStream<Ws>) -> Result<Envelope, TransportError> {
    loop {
        let msg = read
            .next()
            .await
            .ok_or_else(|| TransportError::Protocol("channel closed before welcome".into()))??;
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str())
                    .map_err(|e| TransportError::Protocol(e.to_string()));
            }
            Message::Close(_) => {
                return Err(TransportError::Protocol(
                    "channel closed before welcome".into(),
                ));
            }
            _ => {}
        }
    }
}
