use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use huddle_core::{Envelope, PeerId};

/// Connected-peer bookkeeping plus envelope routing.
///
/// The registry never inspects a relayed envelope beyond its recipient and
/// never buffers: each peer owns one unbounded queue drained by its socket
/// writer, so per sender-receiver pair the delivery order is arrival order.
#[derive(Clone, Default)]
pub struct Registry {
    peers: Arc<DashMap<PeerId, mpsc::UnboundedSender<Envelope>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the peer, then snapshot everyone else. Insert-before-snapshot
    /// means two concurrent registrations can never both miss each other:
    /// at worst one peer is mentioned twice (snapshot plus Join), which
    /// clients deduplicate per identity.
    pub fn register(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<Envelope>) -> Vec<PeerId> {
        self.peers.insert(peer_id.clone(), tx);
        self.peer_ids_except(&peer_id)
    }

    pub fn remove_peer(&self, peer_id: &PeerId) {
        self.peers.remove(peer_id);
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Snapshot of everyone currently connected, minus `except`.
    pub fn peer_ids_except(&self, except: &PeerId) -> Vec<PeerId> {
        self.peers
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| id != except)
            .collect()
    }

    /// Forward to one recipient. A miss means the peer already left and the
    /// envelope is dropped without telling the sender.
    pub fn send_to(&self, to: &PeerId, envelope: Envelope) {
        match self.peers.get(to) {
            Some(tx) => {
                if tx.send(envelope).is_err() {
                    debug!("peer {} queue closed, dropping envelope", to);
                }
            }
            None => debug!("peer {} not connected, dropping envelope", to),
        }
    }

    pub fn broadcast_except(&self, except: &PeerId, envelope: Envelope) {
        for entry in self.peers.iter() {
            if entry.key() == except {
                continue;
            }
            let _ = entry.value().send(envelope.clone());
        }
    }

    /// Apply the routing rule to an envelope received from `from`.
    pub fn relay(&self, from: &PeerId, envelope: Envelope) {
        if envelope.is_registry_originated() {
            warn!("peer {} sent a registry-only envelope, dropping", from);
            return;
        }

        if let Some(to) = envelope.recipient() {
            let to = to.clone();
            self.send_to(&to, envelope);
            return;
        }

        match envelope {
            Envelope::MediaStatus { .. } => self.broadcast_except(from, envelope),
            other => warn!("peer {} sent unroutable envelope {:?}, dropping", from, other),
        }
    }
}
