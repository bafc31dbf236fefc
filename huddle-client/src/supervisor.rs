use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use huddle_core::{Envelope, PeerId};

use crate::connection::{
    ConnectionFactory, ConnectionObserver, IceCandidateInit, RemoteTrack, SessionEvents,
    SignalSender,
};
use crate::error::MediaError;
use crate::media::{LocalMediaSource, MediaKind};
use crate::session::NegotiationSession;

/// Keeps the set of negotiation sessions synchronized with registry
/// membership: one session per remote peer, created on `Join`/`PeerList`
/// or lazily on inbound negotiation traffic, destroyed on `Leave`.
pub struct SessionSupervisor {
    local_id: PeerId,
    sessions: DashMap<PeerId, Arc<NegotiationSession>>,
    connections: Arc<dyn ConnectionFactory>,
    signals: Arc<dyn SignalSender>,
    events: Arc<dyn SessionEvents>,
    media: Arc<LocalMediaSource>,
    video_enabled: AtomicBool,
    audio_enabled: AtomicBool,
}

impl SessionSupervisor {
    pub fn new(
        local_id: PeerId,
        connections: Arc<dyn ConnectionFactory>,
        signals: Arc<dyn SignalSender>,
        events: Arc<dyn SessionEvents>,
        media: Arc<LocalMediaSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local_id,
            sessions: DashMap::new(),
            connections,
            signals,
            events,
            media,
            video_enabled: AtomicBool::new(true),
            audio_enabled: AtomicBool::new(true),
        })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn session(&self, peer: &PeerId) -> Option<Arc<NegotiationSession>> {
        self.sessions.get(peer).map(|entry| entry.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Acquire local media, then attach it to every session known so far.
    /// Attaching is what drives the first offer to each peer; knowing a
    /// peer and having media ready are deliberately decoupled.
    pub async fn start_media(&self) -> Result<(), MediaError> {
        self.media.acquire().await?;
        self.events.on_local_stream_ready();

        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for session in sessions {
            self.attach_local_tracks(&session).await;
        }
        Ok(())
    }

    pub async fn handle_envelope(&self, envelope: Envelope) {
        match envelope {
            Envelope::Welcome { peer_id } => {
                warn!("unexpected welcome for {} after handshake, ignoring", peer_id);
            }
            Envelope::PeerList { peers } => {
                for peer in peers {
                    self.ensure_session(&peer).await;
                }
            }
            Envelope::Join { peer_id } => {
                info!("peer joined: {}", peer_id);
                self.ensure_session(&peer_id).await;
            }
            Envelope::Leave { peer_id } => {
                info!("peer left: {}", peer_id);
                self.remove_session(&peer_id).await;
            }
            Envelope::Offer { sdp, from, .. } => {
                let Some(session) = self.ensure_session(&from).await else {
                    return;
                };
                if let Err(e) = session.receive_offer(sdp).await {
                    warn!("offer from {} failed: {}", from, e);
                }
            }
            Envelope::Answer { sdp, from, .. } => {
                // No session means the peer was torn down already: drop.
                let Some(session) = self.session(&from) else {
                    debug!("answer from unknown peer {}, dropping", from);
                    return;
                };
                if let Err(e) = session.receive_answer(sdp).await {
                    warn!("answer from {} failed: {}", from, e);
                }
            }
            Envelope::IceCandidate {
                candidate,
                sdp_mid,
                sdp_m_line_index,
                from,
                ..
            } => {
                let Some(session) = self.ensure_session(&from).await else {
                    return;
                };
                let init = IceCandidateInit {
                    candidate,
                    sdp_mid,
                    sdp_m_line_index,
                };
                if let Err(e) = session.add_remote_candidate(init).await {
                    warn!("candidate from {} dropped: {}", from, e);
                }
            }
            Envelope::MediaStatus { video, audio, from } => {
                self.events.on_media_status(&from, video, audio);
            }
        }
    }

    /// Look up the session for `peer`, creating it if negotiation traffic
    /// (or a membership event) arrives for an unknown identity.
    async fn ensure_session(&self, peer: &PeerId) -> Option<Arc<NegotiationSession>> {
        if let Some(session) = self.session(peer) {
            return Some(session);
        }

        let observer = Arc::new(PeerObserver {
            local: self.local_id.clone(),
            peer: peer.clone(),
            signals: self.signals.clone(),
            events: self.events.clone(),
        });
        let connection = match self.connections.create(observer).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("failed to create connection for {}: {}", peer, e);
                return None;
            }
        };

        let session = NegotiationSession::new(
            self.local_id.clone(),
            peer.clone(),
            connection,
            self.signals.clone(),
            self.events.clone(),
        );
        self.sessions.insert(peer.clone(), session.clone());

        if self.media.is_ready() {
            self.attach_local_tracks(&session).await;
        }
        Some(session)
    }

    async fn attach_local_tracks(&self, session: &Arc<NegotiationSession>) {
        for track in self.media.tracks() {
            if let Err(e) = session.attach_track(track).await {
                warn!("failed to attach track to {}: {}", session.remote(), e);
            }
        }
    }

    async fn remove_session(&self, peer: &PeerId) {
        if let Some((_, session)) = self.sessions.remove(peer) {
            session.close().await;
        }
    }

    pub async fn set_video_enabled(&self, enabled: bool) {
        self.set_kind_enabled(MediaKind::Video, enabled).await;
    }

    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.set_kind_enabled(MediaKind::Audio, enabled).await;
    }

    /// Applies a mute toggle to the capture track, to every active
    /// session's sender, and (through the shared track flag) to any
    /// session created afterwards; then broadcasts the new state.
    async fn set_kind_enabled(&self, kind: MediaKind, enabled: bool) {
        self.media.set_enabled(kind, enabled);
        match kind {
            MediaKind::Video => self.video_enabled.store(enabled, Ordering::SeqCst),
            MediaKind::Audio => self.audio_enabled.store(enabled, Ordering::SeqCst),
        }

        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for session in sessions {
            session.set_sender_enabled(kind, enabled);
        }

        let status = Envelope::MediaStatus {
            video: self.video_enabled.load(Ordering::SeqCst),
            audio: self.audio_enabled.load(Ordering::SeqCst),
            from: self.local_id.clone(),
        };
        if let Err(e) = self.signals.send(status).await {
            warn!("failed to broadcast media status: {}", e);
        }
    }

    /// Close every session. Used when the signaling channel ends.
    pub async fn shutdown(&self) {
        let peers: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for peer in peers {
            self.remove_session(&peer).await;
        }
    }
}

/// Per-peer connection callbacks: locally gathered candidates go out as
/// envelopes, remote tracks go to the UI surface.
struct PeerObserver {
    local: PeerId,
    peer: PeerId,
    signals: Arc<dyn SignalSender>,
    events: Arc<dyn SessionEvents>,
}

impl ConnectionObserver for PeerObserver {
    fn on_ice_candidate(&self, candidate: IceCandidateInit) {
        let envelope = Envelope::IceCandidate {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_m_line_index: candidate.sdp_m_line_index,
            to: self.peer.clone(),
            from: self.local.clone(),
        };
        let signals = self.signals.clone();
        tokio::spawn(async move {
            if signals.send(envelope).await.is_err() {
                debug!("signaling channel closed, dropping local candidate");
            }
        });
    }

    fn on_remote_track(&self, track: RemoteTrack) {
        self.events.on_remote_track(&self.peer, track);
    }
}
