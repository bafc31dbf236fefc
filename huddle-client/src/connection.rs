use std::sync::Arc;

use async_trait::async_trait;

use huddle_core::{Envelope, PeerId};

use crate::error::NegotiationError;
use crate::media::{LocalTrack, MediaKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Connecting,
    Stable,
    Closed,
}

/// Handle to an outgoing track on one connection. Toggling keeps the track
/// attached so the connection holds a live reference.
#[async_trait]
pub trait TrackSender: Send + Sync {
    fn kind(&self) -> MediaKind;
    fn set_enabled(&self, enabled: bool);
    /// Remove this sender's track from its connection. Called on the old
    /// sender when a new track of the same kind replaces it.
    async fn detach(&self) -> Result<(), NegotiationError>;
}

/// The underlying peer connection, an external collaborator. The
/// negotiation state machine drives it but never inspects SDP contents.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<String, NegotiationError>;
    async fn create_answer(&self) -> Result<String, NegotiationError>;
    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError>;
    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError>;
    /// Revert an unanswered local offer, returning signaling to stable.
    async fn rollback_local(&self) -> Result<(), NegotiationError>;
    async fn add_ice_candidate(&self, candidate: IceCandidateInit)
        -> Result<(), NegotiationError>;
    async fn add_track(&self, track: LocalTrack) -> Result<Box<dyn TrackSender>, NegotiationError>;
    async fn close(&self);
}

/// Callbacks a connection backend raises for one peer: locally gathered
/// candidates to relay out, remote tracks to surface.
pub trait ConnectionObserver: Send + Sync {
    fn on_ice_candidate(&self, candidate: IceCandidateInit);
    fn on_remote_track(&self, track: RemoteTrack);
}

#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError>;
}

/// Outbound half of the duplex signaling channel.
#[async_trait]
pub trait SignalSender: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), NegotiationError>;
}

/// Surface the core exposes to the embedding UI. The core never touches
/// presentation state directly.
pub trait SessionEvents: Send + Sync {
    fn on_local_stream_ready(&self) {}
    fn on_remote_track(&self, _peer: &PeerId, _track: RemoteTrack) {}
    fn on_peer_status(&self, _peer: &PeerId, _status: PeerStatus) {}
    fn on_media_status(&self, _peer: &PeerId, _video: bool, _audio: bool) {}
}

/// For embedders that want no UI callbacks.
pub struct NullEvents;

impl SessionEvents for NullEvents {}
