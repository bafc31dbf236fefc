use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

/// Signaling payload exchanged over the duplex channel.
///
/// The registry never looks past [`Envelope::recipient`]: SDP and candidate
/// bodies are relayed verbatim. Anything that does not parse into one of
/// these variants is dropped by the receiving side, never acted on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum Envelope {
    /// Frame 0 on every connection: the identity the server assigned.
    Welcome { peer_id: PeerId },
    /// Pre-existing members, sent once to the new member (never contains
    /// the new member itself).
    PeerList { peers: Vec<PeerId> },
    Join { peer_id: PeerId },
    Leave { peer_id: PeerId },
    Offer {
        sdp: String,
        to: PeerId,
        from: PeerId,
    },
    Answer {
        sdp: String,
        to: PeerId,
        from: PeerId,
    },
    IceCandidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_m_line_index: Option<u16>,
        to: PeerId,
        from: PeerId,
    },
    /// Local mute state, fanned out by the registry to everyone else.
    MediaStatus {
        video: bool,
        audio: bool,
        from: PeerId,
    },
}

impl Envelope {
    /// Routing address for peer-directed variants.
    pub fn recipient(&self) -> Option<&PeerId> {
        match self {
            Envelope::Offer { to, .. }
            | Envelope::Answer { to, .. }
            | Envelope::IceCandidate { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Envelope::Offer { from, .. }
            | Envelope::Answer { from, .. }
            | Envelope::IceCandidate { from, .. }
            | Envelope::MediaStatus { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Variants only the registry itself may originate. A client sending
    /// one of these is misbehaving and the frame is dropped.
    pub fn is_registry_originated(&self) -> bool {
        matches!(
            self,
            Envelope::Welcome { .. }
                | Envelope::PeerList { .. }
                | Envelope::Join { .. }
                | Envelope::Leave { .. }
        )
    }
}
