pub mod connection;
pub mod credentials;
pub mod error;
pub mod media;
pub mod native;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use connection::{
    ConnectionFactory, ConnectionObserver, IceCandidateInit, NullEvents, PeerConnection,
    PeerStatus, RemoteTrack, SdpKind, SessionDescription, SessionEvents, SignalSender,
    TrackSender,
};
pub use error::{MediaError, NegotiationError, TransportError};
pub use media::{LocalMediaSource, LocalTrack, MediaBackend, MediaKind};
pub use session::{NegotiationSession, SignalingState};
pub use supervisor::SessionSupervisor;
pub use transport::{SignalChannel, SignalingClient};
