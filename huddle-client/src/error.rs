use thiserror::Error;

/// Failures inside one peer's negotiation. All of these are transient for
/// the session: the caller logs them and the next renegotiation attempt may
/// succeed.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("description exchange failed: {0}")]
    Description(String),

    #[error("ice candidate rejected: {0}")]
    Ice(String),

    #[error("ice candidate arrived before the remote description")]
    NoRemoteDescription,

    #[error("connection backend does not support rollback")]
    RollbackUnsupported,

    #[error("signaling channel closed")]
    SignalClosed,

    #[error("session is closed")]
    Closed,

    #[error("connection backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media acquisition failed: {0}")]
    Acquisition(String),

    /// Both the initial attempt and the single retry failed. Terminal:
    /// the user has to retry manually.
    #[error("media unavailable after retry: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("signaling protocol violation: {0}")]
    Protocol(String),
}
