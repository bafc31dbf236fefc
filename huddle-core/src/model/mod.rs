mod envelope;
mod ice;
mod peer;

pub use envelope::Envelope;
pub use ice::IceServerConfig;
pub use peer::PeerId;
