pub mod model;

pub use model::{Envelope, IceServerConfig, PeerId};
