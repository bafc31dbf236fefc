use serde::{Deserialize, Serialize};

/// STUN/TURN server entry handed to clients. Credentials are short-lived
/// and opaque to everything except the relay server that checks them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}
