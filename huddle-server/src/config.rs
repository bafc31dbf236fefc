use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::credentials::CredentialMinter;

#[derive(Debug, Parser)]
#[command(name = "huddle-server", about = "WebRTC rendezvous and signaling relay")]
pub struct ServerConfig {
    #[arg(long, env = "HUDDLE_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    #[arg(long, env = "STUN_URL", default_value = "stun:stun.l.google.com:19302")]
    pub stun_url: String,

    /// TURN urls handed out with minted credentials. No urls means the
    /// credential endpoint serves STUN only.
    #[arg(long = "turn-url", env = "TURN_URL")]
    pub turn_urls: Vec<String>,

    /// Secret shared with the TURN server for credential minting.
    #[arg(long, env = "TURN_SECRET")]
    pub turn_secret: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL_TTL_SECS", default_value_t = 3600)]
    pub turn_credential_ttl_secs: u64,
}

impl ServerConfig {
    pub fn minter(&self) -> Option<CredentialMinter> {
        let secret = self.turn_secret.as_ref()?;
        if self.turn_urls.is_empty() {
            return None;
        }
        Some(CredentialMinter::new(
            self.turn_urls.clone(),
            secret.as_bytes().to_vec(),
            Duration::from_secs(self.turn_credential_ttl_secs),
        ))
    }
}
