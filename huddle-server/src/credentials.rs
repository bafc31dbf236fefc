use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use huddle_core::IceServerConfig;

type HmacSha256 = Hmac<Sha256>;

/// Mints time-limited TURN credentials from a secret shared with the relay
/// server: the username is the expiry timestamp and the credential is a
/// keyed hash over it, so the relay can verify without any lookup.
#[derive(Clone)]
pub struct CredentialMinter {
    turn_urls: Vec<String>,
    secret: Vec<u8>,
    ttl: Duration,
}

impl CredentialMinter {
    pub fn new(turn_urls: Vec<String>, secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            turn_urls,
            secret: secret.into(),
            ttl,
        }
    }

    pub fn mint(&self) -> IceServerConfig {
        self.mint_at(SystemTime::now())
    }

    pub fn mint_at(&self, now: SystemTime) -> IceServerConfig {
        let expiry = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            + self.ttl.as_secs();
        let username = expiry.to_string();

        IceServerConfig {
            urls: self.turn_urls.clone(),
            credential: Some(self.sign(&username)),
            username: Some(username),
        }
    }

    /// True if `credential` is the keyed hash of `username` and the embedded
    /// expiry has not passed.
    pub fn verify_at(&self, username: &str, credential: &str, now: SystemTime) -> bool {
        let Ok(expiry) = username.parse::<u64>() else {
            return false;
        };
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        expiry > now_secs && self.sign(username) == credential
    }

    fn sign(&self, username: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(username.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}
