use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Local capture track handle. The enabled flag is shared between the
/// media source and every sender the track was attached to, so a mute
/// toggle is observed everywhere without detaching anything.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub id: String,
    pub kind: MediaKind,
    enabled: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Shared flag for connection backends that gate sample writing on it.
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        self.enabled.clone()
    }
}

/// Capture device access, an external collaborator (camera/microphone).
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn acquire(&self) -> Result<Vec<LocalTrack>, MediaError>;
}

/// Acquires the local capture stream and owns its mute state.
///
/// Acquisition is retried exactly once after a fixed backoff; a second
/// failure is terminal and requires a manual retry by the user.
pub struct LocalMediaSource {
    backend: Arc<dyn MediaBackend>,
    retry_delay: Duration,
    tracks: Mutex<Vec<LocalTrack>>,
    ready: AtomicBool,
}

impl LocalMediaSource {
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(15);

    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self::with_retry_delay(backend, Self::DEFAULT_RETRY_DELAY)
    }

    pub fn with_retry_delay(backend: Arc<dyn MediaBackend>, retry_delay: Duration) -> Self {
        Self {
            backend,
            retry_delay,
            tracks: Mutex::new(Vec::new()),
            ready: AtomicBool::new(false),
        }
    }

    pub async fn acquire(&self) -> Result<(), MediaError> {
        match self.backend.acquire().await {
            Ok(tracks) => {
                self.store(tracks);
                Ok(())
            }
            Err(first) => {
                warn!(
                    "media acquisition failed, retrying in {:?}: {}",
                    self.retry_delay, first
                );
                tokio::time::sleep(self.retry_delay).await;

                match self.backend.acquire().await {
                    Ok(tracks) => {
                        self.store(tracks);
                        Ok(())
                    }
                    Err(second) => {
                        error!("media acquisition failed after retry: {}", second);
                        Err(MediaError::Unavailable(second.to_string()))
                    }
                }
            }
        }
    }

    fn store(&self, tracks: Vec<LocalTrack>) {
        info!("local media ready: {} track(s)", tracks.len());
        *self.tracks.lock().expect("tracks mutex") = tracks;
        self.ready.store(true, Ordering::Release);
    }

    /// Gates renegotiation triggers: no offers until capture is live.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn tracks(&self) -> Vec<LocalTrack> {
        self.tracks.lock().expect("tracks mutex").clone()
    }

    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) {
        for track in self.tracks.lock().expect("tracks mutex").iter() {
            if track.kind == kind {
                track.set_enabled(enabled);
            }
        }
    }
}
