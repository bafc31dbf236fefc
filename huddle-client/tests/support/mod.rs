#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::Level;

use huddle_client::{
    ConnectionFactory, ConnectionObserver, IceCandidateInit, LocalTrack, MediaBackend,
    MediaError, MediaKind, NegotiationError, PeerConnection, PeerStatus, RemoteTrack,
    SessionDescription, SessionEvents, SignalSender, TrackSender,
};
use huddle_core::{Envelope, PeerId};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Fixed ordered identities: `id_a() < id_b() < id_c()`, so a session from
/// A toward B is polite and the reverse is impolite.
pub fn id_a() -> PeerId {
    PeerId::parse("aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa").expect("valid uuid")
}

pub fn id_b() -> PeerId {
    PeerId::parse("bbbbbbbb-bbbb-4bbb-8bbb-bbbbbbbbbbbb").expect("valid uuid")
}

pub fn id_c() -> PeerId {
    PeerId::parse("cccccccc-cccc-4ccc-8ccc-cccccccccccc").expect("valid uuid")
}

pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Scripted `PeerConnection` that records every call. With a gate,
/// `create_offer` parks until the test hands out a permit, which is how
/// glare windows are made deterministic.
pub struct MockConnection {
    gate: Option<Arc<Semaphore>>,
    pub fail_offers: AtomicBool,
    offers: AtomicUsize,
    answers: AtomicUsize,
    rollbacks: AtomicUsize,
    closes: AtomicUsize,
    pub local_descriptions: Mutex<Vec<SessionDescription>>,
    pub remote_descriptions: Mutex<Vec<SessionDescription>>,
    pub candidates: Mutex<Vec<IceCandidateInit>>,
    /// (kind, enabled-at-attach) per added track.
    pub tracks_added: Mutex<Vec<(MediaKind, bool)>>,
    detached: Arc<Mutex<Vec<MediaKind>>>,
    sender_states: Arc<Mutex<HashMap<MediaKind, bool>>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self::build(Some(gate.clone())), gate)
    }

    fn build(gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            gate,
            fail_offers: AtomicBool::new(false),
            offers: AtomicUsize::new(0),
            answers: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            local_descriptions: Mutex::new(Vec::new()),
            remote_descriptions: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
            tracks_added: Mutex::new(Vec::new()),
            detached: Arc::new(Mutex::new(Vec::new())),
            sender_states: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn offers_created(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn answers_created(&self) -> usize {
        self.answers.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sender_enabled(&self, kind: MediaKind) -> Option<bool> {
        self.sender_states.lock().unwrap().get(&kind).copied()
    }

    pub fn detached(&self) -> Vec<MediaKind> {
        self.detached.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn create_offer(&self) -> Result<String, NegotiationError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        } else {
            tokio::task::yield_now().await;
        }
        if self.fail_offers.load(Ordering::SeqCst) {
            return Err(NegotiationError::Description("induced failure".into()));
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("offer-sdp-{n}"))
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        tokio::task::yield_now().await;
        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("answer-sdp-{n}"))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.local_descriptions.lock().unwrap().push(desc);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.remote_descriptions.lock().unwrap().push(desc);
        Ok(())
    }

    async fn rollback_local(&self) -> Result<(), NegotiationError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_ice_candidate(
        &self,
        candidate: IceCandidateInit,
    ) -> Result<(), NegotiationError> {
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn add_track(
        &self,
        track: LocalTrack,
    ) -> Result<Box<dyn TrackSender>, NegotiationError> {
        self.tracks_added
            .lock()
            .unwrap()
            .push((track.kind, track.is_enabled()));
        self.sender_states
            .lock()
            .unwrap()
            .insert(track.kind, track.is_enabled());
        Ok(Box::new(MockSender {
            kind: track.kind,
            states: self.sender_states.clone(),
            detached: self.detached.clone(),
        }))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSender {
    kind: MediaKind,
    states: Arc<Mutex<HashMap<MediaKind, bool>>>,
    detached: Arc<Mutex<Vec<MediaKind>>>,
}

#[async_trait]
impl TrackSender for MockSender {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.states.lock().unwrap().insert(self.kind, enabled);
    }

    async fn detach(&self) -> Result<(), NegotiationError> {
        self.detached.lock().unwrap().push(self.kind);
        Ok(())
    }
}

/// Factory handing out ungated mock connections, recording each one.
#[derive(Default)]
pub struct MockConnectionFactory {
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnectionFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(
        &self,
        _observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let connection = MockConnection::new();
        self.created.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

/// Captures outgoing envelopes.
#[derive(Default)]
pub struct MockSignals {
    sent: Mutex<Vec<Envelope>>,
}

impl MockSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn offers(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                Envelope::Offer { sdp, .. } => Some(sdp),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                Envelope::Answer { sdp, .. } => Some(sdp),
                _ => None,
            })
            .collect()
    }

    pub fn media_statuses(&self) -> Vec<(bool, bool)> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                Envelope::MediaStatus { video, audio, .. } => Some((video, audio)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SignalSender for MockSignals {
    async fn send(&self, envelope: Envelope) -> Result<(), NegotiationError> {
        self.sent.lock().unwrap().push(envelope);
        Ok(())
    }
}

/// Records every UI callback.
#[derive(Default)]
pub struct RecordingEvents {
    pub statuses: Mutex<Vec<(PeerId, PeerStatus)>>,
    pub media_statuses: Mutex<Vec<(PeerId, bool, bool)>>,
    pub remote_tracks: Mutex<Vec<(PeerId, RemoteTrack)>>,
    pub stream_ready: AtomicUsize,
}

impl RecordingEvents {
    pub fn statuses_for(&self, peer: &PeerId) -> Vec<PeerStatus> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == peer)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn media_status_for(&self, peer: &PeerId) -> Option<(bool, bool)> {
        self.media_statuses
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _, _)| id == peer)
            .map(|(_, video, audio)| (*video, *audio))
    }
}

impl SessionEvents for RecordingEvents {
    fn on_local_stream_ready(&self) {
        self.stream_ready.fetch_add(1, Ordering::SeqCst);
    }

    fn on_remote_track(&self, peer: &PeerId, track: RemoteTrack) {
        self.remote_tracks.lock().unwrap().push((peer.clone(), track));
    }

    fn on_peer_status(&self, peer: &PeerId, status: PeerStatus) {
        self.statuses.lock().unwrap().push((peer.clone(), status));
    }

    fn on_media_status(&self, peer: &PeerId, video: bool, audio: bool) {
        self.media_statuses
            .lock()
            .unwrap()
            .push((peer.clone(), video, audio));
    }
}

/// Camera/microphone stand-in that always grants a video + audio pair.
pub struct StaticMediaBackend;

#[async_trait]
impl MediaBackend for StaticMediaBackend {
    async fn acquire(&self) -> Result<Vec<LocalTrack>, MediaError> {
        Ok(vec![
            LocalTrack::new("cam0", MediaKind::Video),
            LocalTrack::new("mic0", MediaKind::Audio),
        ])
    }
}

pub fn candidate(n: u32) -> IceCandidateInit {
    IceCandidateInit {
        candidate: format!("candidate:{n} 1 UDP 2122252543 192.0.2.{n} 49203 typ host"),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    }
}
