use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::{Envelope, PeerId};

use crate::connection::{
    PeerConnection, PeerStatus, SessionDescription, SessionEvents, SignalSender, TrackSender,
};
use crate::error::NegotiationError;
use crate::media::{LocalTrack, MediaKind};
use crate::IceCandidateInit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// Clears `making_offer` on every exit path, including failures, so a
/// failed description generation never leaves the guard stuck.
struct OfferGuard {
    flag: Arc<AtomicBool>,
}

impl OfferGuard {
    /// Claims the flag if it is free. The claim is synchronous in the
    /// caller, before any task runs, so two back-to-back triggers can
    /// never both win it.
    fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(Self { flag: flag.clone() })
    }
}

impl Drop for OfferGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Negotiation state for one remote peer ("perfect negotiation").
///
/// The glare rule: when both sides offer at once, the impolite side ignores
/// the incoming offer and keeps its own; the polite side rolls its own
/// offer back and answers. Politeness is a pure function of the two
/// identities, so the sides never disagree.
pub struct NegotiationSession {
    local: PeerId,
    remote: PeerId,
    polite: bool,
    connection: Arc<dyn PeerConnection>,
    signals: Arc<dyn SignalSender>,
    events: Arc<dyn SessionEvents>,
    state: Mutex<SignalingState>,
    making_offer: Arc<AtomicBool>,
    /// Bumped when an in-flight offer is rolled back; stale offer tasks
    /// notice after their next suspension point and abandon.
    offer_epoch: AtomicU64,
    remote_description_set: AtomicBool,
    /// Owns the close transition: exactly one caller wins the swap.
    close_started: AtomicBool,
    closed: CancellationToken,
    senders: Mutex<HashMap<MediaKind, Box<dyn TrackSender>>>,
}

impl NegotiationSession {
    pub fn new(
        local: PeerId,
        remote: PeerId,
        connection: Arc<dyn PeerConnection>,
        signals: Arc<dyn SignalSender>,
        events: Arc<dyn SessionEvents>,
    ) -> Arc<Self> {
        let polite = local.polite_toward(&remote);
        debug!(
            "session {} -> {}: {}",
            local,
            remote,
            if polite { "polite" } else { "impolite" }
        );
        events.on_peer_status(&remote, PeerStatus::Connecting);

        Arc::new(Self {
            local,
            remote,
            polite,
            connection,
            signals,
            events,
            state: Mutex::new(SignalingState::Stable),
            making_offer: Arc::new(AtomicBool::new(false)),
            offer_epoch: AtomicU64::new(0),
            remote_description_set: AtomicBool::new(false),
            close_started: AtomicBool::new(false),
            closed: CancellationToken::new(),
            senders: Mutex::new(HashMap::new()),
        })
    }

    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    pub fn is_polite(&self) -> bool {
        self.polite
    }

    pub fn state(&self) -> SignalingState {
        *self.state.lock().expect("state mutex")
    }

    pub fn is_making_offer(&self) -> bool {
        self.making_offer.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn set_state(&self, next: SignalingState) {
        *self.state.lock().expect("state mutex") = next;
    }

    fn abandoned(&self, epoch: u64) -> bool {
        self.closed.is_cancelled() || self.offer_epoch.load(Ordering::SeqCst) != epoch
    }

    /// Attach a local track to this connection and renegotiate. A sender of
    /// the same kind attached earlier is detached from the connection, so a
    /// track swap never accumulates senders.
    pub async fn attach_track(self: &Arc<Self>, track: LocalTrack) -> Result<(), NegotiationError> {
        if self.closed.is_cancelled() {
            return Err(NegotiationError::Closed);
        }

        let kind = track.kind;
        let sender = self.connection.add_track(track).await?;
        let replaced = self
            .senders
            .lock()
            .expect("senders mutex")
            .insert(kind, sender);
        if let Some(previous) = replaced {
            if let Err(e) = previous.detach().await {
                warn!("failed to detach replaced {:?} sender for {}: {}", kind, self.remote, e);
            }
        }

        self.trigger_renegotiation();
        Ok(())
    }

    /// Fires when local tracks change. Coalesced, not queued: the guard is
    /// claimed here, before the offer task is spawned, so attaching video
    /// then audio in immediate succession still produces a single offer.
    /// Tracks are attached before the offer is created, so the in-flight
    /// exchange already reflects the latest track set.
    pub fn trigger_renegotiation(self: &Arc<Self>) {
        if self.closed.is_cancelled() {
            return;
        }
        let Some(guard) = OfferGuard::try_claim(&self.making_offer) else {
            debug!("offer for {} already in flight, coalescing", self.remote);
            return;
        };

        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session.offer_with_guard(guard).await {
                // Transient: the session stays open for the next attempt.
                warn!("offer production for {} failed: {}", session.remote, e);
            }
        });
    }

    /// Generate, install and transmit a local offer. A no-op when another
    /// offer for this peer is already in flight.
    pub async fn produce_offer(&self) -> Result<(), NegotiationError> {
        let Some(guard) = OfferGuard::try_claim(&self.making_offer) else {
            return Ok(());
        };
        self.offer_with_guard(guard).await
    }

    /// The guard is held for the whole exchange and released on every exit
    /// path, including failures, when it drops.
    async fn offer_with_guard(&self, _guard: OfferGuard) -> Result<(), NegotiationError> {
        let epoch = self.offer_epoch.load(Ordering::SeqCst);

        let sdp = self.connection.create_offer().await?;
        if self.abandoned(epoch) {
            debug!("offer for {} abandoned after rollback", self.remote);
            return Ok(());
        }

        self.connection
            .set_local_description(SessionDescription::offer(sdp.clone()))
            .await?;
        if self.abandoned(epoch) {
            debug!("offer for {} abandoned before transmit", self.remote);
            return Ok(());
        }
        self.set_state(SignalingState::HaveLocalOffer);

        self.signals
            .send(Envelope::Offer {
                sdp,
                to: self.remote.clone(),
                from: self.local.clone(),
            })
            .await
    }

    /// Apply a remote offer, resolving glare per the politeness rule.
    pub async fn receive_offer(&self, sdp: String) -> Result<(), NegotiationError> {
        if self.closed.is_cancelled() {
            return Err(NegotiationError::Closed);
        }

        let collision =
            self.making_offer.load(Ordering::SeqCst) || self.state() != SignalingState::Stable;

        if collision && !self.polite {
            debug!("glare with {}: discarding their offer", self.remote);
            return Ok(());
        }

        if collision {
            // Polite side: invalidate our in-flight offer and revert to
            // stable together with applying theirs, as one unit.
            debug!("glare with {}: rolling back our offer", self.remote);
            self.offer_epoch.fetch_add(1, Ordering::SeqCst);
            self.connection.rollback_local().await?;
            self.set_state(SignalingState::Stable);
        }

        self.connection
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;
        self.remote_description_set.store(true, Ordering::SeqCst);
        self.set_state(SignalingState::HaveRemoteOffer);

        let answer = self.connection.create_answer().await?;
        if self.closed.is_cancelled() {
            return Err(NegotiationError::Closed);
        }
        self.connection
            .set_local_description(SessionDescription::answer(answer.clone()))
            .await?;
        self.set_state(SignalingState::Stable);
        self.events.on_peer_status(&self.remote, PeerStatus::Stable);

        self.signals
            .send(Envelope::Answer {
                sdp: answer,
                to: self.remote.clone(),
                from: self.local.clone(),
            })
            .await
    }

    /// Apply a remote answer unconditionally.
    pub async fn receive_answer(&self, sdp: String) -> Result<(), NegotiationError> {
        if self.closed.is_cancelled() {
            return Err(NegotiationError::Closed);
        }

        self.connection
            .set_remote_description(SessionDescription::answer(sdp))
            .await?;
        self.remote_description_set.store(true, Ordering::SeqCst);
        self.set_state(SignalingState::Stable);
        self.events.on_peer_status(&self.remote, PeerStatus::Stable);
        Ok(())
    }

    /// Best-effort candidate application. A candidate arriving before the
    /// remote description is dropped, not queued: with trickle ICE the
    /// peer keeps generating candidates once the description lands.
    pub async fn add_remote_candidate(
        &self,
        candidate: IceCandidateInit,
    ) -> Result<(), NegotiationError> {
        if self.closed.is_cancelled() {
            return Err(NegotiationError::Closed);
        }
        if !self.remote_description_set.load(Ordering::SeqCst) {
            return Err(NegotiationError::NoRemoteDescription);
        }
        self.connection.add_ice_candidate(candidate).await
    }

    /// Apply a mute toggle to this session's outgoing sender of `kind`.
    pub fn set_sender_enabled(&self, kind: MediaKind, enabled: bool) {
        if let Some(sender) = self.senders.lock().expect("senders mutex").get(&kind) {
            sender.set_enabled(enabled);
        }
    }

    /// Release the connection and its senders. Idempotent even under
    /// concurrent callers; also cancels any in-flight offer production for
    /// this peer.
    pub async fn close(&self) {
        if self.close_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.closed.cancel();
        self.set_state(SignalingState::Closed);
        self.senders.lock().expect("senders mutex").clear();
        self.connection.close().await;
        self.events.on_peer_status(&self.remote, PeerStatus::Closed);
        info!("session with {} closed", self.remote);
    }
}
