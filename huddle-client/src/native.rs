use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use huddle_core::IceServerConfig;

use crate::connection::{
    ConnectionFactory, ConnectionObserver, IceCandidateInit, PeerConnection, RemoteTrack,
    SdpKind, SessionDescription, TrackSender,
};
use crate::error::NegotiationError;
use crate::media::{LocalTrack, MediaKind};

fn backend(e: webrtc::Error) -> NegotiationError {
    NegotiationError::Backend(e.to_string())
}

pub struct NativeConnectionFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl NativeConnectionFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Arc<Self> {
        Arc::new(Self { ice_servers })
    }
}

#[async_trait]
impl ConnectionFactory for NativeConnectionFactory {
    async fn create(
        &self,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let connection = NativeConnection::connect(self.ice_servers.clone(), observer).await?;
        Ok(Arc::new(connection))
    }
}

/// `PeerConnection` backed by the webrtc crate.
pub struct NativeConnection {
    pc: Arc<RTCPeerConnection>,
}

impl NativeConnection {
    pub async fn connect(
        ice_servers: Vec<IceServerConfig>,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(backend)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut media_engine).map_err(backend)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(backend)?);

        // Trickle ICE: locally gathered candidates go out via the observer.
        let ice_observer = observer.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let observer = ice_observer.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                observer.on_ice_candidate(IceCandidateInit {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                });
            })
        }));

        let track_observer = observer.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                let observer = track_observer.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => MediaKind::Audio,
                        _ => MediaKind::Video,
                    };
                    observer.on_remote_track(RemoteTrack {
                        id: track.id(),
                        kind,
                    });
                })
            },
        ));

        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            Box::pin(async move {
                info!("peer connection state: {:?}", state);
            })
        }));

        Ok(Self { pc })
    }

    fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, NegotiationError> {
        match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
        }
        .map_err(|e| NegotiationError::Description(e.to_string()))
    }
}

#[async_trait]
impl PeerConnection for NativeConnection {
    async fn create_offer(&self) -> Result<String, NegotiationError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))?;
        Ok(answer.sdp)
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_local_description(Self::to_rtc(desc)?)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_remote_description(Self::to_rtc(desc)?)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))
    }

    // webrtc-rs has no SDP rollback. Reported as transient: the polite
    // side logs it and recovers on the next renegotiation.
    async fn rollback_local(&self) -> Result<(), NegotiationError> {
        Err(NegotiationError::RollbackUnsupported)
    }

    async fn add_ice_candidate(
        &self,
        candidate: IceCandidateInit,
    ) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::Ice(e.to_string()))
    }

    async fn add_track(
        &self,
        track: LocalTrack,
    ) -> Result<Box<dyn TrackSender>, NegotiationError> {
        let capability = match track.kind {
            MediaKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            MediaKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
        };

        let local = Arc::new(TrackLocalStaticSample::new(
            capability,
            track.id.clone(),
            "huddle".to_owned(),
        ));
        let rtp_sender = self
            .pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(backend)?;
        debug!("attached local {} track {}", track_kind(track.kind), track.id);

        Ok(Box::new(NativeTrackSender {
            kind: track.kind,
            enabled: track.enabled_flag(),
            pc: self.pc.clone(),
            rtp_sender,
            track: local,
        }))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("error closing peer connection: {}", e);
        }
    }
}

fn track_kind(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "audio",
        MediaKind::Video => "video",
    }
}

/// Keeps the rtp sender and its track alive; mute is the shared enabled
/// flag, which sample writers consult before pushing frames.
struct NativeTrackSender {
    kind: MediaKind,
    enabled: Arc<AtomicBool>,
    pc: Arc<RTCPeerConnection>,
    rtp_sender: Arc<RTCRtpSender>,
    #[allow(dead_code)]
    track: Arc<TrackLocalStaticSample>,
}

#[async_trait]
impl TrackSender for NativeTrackSender {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    async fn detach(&self) -> Result<(), NegotiationError> {
        self.pc.remove_track(&self.rtp_sender).await.map_err(backend)
    }
}
