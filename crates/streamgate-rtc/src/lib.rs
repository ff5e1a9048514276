//! WebRTC implementation of the media-link seam.
//!
//! Every link is a fresh receive-only `RTCPeerConnection` configured with
//! the same STUN/TURN set. The local description is returned as soon as it
//! is set — candidates trickle, the publisher answers against the initial
//! SDP exactly as a browser client would.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use streamgate_core::{
    IceConfig, LinkError, LinkEvent, LinkFactory, MediaInfo, MediaKinds, MediaLink, PlaybackStats,
    SessionDescription,
};

const EVENT_CHANNEL_CAPACITY: usize = 32;
const STATS_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

// ── Factory ───────────────────────────────────────────────────────────────────

pub struct RtcLinkFactory {
    api: API,
    ice: IceConfig,
}

impl RtcLinkFactory {
    pub fn new(ice: IceConfig) -> Result<Self, LinkError> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| LinkError::Setup { reason: e.to_string() })?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)
            .map_err(|e| LinkError::Setup { reason: e.to_string() })?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, ice })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice
                .servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone(),
                    credential: server.credential.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LinkFactory for RtcLinkFactory {
    async fn open(&self) -> Result<(Arc<dyn MediaLink>, mpsc::Receiver<LinkEvent>), LinkError> {
        let pc = self
            .api
            .new_peer_connection(self.rtc_configuration())
            .await
            .map_err(|e| LinkError::Setup { reason: e.to_string() })?;
        let pc = Arc::new(pc);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let track_tx = event_tx.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            Box::pin(async move {
                let info = MediaInfo {
                    kind: track.kind().to_string(),
                    id: track.id(),
                };
                info!(kind = %info.kind, id = %info.id, "inbound track started");
                if tx.send(LinkEvent::TrackStarted(info)).await.is_err() {
                    return;
                }
                pump_track(track, tx).await;
            })
        }));

        let ice_tx = event_tx.clone();
        pc.on_ice_connection_state_change(Box::new(move |state| {
            debug!(%state, "ice connection state changed");
            let lost = matches!(
                state,
                RTCIceConnectionState::Failed | RTCIceConnectionState::Disconnected
            );
            let tx = ice_tx.clone();
            Box::pin(async move {
                if lost {
                    let _ = tx.send(LinkEvent::Lost).await;
                }
            })
        }));

        Ok((Arc::new(RtcLink { pc }), event_rx))
    }
}

// ── Link ──────────────────────────────────────────────────────────────────────

struct RtcLink {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl MediaLink for RtcLink {
    async fn create_recv_offer(&self, media: MediaKinds) -> Result<SessionDescription, LinkError> {
        if !media.any() {
            return Err(LinkError::Offer {
                reason: "no media kinds requested".into(),
            });
        }

        if media.video {
            self.pc
                .add_transceiver_from_kind(RTPCodecType::Video, Some(recv_only()))
                .await
                .map_err(|e| LinkError::Offer { reason: e.to_string() })?;
        }
        if media.audio {
            self.pc
                .add_transceiver_from_kind(RTPCodecType::Audio, Some(recv_only()))
                .await
                .map_err(|e| LinkError::Offer { reason: e.to_string() })?;
        }

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| LinkError::Offer { reason: e.to_string() })?;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| LinkError::Offer { reason: e.to_string() })?;

        let local = self.pc.local_description().await.ok_or_else(|| LinkError::Offer {
            reason: "local description missing after set".into(),
        })?;
        Ok(SessionDescription {
            sdp: local.sdp,
            kind: local.sdp_type.to_string(),
        })
    }

    async fn apply_answer(&self, answer: SessionDescription) -> Result<(), LinkError> {
        let desc = RTCSessionDescription::answer(answer.sdp)
            .map_err(|e| LinkError::Answer { reason: e.to_string() })?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| LinkError::Answer { reason: e.to_string() })
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!(error = %e, "error closing peer connection");
        }
    }
}

fn recv_only() -> RTCRtpTransceiverInit {
    RTCRtpTransceiverInit {
        direction: RTCRtpTransceiverDirection::Recvonly,
        send_encodings: vec![],
    }
}

/// Read RTP from one inbound track, flushing counter deltas about once a
/// second. Exits when the track or the event channel closes.
async fn pump_track(track: Arc<TrackRemote>, tx: mpsc::Sender<LinkEvent>) {
    let mut pending = PlaybackStats::default();
    let mut last_flush = Instant::now();
    loop {
        match track.read_rtp().await {
            Ok((packet, _attributes)) => {
                pending.packets += 1;
                pending.bytes += packet.payload.len() as u64;
                if last_flush.elapsed() >= STATS_FLUSH_INTERVAL {
                    if tx.send(LinkEvent::Stats(pending)).await.is_err() {
                        return;
                    }
                    pending = PlaybackStats::default();
                    last_flush = Instant::now();
                }
            }
            Err(e) => {
                debug!(error = %e, "track reader finished");
                return;
            }
        }
    }
}
