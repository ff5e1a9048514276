//! Trait seam between the viewer lifecycle and the real-time media stack.
//!
//! The viewer never touches a peer connection directly; it opens links
//! through a [`LinkFactory`] and drives them through [`MediaLink`]. The
//! production implementation lives in `streamgate-rtc`; tests substitute
//! their own.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{MediaInfo, MediaKinds, PlaybackStats, SessionDescription};

/// Events emitted by an open media link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// An inbound track arrived. The first one owns the playback surface.
    TrackStarted(MediaInfo),
    /// Inbound RTP counters since the previous `Stats` event.
    Stats(PlaybackStats),
    /// ICE connectivity became failed or disconnected.
    Lost,
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("failed to construct peer connection: {reason}")]
    Setup { reason: String },

    #[error("failed to build local offer: {reason}")]
    Offer { reason: String },

    #[error("failed to apply remote answer: {reason}")]
    Answer { reason: String },
}

/// One negotiated (or in-negotiation) peer connection.
///
/// Links are single-use: create an offer, optionally apply the answer, and
/// close. `close` must be safe to call on every exit path, including after
/// a failed handshake.
#[async_trait]
pub trait MediaLink: Send + Sync {
    /// Add receive-only transceivers for the requested kinds and return the
    /// local session description.
    async fn create_recv_offer(&self, media: MediaKinds) -> Result<SessionDescription, LinkError>;

    /// Complete the offer/answer handshake with the peer's description.
    async fn apply_answer(&self, answer: SessionDescription) -> Result<(), LinkError>;

    /// Release the underlying connection. Idempotent.
    async fn close(&self);
}

/// Opens fresh [`MediaLink`]s, all sharing the same ICE configuration.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn open(&self) -> Result<(Arc<dyn MediaLink>, mpsc::Receiver<LinkEvent>), LinkError>;
}
