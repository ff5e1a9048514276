use serde::{Deserialize, Serialize};

// MARK: - MediaKinds

/// Which media kinds the viewer asks to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaKinds {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaKinds {
    fn default() -> Self {
        Self { audio: true, video: true }
    }
}

impl MediaKinds {
    pub fn video_only() -> Self {
        Self { audio: false, video: true }
    }

    pub fn any(&self) -> bool {
        self.audio || self.video
    }
}

// MARK: - SessionDescription

/// Offer/answer payload exchanged with the signaling endpoint.
///
/// Serializes as `{"sdp": ..., "type": ...}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into(), kind: "offer".into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into(), kind: "answer".into() }
    }
}

// MARK: - Phase

/// Viewer lifecycle state.
///
/// Exactly one value at a time; the retry control is enabled whenever the
/// phase is not [`Phase::Checking`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Checking,
    Available,
    Unavailable(UnavailableReason),
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Checking => "Checking…",
            Phase::Available => "Streaming",
            Phase::Unavailable(_) => "Stream not started",
        }
    }

    pub fn is_checking(&self) -> bool {
        matches!(self, Phase::Checking)
    }

    /// The single user-visible error line, when there is one.
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Phase::Unavailable(reason) => Some(reason.message()),
            _ => None,
        }
    }
}

// MARK: - UnavailableReason

/// Why the stream is not being shown right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The signaling endpoint rejected the availability probe (non-2xx).
    NotYetAvailable,
    /// The endpoint answered but the body carried no usable description.
    NoStream,
    /// The probe itself failed (network unreachable, handshake construction).
    ProbeFailed,
    /// Establishing the media session failed.
    StartFailed,
    /// ICE connectivity was lost after the session was up.
    LinkLost,
}

impl UnavailableReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotYetAvailable => "stream not yet available",
            Self::NoStream => "stream unavailable",
            Self::ProbeFailed => "error while checking stream availability",
            Self::StartFailed => "error starting stream",
            Self::LinkLost => "connection lost",
        }
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// MARK: - MediaInfo

/// Inbound track attached to the playback surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// "audio" or "video".
    pub kind: String,
    pub id: String,
}

// MARK: - PlaybackStats

/// Rolling inbound RTP counters shown next to the playback surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStats {
    pub packets: u64,
    pub bytes: u64,
}
