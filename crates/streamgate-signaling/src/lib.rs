//! HTTP signaling client.
//!
//! The exchange with the publisher is a single round-trip per peer
//! connection:
//!
//! ```text
//! POST {base_url}{offer_path}   body: {"sdp": ..., "type": "offer"}
//!   ├─ 2xx  {"sdp": ..., "type": "answer"}  → stream is being published
//!   ├─ 2xx  body missing sdp or type        → no stream right now
//!   └─ non-2xx                              → no stream right now
//! ```
//!
//! The client takes no position on what the caller does with an answer;
//! the availability probe discards it, the connect path applies it.

use serde::Deserialize;
use streamgate_core::{SessionDescription, SignalingConfig};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("signaling endpoint rejected the offer (HTTP {status})")]
    Rejected { status: u16 },

    #[error("signaling answer is missing sdp or type")]
    MissingFields,

    #[error("signaling answer body invalid: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("signaling request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Answer body with both fields optional, so an empty `{}` parses and is
/// reported as [`SignalingError::MissingFields`] rather than a parse error.
#[derive(Debug, Deserialize)]
struct RawAnswer {
    #[serde(default)]
    sdp: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

pub struct SignalingClient {
    http: reqwest::Client,
    offer_url: String,
}

impl SignalingClient {
    pub fn new(config: &SignalingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            offer_url: config.offer_url(),
        }
    }

    pub fn offer_url(&self) -> &str {
        &self.offer_url
    }

    /// Submit a local offer and return the remote answer.
    pub async fn post_offer(
        &self,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, SignalingError> {
        debug!(url = %self.offer_url, "posting offer");
        let response = self.http.post(&self.offer_url).json(offer).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "offer rejected");
            return Err(SignalingError::Rejected { status: status.as_u16() });
        }

        let body = response.text().await?;
        let raw: RawAnswer = serde_json::from_str(&body)?;
        match (raw.sdp, raw.kind) {
            (Some(sdp), Some(kind)) if !sdp.is_empty() && !kind.is_empty() => {
                debug!(kind = %kind, "received answer");
                Ok(SessionDescription { sdp, kind })
            }
            _ => Err(SignalingError::MissingFields),
        }
    }
}
