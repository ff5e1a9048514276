use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::MediaKinds;

/// Where offers are posted. The whole signaling exchange is one HTTP POST
/// per handle, so a base URL and a path are all there is to configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    pub base_url: String,
    pub offer_path: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            offer_path: "/offer".into(),
        }
    }
}

impl SignalingConfig {
    pub fn offer_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.offer_path)
    }
}

/// A single STUN or TURN entry, in the shape peer connections expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
}

/// Network-traversal servers handed to every peer connection, probe and
/// session alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub servers: Vec<IceServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                IceServer {
                    urls: vec!["stun:stun.l.google.com:19302".into()],
                    username: String::new(),
                    credential: String::new(),
                },
                IceServer {
                    urls: vec!["turn:relay.metered.ca:443".into()],
                    username: "open".into(),
                    credential: "open".into(),
                },
            ],
        }
    }
}

/// Full viewer configuration: one deployment variant per config file
/// instead of one per copy of the component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub signaling: SignalingConfig,
    pub ice: IceConfig,
    pub media: MediaKinds,
}

impl ViewerConfig {
    /// Load configuration from the file named by `STREAMGATE_CONFIG`,
    /// falling back to the built-in defaults when the variable is unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("STREAMGATE_CONFIG") {
            Ok(path) => {
                tracing::info!(%path, "loading viewer configuration");
                Self::from_path(Path::new(&path))
            }
            Err(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.signaling.base_url.starts_with("http://")
            && !self.signaling.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                reason: format!("signaling base_url is not http(s): {}", self.signaling.base_url),
            });
        }
        if !self.signaling.offer_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                reason: format!("offer_path must start with '/': {}", self.signaling.offer_path),
            });
        }
        if !self.media.any() {
            return Err(ConfigError::Invalid {
                reason: "no media kinds requested".into(),
            });
        }
        if self.ice.servers.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "no ICE servers configured".into(),
            });
        }
        Ok(())
    }
}
