pub mod config;
pub mod errors;
pub mod link;
pub mod types;

pub use config::{IceConfig, IceServer, SignalingConfig, ViewerConfig};
pub use errors::ConfigError;
pub use link::{LinkError, LinkEvent, LinkFactory, MediaLink};
pub use types::*;
