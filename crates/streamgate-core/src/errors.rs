use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file invalid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("configuration invalid: {reason}")]
    Invalid { reason: String },
}
