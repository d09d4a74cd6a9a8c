//! Error types for powledger

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Invalid block linkage at index {0}")]
    InvalidBlockLinkage(u64),
    #[error("Invalid proof of work at index {0}")]
    InvalidProofOfWork(u64),
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Chain tip moved while mining; expected parent {expected}, found {found}")]
    StaleTip { expected: String, found: String },
    #[error("Mining was cancelled")]
    MiningCancelled,
    #[error("No valid proof follows {0}")]
    SearchExhausted(u64),
    #[error("Background task failed: {0}")]
    TaskFailed(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Malformed peer response: {0}")]
    MalformedResponse(String),
    #[error("Invalid peer address: {0}")]
    InvalidPeerAddress(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChainError::MalformedResponse(err.to_string())
        } else {
            ChainError::NetworkError(err.to_string())
        }
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
