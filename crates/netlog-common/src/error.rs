//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, NetlogError>;

/// Main error type for shared operations
#[derive(Error, Debug)]
pub enum NetlogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid call sign: {0:?}")]
    InvalidCallSign(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
