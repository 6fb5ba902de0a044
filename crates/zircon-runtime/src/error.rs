//! Error types shared across the zircon toolchain

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors arising from external proving-tool artifacts
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Malformed key file produced by the external key generator
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Malformed proof data
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other errors not covered by specific variants
    #[error("{0}")]
    Other(String),
}

impl RuntimeError {
    pub fn invalid_key_material(msg: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial(msg.into())
    }

    pub fn invalid_proof(msg: impl Into<String>) -> Self {
        Self::InvalidProof(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
