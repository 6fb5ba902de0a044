//! Compiler error types

use crate::ast::SourceLocation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    /// User-facing compliance violation, reported with its source location.
    /// Aborts compilation of the current file.
    #[error("{msg} (at {location})")]
    TypeError { msg: String, location: SourceLocation },

    /// Unsupported construct or width mismatch reaching the lowering layer.
    /// Indicates a bug in an upstream checker, not a user error.
    #[error("Lowering error: {0}")]
    Lowering(String),

    /// Internal consistency failure, e.g. a verifying-key query length that
    /// does not match the primary-input count
    #[error("Internal error: {0}")]
    Internal(String),

    /// Malformed key file produced by the external key generator
    #[error("Malformed verification key: {0}")]
    KeyFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Runtime(#[from] zircon_runtime::RuntimeError),
}

impl CompilerError {
    pub fn type_error(msg: impl Into<String>, location: SourceLocation) -> Self {
        Self::TypeError { msg: msg.into(), location }
    }

    pub fn lowering(msg: impl Into<String>) -> Self {
        Self::Lowering(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn key_format(msg: impl Into<String>) -> Self {
        Self::KeyFormat(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
