//! Zircon Runtime
//!
//! Shared proving-scheme data types and error handling for the zircon
//! privacy compiler. Curve points and proofs are produced by external
//! key-generation and proving tools; this crate only models and formats
//! them, it never computes on them.

pub mod error;
pub mod types;

// Re-export core types for convenience
pub use error::{Result, RuntimeError};
pub use types::{G1Point, G2Point, Proof};
