//! Error types for Concord core primitives

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the arithmetic kernel, the proof systems and the sharing primitives
#[derive(Debug, Error)]
pub enum Error {
    /// A required value is missing, empty, or has the wrong length
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// An algebraic check failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// An algebraic check failed in a specific round of a multi-round proof
    #[error("Verification failed at round {index}: {check}")]
    VerificationAt { index: usize, check: String },

    /// The tested modulus does not have the required shape
    #[error("Invalid modulus: {0}")]
    ModulusShape(String),

    /// A condition that cannot occur for correctly constructed inputs
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Generation was cancelled or ran past its deadline
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Curve or field conversion failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error signals a broken internal invariant rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InternalInvariant(_))
    }
}

impl From<bitcode::Error> for Error {
    fn from(e: bitcode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
