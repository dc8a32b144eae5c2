//! Error types for the Concord protocol rounds

use std::fmt;

use thiserror::Error;

use crate::party::PartyId;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, TssError>;

/// Errors that can occur while running a protocol
#[derive(Debug, Error)]
pub enum TssError {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] concord_core::Error),

    /// Invalid protocol parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The party or round was driven out of order
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A message failed basic validation or routing checks
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A round failed, naming the parties to blame
    #[error(transparent)]
    Round(#[from] RoundError),
}

impl From<bitcode::Error> for TssError {
    fn from(e: bitcode::Error) -> Self {
        TssError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for TssError {
    fn from(e: serde_json::Error) -> Self {
        TssError::Serialization(e.to_string())
    }
}

impl TssError {
    /// A broken internal invariant rather than a peer or caller mistake
    pub fn is_fatal(&self) -> bool {
        matches!(self, TssError::Core(e) if e.is_fatal())
    }

    /// Parties blamed for the failure, empty unless this is a round error
    pub fn culprits(&self) -> &[PartyId] {
        match self {
            TssError::Round(e) => &e.culprits,
            _ => &[],
        }
    }
}

/// A round failure carrying every party found misbehaving in that round
#[derive(Debug, Clone)]
pub struct RoundError {
    pub cause: String,
    pub task: &'static str,
    pub round: u32,
    pub victim: Option<PartyId>,
    pub culprits: Vec<PartyId>,
}

impl RoundError {
    pub fn new(
        cause: impl Into<String>,
        task: &'static str,
        round: u32,
        victim: Option<PartyId>,
        culprits: Vec<PartyId>,
    ) -> Self {
        Self {
            cause: cause.into(),
            task,
            round,
            victim,
            culprits,
        }
    }
}

impl fmt::Display for RoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {}, round {}", self.task, self.round)?;
        if let Some(victim) = &self.victim {
            write!(f, ", party {}", victim)?;
        }
        if !self.culprits.is_empty() {
            let names: Vec<String> = self.culprits.iter().map(|c| c.to_string()).collect();
            write!(f, ", culprits [{}]", names.join(", "))?;
        }
        write!(f, ": {}", self.cause)
    }
}

impl std::error::Error for RoundError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_internal_invariants_are_fatal() {
        let fatal: TssError = concord_core::Error::InternalInvariant("no quartic residue".to_string()).into();
        assert!(fatal.is_fatal());
        let bad_input: TssError = concord_core::Error::Verification("mod proof".to_string()).into();
        assert!(!bad_input.is_fatal());
        let round: TssError = RoundError::new("bad proof", "test", 2, None, Vec::new()).into();
        assert!(!round.is_fatal());
    }
}
