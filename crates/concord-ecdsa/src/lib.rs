//! Concord ECDSA - Round-based threshold key generation and resharing
//!
//! This crate drives the multi-party protocols built on `concord-core`: a
//! three-round key generation and a six-round redistribution of an existing
//! key to a new committee. Every round verifies its peers' proofs through a
//! bounded concurrent verifier and fails with the complete list of culprits.

pub mod config;
pub mod error;
pub mod keygen;
pub mod message;
pub mod party;
pub mod resharing;
pub mod round;
pub mod save_data;
pub mod verifier;

mod culprits;

pub use config::{Committee, Parameters, ProtocolConfig, ReSharingParameters};
pub use error::{Result, RoundError, TssError};
pub use message::{Message, MessageContent, MessageRouting};
pub use party::{PartyId, SortedPartyIds};
pub use round::{BaseParty, Round};
pub use save_data::{LocalPartySaveData, LocalPreParams};
pub use verifier::{JoinBarrier, ProofVerifier};
