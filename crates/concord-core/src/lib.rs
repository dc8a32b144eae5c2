//! Concord Core - Arithmetic kernel and zero-knowledge proofs
//!
//! This crate provides the big-integer kernel, Fiat-Shamir hashing, safe-prime
//! generation, Paillier keys with their proofs, and the sharing primitives used
//! by Concord threshold ECDSA key generation and resharing.

pub mod commitments;
pub mod dlnproof;
pub mod ec;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod int;
pub mod paillier;
pub mod prime;
pub mod random;
pub mod vss;

pub use commitments::{HashCommitDecommit, HashCommitment, HashDeCommitment};
pub use dlnproof::{DlnProof, DlnProofBytes, DLN_PROOF_ITERATIONS};
pub use encoding::{marshal_signed, unmarshal_signed};
pub use error::{Error, Result};
pub use hash::{hash_to_n, sha512_256, sha512_256i};
pub use int::ModInt;
pub use paillier::{FactorProof, KeyProof, ModProof, ParamProof, PrivateKey, PublicKey};
pub use prime::{GenerationContext, SafePrime};
pub use vss::{Share, Vs};
