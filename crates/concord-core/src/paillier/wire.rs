//! Byte-level shapes of the Paillier proofs as carried inside round messages.
//!
//! Decoding is two-phase: `validate_basic` checks presence and array lengths,
//! then `to_proof` rebuilds the integers. Public values travel unsigned; the
//! factor proof's `sigma` and responses can be negative and use the signed
//! encoding.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::{FactorProof, KeyProof, ModProof, ParamProof, KEY_PROOF_ITERATIONS};
use super::{MOD_PROOF_ITERATIONS, PARAM_PROOF_ITERATIONS};
use crate::encoding::{
    bytes_to_ints, from_unsigned_bytes, ints_to_bytes, marshal_signed, non_empty_bools,
    non_empty_bytes, non_empty_multi_bytes, to_unsigned_bytes, unmarshal_signed,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ParamProofBytes {
    pub a: Vec<Vec<u8>>,
    pub z: Vec<Vec<u8>>,
}

impl ParamProofBytes {
    pub fn from_proof(proof: &ParamProof) -> Self {
        Self {
            a: ints_to_bytes(&proof.a),
            z: ints_to_bytes(&proof.z),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_multi_bytes(&self.a, Some(PARAM_PROOF_ITERATIONS))
            && non_empty_multi_bytes(&self.z, Some(PARAM_PROOF_ITERATIONS))
    }

    pub fn to_proof(&self) -> Result<ParamProof> {
        if !self.validate_basic() {
            return Err(Error::Malformed("param proof bytes".to_string()));
        }
        Ok(ParamProof {
            a: bytes_to_ints(&self.a),
            z: bytes_to_ints(&self.z),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ModProofBytes {
    pub w: Vec<u8>,
    pub x: Vec<Vec<u8>>,
    pub a: Vec<bool>,
    pub b: Vec<bool>,
    pub z: Vec<Vec<u8>>,
}

impl ModProofBytes {
    pub fn from_proof(proof: &ModProof) -> Self {
        Self {
            w: to_unsigned_bytes(&proof.w),
            x: ints_to_bytes(&proof.x),
            a: proof.a.clone(),
            b: proof.b.clone(),
            z: ints_to_bytes(&proof.z),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_bytes(&self.w)
            && non_empty_multi_bytes(&self.x, Some(MOD_PROOF_ITERATIONS))
            && non_empty_bools(&self.a, MOD_PROOF_ITERATIONS)
            && non_empty_bools(&self.b, MOD_PROOF_ITERATIONS)
            && non_empty_multi_bytes(&self.z, Some(MOD_PROOF_ITERATIONS))
    }

    pub fn to_proof(&self) -> Result<ModProof> {
        if !self.validate_basic() {
            return Err(Error::Malformed("mod proof bytes".to_string()));
        }
        Ok(ModProof {
            w: from_unsigned_bytes(&self.w),
            x: bytes_to_ints(&self.x),
            a: self.a.clone(),
            b: self.b.clone(),
            z: bytes_to_ints(&self.z),
        })
    }
}

/// Eleven fields. `p, q, a, b, t` are unsigned magnitudes; `sigma, z1, z2,
/// w1, w2, v` are sign-prefixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct FactorProofBytes {
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub a: Vec<u8>,
    pub b: Vec<u8>,
    pub t: Vec<u8>,
    pub sigma: Vec<u8>,
    pub z1: Vec<u8>,
    pub z2: Vec<u8>,
    pub w1: Vec<u8>,
    pub w2: Vec<u8>,
    pub v: Vec<u8>,
}

impl FactorProofBytes {
    pub fn from_proof(proof: &FactorProof) -> Self {
        Self {
            p: to_unsigned_bytes(&proof.p),
            q: to_unsigned_bytes(&proof.q),
            a: to_unsigned_bytes(&proof.a),
            b: to_unsigned_bytes(&proof.b),
            t: to_unsigned_bytes(&proof.t),
            sigma: marshal_signed(&proof.sigma),
            z1: marshal_signed(&proof.z1),
            z2: marshal_signed(&proof.z2),
            w1: marshal_signed(&proof.w1),
            w2: marshal_signed(&proof.w2),
            v: marshal_signed(&proof.v),
        }
    }

    pub fn validate_basic(&self) -> bool {
        [
            &self.p,
            &self.q,
            &self.a,
            &self.b,
            &self.t,
            &self.sigma,
            &self.z1,
            &self.z2,
            &self.w1,
            &self.w2,
            &self.v,
        ]
        .iter()
        .all(|bz| non_empty_bytes(bz))
    }

    pub fn to_proof(&self) -> Result<FactorProof> {
        if !self.validate_basic() {
            return Err(Error::Malformed("factor proof bytes".to_string()));
        }
        Ok(FactorProof {
            p: from_unsigned_bytes(&self.p),
            q: from_unsigned_bytes(&self.q),
            a: from_unsigned_bytes(&self.a),
            b: from_unsigned_bytes(&self.b),
            t: from_unsigned_bytes(&self.t),
            sigma: unmarshal_signed(&self.sigma),
            z1: unmarshal_signed(&self.z1),
            z2: unmarshal_signed(&self.z2),
            w1: unmarshal_signed(&self.w1),
            w2: unmarshal_signed(&self.w2),
            v: unmarshal_signed(&self.v),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct KeyProofBytes(pub Vec<Vec<u8>>);

impl KeyProofBytes {
    pub fn from_proof(proof: &KeyProof) -> Self {
        Self(ints_to_bytes(&proof.0))
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_multi_bytes(&self.0, Some(KEY_PROOF_ITERATIONS))
    }

    pub fn to_proof(&self) -> Result<KeyProof> {
        if !self.validate_basic() {
            return Err(Error::Malformed("key proof bytes".to_string()));
        }
        Ok(KeyProof(bytes_to_ints(&self.0)))
    }
}
