//! Key generation message bodies

use bitcode::{Decode, Encode};
use concord_core::ec::{scalar_from_bigint, scalar_to_bigint};
use concord_core::encoding::{
    bytes_to_ints, from_unsigned_bytes, ints_to_bytes, non_empty_bytes, non_empty_multi_bytes,
    to_unsigned_bytes,
};
use concord_core::paillier::wire::{FactorProofBytes, KeyProofBytes, ModProofBytes, ParamProofBytes};
use concord_core::paillier::{FactorProof, KeyProof, ModProof, ParamProof, PublicKey};
use concord_core::{DlnProof, DlnProofBytes, HashCommitment, HashDeCommitment};
use k256::Scalar;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::MessageContent;
use crate::verifier::{DlnMessage, FactorMessage, KeyProofMessage, ModMessage, ParamMessage};

/// Every message exchanged during key generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum KeygenContent {
    Round1(KgRound1Message),
    Round2Share(KgRound2Message1),
    Round2DeCommit(KgRound2Message2),
    Round3(KgRound3Message),
}

impl KeygenContent {
    /// Whether this kind of message is sent to everyone
    pub fn expects_broadcast(&self) -> bool {
        !matches!(self, KeygenContent::Round2Share(_))
    }
}

impl MessageContent for KeygenContent {
    fn validate_basic(&self) -> bool {
        match self {
            KeygenContent::Round1(m) => m.validate_basic(),
            KeygenContent::Round2Share(m) => m.validate_basic(),
            KeygenContent::Round2DeCommit(m) => m.validate_basic(),
            KeygenContent::Round3(m) => m.validate_basic(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            KeygenContent::Round1(_) => "KGRound1Message",
            KeygenContent::Round2Share(_) => "KGRound2Message1",
            KeygenContent::Round2DeCommit(_) => "KGRound2Message2",
            KeygenContent::Round3(_) => "KGRound3Message",
        }
    }
}

/// Round 1 broadcast: commitment, Paillier modulus, auxiliary parameters and their proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct KgRound1Message {
    pub commitment: Vec<u8>,
    pub paillier_n: Vec<u8>,
    pub n_tilde: Vec<u8>,
    pub h1: Vec<u8>,
    pub h2: Vec<u8>,
    pub dln_proof_1: DlnProofBytes,
    pub dln_proof_2: DlnProofBytes,
    pub param_proof: ParamProofBytes,
    pub mod_proof: ModProofBytes,
}

impl KgRound1Message {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        commitment: &HashCommitment,
        paillier_pk: &PublicKey,
        n_tilde: &BigInt,
        h1: &BigInt,
        h2: &BigInt,
        dln_proof_1: &DlnProof,
        dln_proof_2: &DlnProof,
        param_proof: &ParamProof,
        mod_proof: &ModProof,
    ) -> Self {
        Self {
            commitment: to_unsigned_bytes(commitment),
            paillier_n: to_unsigned_bytes(&paillier_pk.n),
            n_tilde: to_unsigned_bytes(n_tilde),
            h1: to_unsigned_bytes(h1),
            h2: to_unsigned_bytes(h2),
            dln_proof_1: DlnProofBytes::from_proof(dln_proof_1),
            dln_proof_2: DlnProofBytes::from_proof(dln_proof_2),
            param_proof: ParamProofBytes::from_proof(param_proof),
            mod_proof: ModProofBytes::from_proof(mod_proof),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_bytes(&self.commitment)
            && non_empty_bytes(&self.paillier_n)
            && non_empty_bytes(&self.n_tilde)
            && non_empty_bytes(&self.h1)
            && non_empty_bytes(&self.h2)
            && self.dln_proof_1.validate_basic()
            && self.dln_proof_2.validate_basic()
            && self.param_proof.validate_basic()
            && self.mod_proof.validate_basic()
    }

    pub fn unmarshal_commitment(&self) -> HashCommitment {
        from_unsigned_bytes(&self.commitment)
    }

    pub fn unmarshal_paillier_pk(&self) -> PublicKey {
        PublicKey::new(from_unsigned_bytes(&self.paillier_n))
    }

    pub fn unmarshal_n_tilde(&self) -> BigInt {
        from_unsigned_bytes(&self.n_tilde)
    }

    pub fn unmarshal_h1(&self) -> BigInt {
        from_unsigned_bytes(&self.h1)
    }

    pub fn unmarshal_h2(&self) -> BigInt {
        from_unsigned_bytes(&self.h2)
    }
}

impl DlnMessage for KgRound1Message {
    fn dln_proof_1(&self) -> &DlnProofBytes {
        &self.dln_proof_1
    }

    fn dln_proof_2(&self) -> &DlnProofBytes {
        &self.dln_proof_2
    }
}

impl ParamMessage for KgRound1Message {
    fn param_proof(&self) -> &ParamProofBytes {
        &self.param_proof
    }
}

impl ModMessage for KgRound1Message {
    fn mod_proof(&self) -> &ModProofBytes {
        &self.mod_proof
    }
}

/// Round 2 P2P: the receiver's share and a no-small-factor proof under the receiver's parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct KgRound2Message1 {
    pub share: Vec<u8>,
    pub factor_proof: FactorProofBytes,
}

impl KgRound2Message1 {
    pub fn new(share: &Scalar, factor_proof: &FactorProof) -> Self {
        Self {
            share: to_unsigned_bytes(&scalar_to_bigint(share)),
            factor_proof: FactorProofBytes::from_proof(factor_proof),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_bytes(&self.share) && self.factor_proof.validate_basic()
    }

    pub fn unmarshal_share(&self) -> Result<Scalar> {
        Ok(scalar_from_bigint(&from_unsigned_bytes(&self.share))?)
    }
}

impl FactorMessage for KgRound2Message1 {
    fn factor_proof(&self) -> &FactorProofBytes {
        &self.factor_proof
    }
}

/// Round 2 broadcast: opening of the round 1 commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct KgRound2Message2 {
    pub de_commitment: Vec<Vec<u8>>,
}

impl KgRound2Message2 {
    pub fn new(de_commitment: &HashDeCommitment) -> Self {
        Self {
            de_commitment: ints_to_bytes(de_commitment),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_multi_bytes(&self.de_commitment, None)
    }

    pub fn unmarshal_de_commitment(&self) -> HashDeCommitment {
        bytes_to_ints(&self.de_commitment)
    }
}

/// Round 3 broadcast: Paillier key-correctness proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct KgRound3Message {
    pub key_proof: KeyProofBytes,
}

impl KgRound3Message {
    pub fn new(proof: &KeyProof) -> Self {
        Self {
            key_proof: KeyProofBytes::from_proof(proof),
        }
    }

    pub fn validate_basic(&self) -> bool {
        self.key_proof.validate_basic()
    }
}

impl KeyProofMessage for KgRound3Message {
    fn key_proof(&self) -> &KeyProofBytes {
        &self.key_proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decommit_message_roundtrip() {
        let d: HashDeCommitment = vec![BigInt::from(9), BigInt::from(300)];
        let msg = KgRound2Message2::new(&d);
        assert!(msg.validate_basic());
        assert_eq!(msg.unmarshal_de_commitment(), d);
        assert!(!KgRound2Message2 { de_commitment: vec![vec![1], Vec::new()] }.validate_basic());
    }

    #[test]
    fn test_short_key_proof_fails_validation() {
        let msg = KgRound3Message {
            key_proof: KeyProofBytes(vec![vec![1]; 3]),
        };
        assert!(!KeygenContent::Round3(msg).validate_basic());
    }

    #[test]
    fn test_only_shares_are_p2p() {
        let dc = KeygenContent::Round2DeCommit(KgRound2Message2 {
            de_commitment: vec![vec![1]],
        });
        assert!(dc.expects_broadcast());
        assert_eq!(dc.type_name(), "KGRound2Message2");
    }
}
