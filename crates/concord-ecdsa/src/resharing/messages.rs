//! Resharing message bodies

use bitcode::{Decode, Encode};
use concord_core::ec::{point_from_bytes, point_to_bytes, scalar_from_bigint, scalar_to_bigint};
use concord_core::encoding::{
    bytes_to_ints, from_unsigned_bytes, ints_to_bytes, non_empty_bytes, non_empty_multi_bytes,
    to_unsigned_bytes,
};
use concord_core::paillier::wire::{FactorProofBytes, KeyProofBytes, ModProofBytes};
use concord_core::paillier::{FactorProof, KeyProof, ModProof, PublicKey};
use concord_core::{DlnProof, DlnProofBytes, HashCommitment, HashDeCommitment};
use k256::{ProjectivePoint, Scalar};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::MessageContent;
use crate::verifier::{
    DlnMessage, FactorMessage, FactorTildeMessage, KeyProofMessage, ModMessage, ModTildeMessage,
};

/// Every message exchanged during resharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ResharingContent {
    Round1(DgRound1Message),
    Round2Params(DgRound2Message1),
    Round2Ack(DgRound2Message2),
    Round3Share(DgRound3Message1),
    Round3DeCommit(DgRound3Message2),
    Round4Proofs(DgRound4Message1),
    Round4Ack(DgRound4Message2),
    Round5Ack(DgRound5Message),
}

impl ResharingContent {
    /// Whether the sender belongs to the old committee
    pub fn from_old_committee(&self) -> bool {
        matches!(
            self,
            ResharingContent::Round1(_)
                | ResharingContent::Round3Share(_)
                | ResharingContent::Round3DeCommit(_)
        )
    }

    pub fn expects_broadcast(&self) -> bool {
        !matches!(
            self,
            ResharingContent::Round3Share(_) | ResharingContent::Round4Proofs(_)
        )
    }
}

impl MessageContent for ResharingContent {
    fn validate_basic(&self) -> bool {
        match self {
            ResharingContent::Round1(m) => m.validate_basic(),
            ResharingContent::Round2Params(m) => m.validate_basic(),
            ResharingContent::Round3Share(m) => m.validate_basic(),
            ResharingContent::Round3DeCommit(m) => m.validate_basic(),
            ResharingContent::Round4Proofs(m) => m.validate_basic(),
            ResharingContent::Round2Ack(_) | ResharingContent::Round4Ack(_) | ResharingContent::Round5Ack(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ResharingContent::Round1(_) => "DGRound1Message",
            ResharingContent::Round2Params(_) => "DGRound2Message1",
            ResharingContent::Round2Ack(_) => "DGRound2Message2",
            ResharingContent::Round3Share(_) => "DGRound3Message1",
            ResharingContent::Round3DeCommit(_) => "DGRound3Message2",
            ResharingContent::Round4Proofs(_) => "DGRound4Message1",
            ResharingContent::Round4Ack(_) => "DGRound4Message2",
            ResharingContent::Round5Ack(_) => "DGRound5Message",
        }
    }
}

/// Round 1, old to new: the group key and a commitment to the resharing polynomial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound1Message {
    pub ecdsa_pub: Vec<u8>,
    pub v_commitment: Vec<u8>,
}

impl DgRound1Message {
    pub fn new(ecdsa_pub: &ProjectivePoint, v_commitment: &HashCommitment) -> Self {
        Self {
            ecdsa_pub: point_to_bytes(ecdsa_pub),
            v_commitment: to_unsigned_bytes(v_commitment),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_bytes(&self.ecdsa_pub) && non_empty_bytes(&self.v_commitment)
    }

    pub fn unmarshal_ecdsa_pub(&self) -> Result<ProjectivePoint> {
        Ok(point_from_bytes(&self.ecdsa_pub)?)
    }

    pub fn unmarshal_v_commitment(&self) -> HashCommitment {
        from_unsigned_bytes(&self.v_commitment)
    }
}

/// Round 2, new to new: Paillier key, auxiliary parameters and their proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound2Message1 {
    pub paillier_n: Vec<u8>,
    pub key_proof: KeyProofBytes,
    pub n_tilde: Vec<u8>,
    pub h1: Vec<u8>,
    pub h2: Vec<u8>,
    pub dln_proof_1: DlnProofBytes,
    pub dln_proof_2: DlnProofBytes,
    pub mod_proof: ModProofBytes,
    pub mod_proof_tilde: ModProofBytes,
}

impl DgRound2Message1 {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        paillier_pk: &PublicKey,
        key_proof: &KeyProof,
        n_tilde: &BigInt,
        h1: &BigInt,
        h2: &BigInt,
        dln_proof_1: &DlnProof,
        dln_proof_2: &DlnProof,
        mod_proof: &ModProof,
        mod_proof_tilde: &ModProof,
    ) -> Self {
        Self {
            paillier_n: to_unsigned_bytes(&paillier_pk.n),
            key_proof: KeyProofBytes::from_proof(key_proof),
            n_tilde: to_unsigned_bytes(n_tilde),
            h1: to_unsigned_bytes(h1),
            h2: to_unsigned_bytes(h2),
            dln_proof_1: DlnProofBytes::from_proof(dln_proof_1),
            dln_proof_2: DlnProofBytes::from_proof(dln_proof_2),
            mod_proof: ModProofBytes::from_proof(mod_proof),
            mod_proof_tilde: ModProofBytes::from_proof(mod_proof_tilde),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_bytes(&self.paillier_n)
            && self.key_proof.validate_basic()
            && non_empty_bytes(&self.n_tilde)
            && non_empty_bytes(&self.h1)
            && non_empty_bytes(&self.h2)
            && self.dln_proof_1.validate_basic()
            && self.dln_proof_2.validate_basic()
            && self.mod_proof.validate_basic()
            && self.mod_proof_tilde.validate_basic()
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

impl KeyProofMessage for DgRound2Message1 {
    fn key_proof(&self) -> &KeyProofBytes {
        &self.key_proof
    }
}

impl DlnMessage for DgRound2Message1 {
    fn dln_proof_1(&self) -> &DlnProofBytes {
        &self.dln_proof_1
    }

    fn dln_proof_2(&self) -> &DlnProofBytes {
        &self.dln_proof_2
    }
}

impl ModMessage for DgRound2Message1 {
    fn mod_proof(&self) -> &ModProofBytes {
        &self.mod_proof
    }
}

impl ModTildeMessage for DgRound2Message1 {
    fn mod_proof_tilde(&self) -> &ModProofBytes {
        &self.mod_proof_tilde
    }
}

/// Round 2, new to old: acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound2Message2 {}

/// Round 3, old to new P2P: the receiver's share of the weighted secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound3Message1 {
    pub share: Vec<u8>,
}

impl DgRound3Message1 {
    pub fn new(share: &Scalar) -> Self {
        Self {
            share: to_unsigned_bytes(&scalar_to_bigint(share)),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_bytes(&self.share)
    }

    pub fn unmarshal_share(&self) -> Result<Scalar> {
        Ok(scalar_from_bigint(&from_unsigned_bytes(&self.share))?)
    }
}

/// Round 3, old to new: opening of the round 1 commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound3Message2 {
    pub v_decommitment: Vec<Vec<u8>>,
}

impl DgRound3Message2 {
    pub fn new(v_decommitment: &HashDeCommitment) -> Self {
        Self {
            v_decommitment: ints_to_bytes(v_decommitment),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_multi_bytes(&self.v_decommitment, None)
    }

    pub fn unmarshal_v_decommitment(&self) -> HashDeCommitment {
        bytes_to_ints(&self.v_decommitment)
    }
}

/// Round 4, new to new P2P: no-small-factor proofs for both moduli under the receiver's parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound4Message1 {
    pub factor_proof: FactorProofBytes,
    pub factor_proof_tilde: FactorProofBytes,
}

impl DgRound4Message1 {
    pub fn new(factor_proof: &FactorProof, factor_proof_tilde: &FactorProof) -> Self {
        Self {
            factor_proof: FactorProofBytes::from_proof(factor_proof),
            factor_proof_tilde: FactorProofBytes::from_proof(factor_proof_tilde),
        }
    }

    pub fn validate_basic(&self) -> bool {
        self.factor_proof.validate_basic() && self.factor_proof_tilde.validate_basic()
    }
}

impl FactorMessage for DgRound4Message1 {
    fn factor_proof(&self) -> &FactorProofBytes {
        &self.factor_proof
    }
}

impl FactorTildeMessage for DgRound4Message1 {
    fn factor_proof_tilde(&self) -> &FactorProofBytes {
        &self.factor_proof_tilde
    }
}

/// Round 4, new to both committees: acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound4Message2 {}

/// Round 5, new to both committees: factor proofs accepted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DgRound5Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committee_of_sender() {
        let share = ResharingContent::Round3Share(DgRound3Message1::new(&Scalar::ONE));
        assert!(share.from_old_committee());
        assert!(!share.expects_broadcast());

        let ack = ResharingContent::Round4Ack(DgRound4Message2::default());
        assert!(!ack.from_old_committee());
        assert!(ack.expects_broadcast());
        assert!(ack.validate_basic());
        assert_eq!(ack.type_name(), "DGRound4Message2");
    }

    #[test]
    fn test_round1_carries_group_key() {
        let point = ProjectivePoint::GENERATOR * Scalar::from(7u64);
        let msg = DgRound1Message::new(&point, &BigInt::from(12345));
        assert!(msg.validate_basic());
        assert_eq!(msg.unmarshal_ecdsa_pub().unwrap(), point);
        assert_eq!(msg.unmarshal_v_commitment(), BigInt::from(12345));

        let bad = DgRound1Message {
            ecdsa_pub: vec![0x02; 5],
            v_commitment: vec![1],
        };
        assert!(bad.unmarshal_ecdsa_pub().is_err());
    }

    #[test]
    fn test_empty_share_rejected() {
        let msg = DgRound3Message1 { share: Vec::new() };
        assert!(!ResharingContent::Round3Share(msg).validate_basic());
    }
}
