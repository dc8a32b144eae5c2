//! Hash commitments: `C = H(r, secrets...)`, opened by revealing `D = [r, secrets...]`

use num_bigint::{BigInt, RandBigInt};
use rand::{CryptoRng, RngCore};

use crate::hash::sha512_256i;

/// Bit length of the commitment blinding value
pub const COMMITMENT_RANDOMNESS_BITS: u64 = 256;

pub type HashCommitment = BigInt;
pub type HashDeCommitment = Vec<BigInt>;

/// A commitment together with its opening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCommitDecommit {
    pub c: HashCommitment,
    pub d: HashDeCommitment,
}

impl HashCommitDecommit {
    /// Commit to `secrets` under fresh randomness
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, secrets: &[BigInt]) -> Self {
        let r = BigInt::from(rng.gen_biguint(COMMITMENT_RANDOMNESS_BITS));
        Self::with_randomness(r, secrets)
    }

    pub fn with_randomness(r: BigInt, secrets: &[BigInt]) -> Self {
        let mut d = Vec::with_capacity(secrets.len() + 1);
        d.push(r);
        d.extend_from_slice(secrets);
        let refs: Vec<&BigInt> = d.iter().collect();
        let c = sha512_256i(&refs);
        Self { c, d }
    }

    /// Rebuild from a received commitment and a later opening
    pub fn from_parts(c: HashCommitment, d: HashDeCommitment) -> Self {
        Self { c, d }
    }

    /// Whether the opening hashes to the commitment
    pub fn verify(&self) -> bool {
        if self.d.is_empty() {
            return false;
        }
        let refs: Vec<&BigInt> = self.d.iter().collect();
        sha512_256i(&refs) == self.c
    }

    /// The committed secrets, if the opening is valid
    pub fn decommit(&self) -> Option<&[BigInt]> {
        if self.verify() {
            Some(&self.d[1..])
        } else {
            None
        }
    }
}
