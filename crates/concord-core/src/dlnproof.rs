//! Discrete-log proof over a safe-prime modulus: knowledge of `x` with
//! `h2 = h1^x mod N`, where `N = (2p + 1)(2q + 1)`

use bitcode::{Decode, Encode};
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::encoding::{bytes_to_ints, ints_to_bytes, non_empty_multi_bytes};
use crate::error::{Error, Result};
use crate::hash::sha512_256i;
use crate::int::ModInt;
use crate::random::random_positive_int;

/// Parallel repetitions
pub const DLN_PROOF_ITERATIONS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlnProof {
    pub alpha: Vec<BigInt>,
    pub t: Vec<BigInt>,
}

fn challenge(h1: &BigInt, h2: &BigInt, n: &BigInt, alpha: &[BigInt]) -> BigInt {
    let mut msg: Vec<&BigInt> = Vec::with_capacity(alpha.len() + 3);
    msg.push(h1);
    msg.push(h2);
    msg.push(n);
    msg.extend(alpha.iter());
    sha512_256i(&msg)
}

/// Whether `x mod n` lies strictly between 1 and `n`
fn is_nontrivial_residue(x: &BigInt, n: &BigInt) -> bool {
    let r = ModInt::new(n).add(x, &BigInt::zero());
    r > BigInt::one() && &r < n
}

impl DlnProof {
    /// Prove `h2 = h1^x mod n`, with `p` and `q` the Sophie Germain halves of the factors of `n`
    pub fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        h1: &BigInt,
        h2: &BigInt,
        x: &BigInt,
        p: &BigInt,
        q: &BigInt,
        n: &BigInt,
    ) -> Result<Self> {
        let pq = p * q;
        let mod_n = ModInt::new(n);
        let mod_pq = ModInt::new(&pq);

        let mut a = Vec::with_capacity(DLN_PROOF_ITERATIONS);
        let mut alpha = Vec::with_capacity(DLN_PROOF_ITERATIONS);
        for _ in 0..DLN_PROOF_ITERATIONS {
            let ai = random_positive_int(rng, &pq)?;
            alpha.push(mod_n.exp(h1, &ai));
            a.push(ai);
        }

        let c = challenge(h1, h2, n, &alpha);
        let t = a
            .iter()
            .enumerate()
            .map(|(i, ai)| {
                if c.bit(i as u64) {
                    mod_pq.add(ai, x)
                } else {
                    mod_pq.add(ai, &BigInt::zero())
                }
            })
            .collect();

        Ok(Self { alpha, t })
    }

    pub fn verify(&self, h1: &BigInt, h2: &BigInt, n: &BigInt) -> Result<()> {
        if self.alpha.len() != DLN_PROOF_ITERATIONS || self.t.len() != DLN_PROOF_ITERATIONS {
            return Err(Error::Malformed(format!(
                "dln proof must have {} commitments and responses",
                DLN_PROOF_ITERATIONS
            )));
        }
        if !n.is_positive() {
            return Err(Error::Malformed("dln proof modulus missing".to_string()));
        }
        if !is_nontrivial_residue(h1, n) || !is_nontrivial_residue(h2, n) {
            return Err(Error::Verification("h1 or h2 out of range".to_string()));
        }
        let mod_n = ModInt::new(n);
        if mod_n.add(h1, &BigInt::zero()) == mod_n.add(h2, &BigInt::zero()) {
            return Err(Error::Verification("h1 == h2".to_string()));
        }
        if let Some(i) = self
            .t
            .iter()
            .chain(self.alpha.iter())
            .position(|v| !is_nontrivial_residue(v, n))
        {
            return Err(Error::VerificationAt {
                index: i % DLN_PROOF_ITERATIONS,
                check: "value out of range".to_string(),
            });
        }

        let c = challenge(h1, h2, n, &self.alpha);
        for (i, (ai, ti)) in self.alpha.iter().zip(&self.t).enumerate() {
            let ci = if c.bit(i as u64) {
                BigInt::one()
            } else {
                BigInt::zero()
            };
            if mod_n.exp(h1, ti) != mod_n.mul_exp(ai, h2, &ci) {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "h1^t == alpha * h2^c".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Wire form of [`DlnProof`]: two arrays of unsigned big-endian integers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DlnProofBytes {
    pub alpha: Vec<Vec<u8>>,
    pub t: Vec<Vec<u8>>,
}

impl DlnProofBytes {
    pub fn from_proof(proof: &DlnProof) -> Self {
        Self {
            alpha: ints_to_bytes(&proof.alpha),
            t: ints_to_bytes(&proof.t),
        }
    }

    pub fn validate_basic(&self) -> bool {
        non_empty_multi_bytes(&self.alpha, Some(DLN_PROOF_ITERATIONS))
            && non_empty_multi_bytes(&self.t, Some(DLN_PROOF_ITERATIONS))
    }

    pub fn to_proof(&self) -> Result<DlnProof> {
        if !self.validate_basic() {
            return Err(Error::Malformed("dln proof bytes".to_string()));
        }
        Ok(DlnProof {
            alpha: bytes_to_ints(&self.alpha),
            t: bytes_to_ints(&self.t),
        })
    }
}
