//! Ring-Pedersen parameter proof: knowledge of `lambda` with `s = t^lambda mod N`
//!
//! Eighty parallel runs of a one-bit-challenge Σ-protocol, made non-interactive
//! by deriving all challenge bits from one hash of the commitments.

use num_bigint::BigInt;
use num_traits::One;
use rand::{CryptoRng, RngCore};

use crate::encoding::to_unsigned_bytes;
use crate::error::{Error, Result};
use crate::hash::{bytes_to_bits, sha512_256i};
use crate::int::ModInt;
use crate::random::random_positive_int;

/// Parallel repetitions
pub const PARAM_PROOF_ITERATIONS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamProof {
    pub a: Vec<BigInt>,
    pub z: Vec<BigInt>,
}

/// Challenge bits `e_i` for commitments `a` under `(n, s, t)`
pub fn param_challenge(n: &BigInt, s: &BigInt, t: &BigInt, a: &[BigInt]) -> Vec<bool> {
    let a_refs: Vec<&BigInt> = a.iter().collect();
    let a_hash = sha512_256i(&a_refs);
    let e = sha512_256i(&[n, s, t, &a_hash]);
    bytes_to_bits(&to_unsigned_bytes(&e), PARAM_PROOF_ITERATIONS)
}

fn challenge_int(bit: bool) -> BigInt {
    if bit {
        BigInt::one()
    } else {
        BigInt::from(0)
    }
}

impl ParamProof {
    /// Prove `s = t^lambda mod n` given `phi = phi(n)`
    pub fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        n: &BigInt,
        s: &BigInt,
        t: &BigInt,
        phi: &BigInt,
        lambda: &BigInt,
    ) -> Result<Self> {
        let mod_n = ModInt::new(n);
        let mod_phi = ModInt::new(phi);

        let mut secrets = Vec::with_capacity(PARAM_PROOF_ITERATIONS);
        let mut a = Vec::with_capacity(PARAM_PROOF_ITERATIONS);
        for _ in 0..PARAM_PROOF_ITERATIONS {
            let ai = random_positive_int(rng, phi)?;
            a.push(mod_n.exp(t, &ai));
            secrets.push(ai);
        }

        let e = param_challenge(n, s, t, &a);
        let z = secrets
            .iter()
            .zip(&e)
            .map(|(ai, ei)| mod_phi.add(ai, &mod_phi.mul(&challenge_int(*ei), lambda)))
            .collect();

        Ok(Self { a, z })
    }

    /// Check `t^z_i == A_i * s^e_i mod n` for every round
    pub fn verify(&self, n: &BigInt, s: &BigInt, t: &BigInt) -> Result<()> {
        if self.a.len() != PARAM_PROOF_ITERATIONS || self.z.len() != PARAM_PROOF_ITERATIONS {
            return Err(Error::Malformed(format!(
                "param proof has {} commitments and {} responses, expected {}",
                self.a.len(),
                self.z.len(),
                PARAM_PROOF_ITERATIONS
            )));
        }
        if n <= &BigInt::one() {
            return Err(Error::Malformed("param proof modulus missing".to_string()));
        }

        let e = param_challenge(n, s, t, &self.a);
        let mod_n = ModInt::new(n);
        for (i, ((ai, zi), ei)) in self.a.iter().zip(&self.z).zip(&e).enumerate() {
            let lhs = mod_n.exp(t, zi);
            let rhs = mod_n.mul_exp(ai, s, &challenge_int(*ei));
            if lhs != rhs {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "t^z == A * s^e".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_keys::test_ring_pedersen;
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_bytes_to_bits_layout() {
        let bs = hex::decode("0102030405060708090a0b0c0d0e0f").unwrap();
        let b = bytes_to_bits(&bs, PARAM_PROOF_ITERATIONS);
        assert_eq!(b.len(), 80);
        assert!(b[0]);
        assert!(!b[1]);
        assert!(!b[8]);
        assert!(b[9]);
        assert!(b[16]);
        assert!(b[17]);
    }

    #[test]
    fn test_param_proof_verify() {
        let (key, s, t, lambda) = test_ring_pedersen();
        let proof = key.param_proof(&mut OsRng, &s, &t, &lambda).unwrap();
        assert!(proof.verify(key.n(), &s, &t).is_ok());
    }

    #[test]
    fn test_param_proof_swapped_arrays_rejected() {
        let (key, s, t, lambda) = test_ring_pedersen();
        let proof = key.param_proof(&mut OsRng, &s, &t, &lambda).unwrap();
        let swapped = ParamProof {
            a: proof.z.clone(),
            z: proof.a.clone(),
        };
        assert!(swapped.verify(key.n(), &s, &t).is_err());
    }

    #[test]
    fn test_param_proof_wrong_statement_rejected() {
        let (key, s, t, lambda) = test_ring_pedersen();
        let proof = key.param_proof(&mut OsRng, &s, &t, &lambda).unwrap();
        let other_s = ModInt::new(key.n()).mul(&s, &t);
        assert!(proof.verify(key.n(), &other_s, &t).is_err());

        let mut short = proof.clone();
        short.z.pop();
        assert!(matches!(short.verify(key.n(), &s, &t), Err(Error::Malformed(_))));
    }
}
