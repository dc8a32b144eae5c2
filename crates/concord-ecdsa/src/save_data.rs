//! Local pre-parameters and the key material a party keeps after a protocol run

use std::fmt;

use concord_core::ec::scalar_to_bigint;
use concord_core::paillier::{generate_key_pair, PrivateKey, PublicKey};
use concord_core::prime::{generate_safe_prime, GenerationContext};
use concord_core::random::{random_positive_relatively_prime_int, random_quadratic_residue};
use concord_core::ModInt;
use k256::{ProjectivePoint, Scalar};
use num_bigint::BigInt;
use num_traits::{One, Signed};
use rand::{CryptoRng, RngCore};
use tracing::{debug, instrument};
use zeroize::Zeroize;

use crate::error::{Result, TssError};

/// A party's Paillier key and auxiliary ring-Pedersen parameters.
///
/// `ntilde = (2p + 1)(2q + 1)`, `h2 = h1^alpha` and `h1 = h2^beta` modulo
/// `ntilde`, with `alpha * beta = 1 mod pq`.
#[derive(Clone)]
pub struct LocalPreParams {
    pub paillier_sk: PrivateKey,
    pub ntilde: BigInt,
    pub h1: BigInt,
    pub h2: BigInt,
    pub alpha: BigInt,
    pub beta: BigInt,
    pub p: BigInt,
    pub q: BigInt,
}

impl fmt::Debug for LocalPreParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPreParams")
            .field("paillier_n_bits", &self.paillier_sk.n().bits())
            .field("ntilde_bits", &self.ntilde.bits())
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

impl LocalPreParams {
    /// Generate a Paillier key and auxiliary parameters with `modulus_bits`-bit moduli
    #[instrument(skip(rng, ctx))]
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        modulus_bits: usize,
        ctx: &GenerationContext,
    ) -> Result<Self> {
        let paillier_sk = generate_key_pair(rng, modulus_bits, ctx)?;
        let (ntilde, p, q) = loop {
            let sp = generate_safe_prime(rng, modulus_bits / 2, ctx)?;
            let sq = generate_safe_prime(rng, modulus_bits / 2, ctx)?;
            if sp.prime == sq.prime {
                continue;
            }
            let ntilde = &sp.prime * &sq.prime;
            if ntilde.bits() as usize == modulus_bits {
                break (ntilde, sp.sophie_germain, sq.sophie_germain);
            }
        };

        let pq = &p * &q;
        let h1 = random_quadratic_residue(rng, &ntilde)?;
        let alpha = random_positive_relatively_prime_int(rng, &pq)?;
        let beta = ModInt::new(&pq).mod_inverse(&alpha).ok_or_else(|| {
            concord_core::Error::InternalInvariant("alpha is not invertible modulo pq".to_string())
        })?;
        let h2 = ModInt::new(&ntilde).exp(&h1, &alpha);
        debug!(modulus_bits, "generated local pre-params");

        Ok(Self {
            paillier_sk,
            ntilde,
            h1,
            h2,
            alpha,
            beta,
            p,
            q,
        })
    }

    pub fn validate(&self) -> bool {
        self.paillier_sk.n().is_positive()
            && self.ntilde.is_positive()
            && self.h1.is_positive()
            && self.h2.is_positive()
            && self.h1 != self.h2
    }

    /// Like [`validate`](Self::validate), additionally requiring the secrets behind the auxiliary parameters
    pub fn validate_with_proof(&self) -> bool {
        self.validate()
            && self.alpha.is_positive()
            && self.beta.is_positive()
            && self.p.is_positive()
            && self.q.is_positive()
    }

    /// The key holding the factors of `ntilde`
    pub fn ntilde_private_key(&self) -> PrivateKey {
        let one = BigInt::one();
        PrivateKey::from_primes(&self.p * 2 + &one, &self.q * 2 + &one)
    }
}

/// Everything a party keeps after key generation or resharing.
///
/// Per-party vectors are indexed by committee position.
#[derive(Clone)]
pub struct LocalPartySaveData {
    pub pre_params: LocalPreParams,
    pub xi: Scalar,
    pub share_id: BigInt,
    pub ks: Vec<BigInt>,
    pub ntilde_j: Vec<BigInt>,
    pub h1_j: Vec<BigInt>,
    pub h2_j: Vec<BigInt>,
    pub big_xj: Vec<ProjectivePoint>,
    pub paillier_pks: Vec<PublicKey>,
    pub ecdsa_pub: ProjectivePoint,
}

impl fmt::Debug for LocalPartySaveData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPartySaveData")
            .field("share_id", &self.share_id)
            .field("parties", &self.ks.len())
            .field("ecdsa_pub", &self.ecdsa_pub.to_affine())
            .field("xi", &"[REDACTED]")
            .finish()
    }
}

impl LocalPartySaveData {
    pub fn new(pre_params: LocalPreParams, party_count: usize) -> Self {
        Self {
            pre_params,
            xi: Scalar::ZERO,
            share_id: BigInt::default(),
            ks: vec![BigInt::default(); party_count],
            ntilde_j: vec![BigInt::default(); party_count],
            h1_j: vec![BigInt::default(); party_count],
            h2_j: vec![BigInt::default(); party_count],
            big_xj: vec![ProjectivePoint::IDENTITY; party_count],
            paillier_pks: vec![PublicKey::new(BigInt::default()); party_count],
            ecdsa_pub: ProjectivePoint::IDENTITY,
        }
    }

    pub fn party_count(&self) -> usize {
        self.ks.len()
    }

    pub fn xi_int(&self) -> BigInt {
        scalar_to_bigint(&self.xi)
    }

    /// Restrict the per-party vectors to the parties with the given keys, in that order
    pub fn subset(&self, keys: &[BigInt]) -> Result<Self> {
        let mut positions = Vec::with_capacity(keys.len());
        for key in keys {
            let j = self.ks.iter().position(|k| k == key).ok_or_else(|| {
                TssError::InvalidParameters(format!("key {} is not in the save data", key))
            })?;
            positions.push(j);
        }
        let pick = |v: &[BigInt]| -> Vec<BigInt> { positions.iter().map(|&j| v[j].clone()).collect() };
        Ok(Self {
            pre_params: self.pre_params.clone(),
            xi: self.xi,
            share_id: self.share_id.clone(),
            ks: pick(&self.ks),
            ntilde_j: pick(&self.ntilde_j),
            h1_j: pick(&self.h1_j),
            h2_j: pick(&self.h2_j),
            big_xj: positions.iter().map(|&j| self.big_xj[j]).collect(),
            paillier_pks: positions.iter().map(|&j| self.paillier_pks[j].clone()).collect(),
            ecdsa_pub: self.ecdsa_pub,
        })
    }
}

impl Zeroize for LocalPartySaveData {
    fn zeroize(&mut self) {
        self.xi = Scalar::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::DlnProof;
    use rand::rngs::OsRng;

    fn small_pre_params() -> LocalPreParams {
        LocalPreParams::generate(&mut OsRng, 512, &GenerationContext::new()).unwrap()
    }

    #[test]
    fn test_pre_params_relations() {
        let pre = small_pre_params();
        assert!(pre.validate_with_proof());
        assert_eq!(pre.ntilde.bits(), 512);
        let m = ModInt::new(&pre.ntilde);
        assert_eq!(m.exp(&pre.h1, &pre.alpha), pre.h2);
        assert_eq!(m.exp(&pre.h2, &pre.beta), pre.h1);
        assert_eq!(pre.ntilde_private_key().n(), &pre.ntilde);

        let proof =
            DlnProof::prove(&mut OsRng, &pre.h1, &pre.h2, &pre.alpha, &pre.p, &pre.q, &pre.ntilde).unwrap();
        assert!(proof.verify(&pre.h1, &pre.h2, &pre.ntilde).is_ok());
        assert!(!format!("{:?}", pre).contains(&pre.alpha.to_string()));
    }

    #[test]
    fn test_cancelled_generation_fails() {
        let ctx = GenerationContext::new();
        ctx.cancel();
        let err = LocalPreParams::generate(&mut OsRng, 512, &ctx).unwrap_err();
        assert!(matches!(err, TssError::Core(concord_core::Error::Cancelled(_))));
    }

    #[test]
    fn test_subset_reorders_vectors() {
        let mut save = LocalPartySaveData::new(small_pre_params(), 3);
        save.ks = vec![BigInt::from(1), BigInt::from(2), BigInt::from(3)];
        save.h1_j = vec![BigInt::from(10), BigInt::from(20), BigInt::from(30)];
        let sub = save.subset(&[BigInt::from(3), BigInt::from(1)]).unwrap();
        assert_eq!(sub.ks, vec![BigInt::from(3), BigInt::from(1)]);
        assert_eq!(sub.h1_j, vec![BigInt::from(30), BigInt::from(10)]);
        assert!(save.subset(&[BigInt::from(4)]).is_err());
    }
}
