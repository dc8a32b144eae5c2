//! Paillier keys and the zero-knowledge proofs built on them
//!
//! Only the proof-related operations live here; encryption itself is not
//! needed by key generation or resharing.

mod factor_proof;
mod mod_proof;
mod param_proof;
pub mod wire;

pub use factor_proof::{factor_challenge, FactorProof, PARAM_E, PARAM_L};
pub use mod_proof::{
    comp_mod_4th_rt, comp_mod_sqrt, mod_challenge, prime_mod_sqrt, ModProof, MOD_PROOF_ITERATIONS,
    MOD_PROOF_PRIMALITY_ROUNDS,
};
pub use param_proof::{param_challenge, ParamProof, PARAM_PROOF_ITERATIONS};

use k256::ProjectivePoint;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use tracing::{debug, instrument};

use crate::ec::point_coordinates;
use crate::error::{Error, Result};
use crate::hash::sha512_256;
use crate::int::{is_number_in_multiplicative_group, ModInt};
use crate::prime::{generate_safe_prime, GenerationContext, SMALL_PRIMES};
use crate::random::CRYPTOGRAPHIC_RETRY_MAX;

/// Iterations of the key-correctness proof
pub const KEY_PROOF_ITERATIONS: usize = 13;

/// Paillier public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub n: BigInt,
}

impl PublicKey {
    pub fn new(n: BigInt) -> Self {
        Self { n }
    }
}

/// Paillier private key. `p` and `q` are safe primes with `n = p * q`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub public_key: PublicKey,
    pub lambda_n: BigInt,
    pub phi_n: BigInt,
    pub p: BigInt,
    pub q: BigInt,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .field("factors", &"[REDACTED]")
            .finish()
    }
}

impl PrivateKey {
    /// Build the key from its two prime factors
    pub fn from_primes(p: BigInt, q: BigInt) -> Self {
        let n = &p * &q;
        let p_minus_one: BigInt = &p - 1;
        let q_minus_one: BigInt = &q - 1;
        let phi_n = &p_minus_one * &q_minus_one;
        let lambda_n = p_minus_one.lcm(&q_minus_one);
        Self {
            public_key: PublicKey::new(n),
            lambda_n,
            phi_n,
            p,
            q,
        }
    }

    pub fn n(&self) -> &BigInt {
        &self.public_key.n
    }

    /// Prove that `s = t^lambda mod n` with the factors held by this key
    pub fn param_proof<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        s: &BigInt,
        t: &BigInt,
        lambda: &BigInt,
    ) -> Result<ParamProof> {
        ParamProof::prove(rng, self.n(), s, t, &self.phi_n, lambda)
    }

    /// Prove that `n` is a Paillier-Blum modulus
    pub fn mod_proof<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<ModProof> {
        ModProof::prove(rng, self)
    }

    /// Prove that `n` has no small factors, against the verifier's `(n_tilde, s, t)`
    pub fn factor_proof<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        n_tilde: &BigInt,
        s: &BigInt,
        t: &BigInt,
    ) -> Result<FactorProof> {
        FactorProof::prove(rng, self, n_tilde, s, t)
    }

    /// Prove knowledge of `phi(n)` bound to the party key `k` and the group key
    pub fn key_proof(&self, k: &BigInt, ecdsa_pub: &ProjectivePoint) -> Result<KeyProof> {
        let xs = generate_xs(KEY_PROOF_ITERATIONS, k, self.n(), ecdsa_pub)?;
        let m = ModInt::new(&self.phi_n)
            .mod_inverse(self.n())
            .ok_or_else(|| Error::InternalInvariant("n is not invertible modulo phi(n)".to_string()))?;
        let mod_n = ModInt::new(self.n());
        Ok(KeyProof(xs.iter().map(|x| mod_n.exp(x, &m)).collect()))
    }
}

/// Generate a key whose modulus has exactly `modulus_bits` bits
#[instrument(skip(rng, ctx))]
pub fn generate_key_pair<R: RngCore + CryptoRng>(
    rng: &mut R,
    modulus_bits: usize,
    ctx: &GenerationContext,
) -> Result<PrivateKey> {
    if modulus_bits % 2 != 0 {
        return Err(Error::InvalidParameters(format!(
            "modulus bit length {} is odd",
            modulus_bits
        )));
    }
    loop {
        let p = generate_safe_prime(rng, modulus_bits / 2, ctx)?;
        let q = generate_safe_prime(rng, modulus_bits / 2, ctx)?;
        if p.prime == q.prime {
            continue;
        }
        let key = PrivateKey::from_primes(p.prime, q.prime);
        if key.n().bits() as usize == modulus_bits {
            debug!(modulus_bits, "generated paillier key");
            return Ok(key);
        }
    }
}

/// Key-correctness proof: `N`-th roots of values hashed from the public context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProof(pub Vec<BigInt>);

impl KeyProof {
    pub fn verify(&self, pk_n: &BigInt, k: &BigInt, ecdsa_pub: &ProjectivePoint) -> Result<()> {
        if self.0.len() != KEY_PROOF_ITERATIONS {
            return Err(Error::Malformed(format!(
                "key proof has {} entries, expected {}",
                self.0.len(),
                KEY_PROOF_ITERATIONS
            )));
        }
        if self.0.iter().any(Zero::is_zero) {
            return Err(Error::Malformed("key proof has an empty entry".to_string()));
        }
        if let Some(p) = SMALL_PRIMES.iter().find(|p| (pk_n % **p).is_zero()) {
            return Err(Error::ModulusShape(format!("modulus divisible by {}", p)));
        }
        let xs = generate_xs(KEY_PROOF_ITERATIONS, k, pk_n, ecdsa_pub)?;
        let mod_n = ModInt::new(pk_n);
        for (i, (pi, x)) in self.0.iter().zip(&xs).enumerate() {
            if &mod_n.exp(pi, pk_n) != x {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "pi^N == x".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Hash `(i, block, retry, k, X, Y, N)` into units of `Z_N`
fn generate_xs(m: usize, k: &BigInt, n: &BigInt, ecdsa_pub: &ProjectivePoint) -> Result<Vec<BigInt>> {
    let (sx, sy) = point_coordinates(ecdsa_pub)?;
    let kb = crate::encoding::to_unsigned_bytes(k);
    let sxb = crate::encoding::to_unsigned_bytes(&sx);
    let syb = crate::encoding::to_unsigned_bytes(&sy);
    let nb = crate::encoding::to_unsigned_bytes(n);
    let blocks = (n.bits() as usize).div_ceil(256);

    let mut out = Vec::with_capacity(m);
    let mut retries = 0usize;
    while out.len() < m {
        if retries > CRYPTOGRAPHIC_RETRY_MAX {
            return Err(Error::Crypto("could not derive key proof challenges".to_string()));
        }
        let ib = out.len().to_string().into_bytes();
        let rb = retries.to_string().into_bytes();
        let mut xi = Vec::with_capacity(blocks * 32);
        for j in 0..blocks {
            let jb = j.to_string().into_bytes();
            xi.extend_from_slice(&sha512_256(&[
                ib.as_slice(),
                jb.as_slice(),
                rb.as_slice(),
                kb.as_slice(),
                sxb.as_slice(),
                syb.as_slice(),
                nb.as_slice(),
            ]));
        }
        // truncate to bitlen(n) bits
        let candidate = crate::encoding::from_unsigned_bytes(&xi) >> (blocks * 256 - n.bits() as usize);
        if is_number_in_multiplicative_group(n, &candidate) {
            out.push(candidate);
        } else {
            retries += 1;
        }
    }
    Ok(out)
}

/// Whether `n` is odd and greater than one
pub(crate) fn is_odd_modulus(n: &BigInt) -> bool {
    n.is_odd() && n > &BigInt::one()
}

#[cfg(test)]
pub(crate) mod test_keys {
    use super::*;
    use rand::rngs::OsRng;

    /// Small keys keep the proof tests fast
    pub const TEST_MODULUS_BITS: usize = 512;

    pub fn test_key() -> PrivateKey {
        generate_key_pair(&mut OsRng, TEST_MODULUS_BITS, &GenerationContext::new()).unwrap()
    }

    /// A second key used as `(n_tilde, h1, h2)` with `h2 = h1^alpha`
    pub fn test_ring_pedersen() -> (PrivateKey, BigInt, BigInt, BigInt) {
        let key = test_key();
        let n = key.n().clone();
        let t = crate::random::random_quadratic_residue(&mut OsRng, &n).unwrap();
        let lambda = crate::random::random_positive_int(&mut OsRng, &key.phi_n).unwrap();
        let s = ModInt::new(&n).exp(&t, &lambda);
        (key, s, t, lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;
    use k256::elliptic_curve::Field;
    use k256::Scalar;
    use rand::rngs::OsRng;

    #[test]
    fn test_generate_key_pair_shape() {
        let key = test_key();
        assert_eq!(key.n().bits() as usize, TEST_MODULUS_BITS);
        assert_eq!(&key.p * &key.q, *key.n());
        assert_eq!(key.phi_n, (&key.p - 1) * (&key.q - 1));
        assert!(key.p.is_odd() && key.q.is_odd());
        assert!(!format!("{:?}", key).contains(&key.p.to_string()));
    }

    #[test]
    fn test_key_proof_completeness_and_binding() {
        let key = test_key();
        let k = BigInt::from(123_456u64);
        let pub_point = ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng);
        let proof = key.key_proof(&k, &pub_point).unwrap();
        assert!(proof.verify(key.n(), &k, &pub_point).is_ok());

        // bound to the party key and the group key
        assert!(proof.verify(key.n(), &(k.clone() + 1), &pub_point).is_err());
        let other_point = pub_point + ProjectivePoint::GENERATOR;
        assert!(proof.verify(key.n(), &k, &other_point).is_err());

        let mut tampered = proof.clone();
        tampered.0[5] += 1;
        assert!(matches!(
            tampered.verify(key.n(), &k, &pub_point),
            Err(Error::VerificationAt { index: 5, .. })
        ));
    }

    #[test]
    fn test_key_proof_rejects_small_factors() {
        let key = test_key();
        let k = BigInt::from(1);
        let pub_point = ProjectivePoint::GENERATOR;
        let proof = key.key_proof(&k, &pub_point).unwrap();
        let bad_n = key.n() * 3;
        assert!(matches!(
            proof.verify(&bad_n, &k, &pub_point),
            Err(Error::ModulusShape(_))
        ));
        let short = KeyProof(proof.0[..3].to_vec());
        assert!(matches!(short.verify(key.n(), &k, &pub_point), Err(Error::Malformed(_))));
    }
}
