//! No-small-factor proof (Πfac of CGGMP21) for a Paillier modulus `N0`,
//! stated against the verifier's ring-Pedersen parameters `(N, s, t)`.

use num_bigint::BigInt;
use num_traits::Signed;
use rand::{CryptoRng, RngCore};

use super::PrivateKey;
use crate::encoding::from_unsigned_bytes;
use crate::error::{Error, Result};
use crate::hash::sha512_256i;
use crate::int::{add_mul, is_number_in_multiplicative_group, ModInt};
use crate::random::random_int_in_2pow_mul_range;

/// Statistical security parameter, in bits
pub const PARAM_L: usize = 256;

/// Slack for range proofs, in bits
pub const PARAM_E: usize = 512;

const SIGN_DOMAIN: &[u8] = b"factor proof sign bit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorProof {
    pub p: BigInt,
    pub q: BigInt,
    pub a: BigInt,
    pub b: BigInt,
    pub t: BigInt,
    pub sigma: BigInt,
    pub z1: BigInt,
    pub z2: BigInt,
    pub w1: BigInt,
    pub w2: BigInt,
    pub v: BigInt,
}

/// Signed challenge: the hash of the public values, negated when the hash of
/// the same values under the sign domain is odd
#[allow(clippy::too_many_arguments)]
pub fn factor_challenge(
    n: &BigInt,
    s: &BigInt,
    t: &BigInt,
    pk_n: &BigInt,
    p: &BigInt,
    q: &BigInt,
    a: &BigInt,
    b: &BigInt,
    tt: &BigInt,
    sigma: &BigInt,
) -> BigInt {
    let h = sha512_256i(&[n, s, t, pk_n, p, q, a, b, tt, sigma]);
    let sign_int = from_unsigned_bytes(SIGN_DOMAIN);
    let sign = sha512_256i(&[&sign_int, n, s, t, pk_n, p, q, a, b, tt, sigma]);
    if sign.bit(0) {
        -h
    } else {
        h
    }
}

/// `2^(L+E) * sqrt(n0)`
fn response_limit(n0: &BigInt) -> BigInt {
    n0.sqrt() << (PARAM_L + PARAM_E)
}

impl FactorProof {
    pub fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        key: &PrivateKey,
        n: &BigInt,
        s: &BigInt,
        t: &BigInt,
    ) -> Result<Self> {
        let n0 = key.n();
        let (p, q) = (&key.p, &key.q);
        let n0_n = n0 * n;
        let sqrt_n0 = n0.sqrt();

        let a = random_int_in_2pow_mul_range(rng, PARAM_L + PARAM_E, &sqrt_n0);
        let b = random_int_in_2pow_mul_range(rng, PARAM_L + PARAM_E, &sqrt_n0);
        let mu = random_int_in_2pow_mul_range(rng, PARAM_L, n);
        let nu = random_int_in_2pow_mul_range(rng, PARAM_L, n);
        let sigma = random_int_in_2pow_mul_range(rng, PARAM_L, &n0_n);
        let r = random_int_in_2pow_mul_range(rng, PARAM_L + PARAM_E, &n0_n);
        let x = random_int_in_2pow_mul_range(rng, PARAM_L + PARAM_E, n);
        let y = random_int_in_2pow_mul_range(rng, PARAM_L + PARAM_E, n);

        let mod_n = ModInt::new(n);
        let cp = mod_n.exp_mul_exp(s, p, t, &mu);
        let cq = mod_n.exp_mul_exp(s, q, t, &nu);
        let ca = mod_n.exp_mul_exp(s, &a, t, &x);
        let cb = mod_n.exp_mul_exp(s, &b, t, &y);
        let ct = mod_n.exp_mul_exp(&cq, &a, t, &r);

        let e = factor_challenge(n, s, t, n0, &cp, &cq, &ca, &cb, &ct, &sigma);

        // sigma - nu * p
        let sigma_hat = &sigma - &nu * p;

        Ok(Self {
            z1: add_mul(&a, &e, p),
            z2: add_mul(&b, &e, q),
            w1: add_mul(&x, &e, &mu),
            w2: add_mul(&y, &e, &nu),
            v: add_mul(&r, &e, &sigma_hat),
            p: cp,
            q: cq,
            a: ca,
            b: cb,
            t: ct,
            sigma,
        })
    }

    /// Verify the proof for modulus `pk_n` under the parameters `(n, s, t)`
    pub fn verify(&self, pk_n: &BigInt, n: &BigInt, s: &BigInt, t: &BigInt) -> Result<()> {
        if !pk_n.is_positive() || !n.is_positive() || !s.is_positive() || !t.is_positive() {
            return Err(Error::Malformed("factor proof statement has an empty value".to_string()));
        }
        for (name, value) in [
            ("P", &self.p),
            ("Q", &self.q),
            ("A", &self.a),
            ("B", &self.b),
            ("T", &self.t),
        ] {
            if !is_number_in_multiplicative_group(n, value) {
                return Err(Error::Verification(format!(
                    "commitment {} is not a unit modulo N",
                    name
                )));
            }
        }

        let e = factor_challenge(
            n, s, t, pk_n, &self.p, &self.q, &self.a, &self.b, &self.t, &self.sigma,
        );
        let mod_n = ModInt::new(n);
        let r = mod_n.exp_mul_exp(s, pk_n, t, &self.sigma);

        let lhs = mod_n.exp_mul_exp(s, &self.z1, t, &self.w1);
        if lhs != mod_n.mul_exp(&self.a, &self.p, &e) {
            return Err(Error::Verification("s^z1 * t^w1 == A * P^e".to_string()));
        }
        let lhs = mod_n.exp_mul_exp(s, &self.z2, t, &self.w2);
        if lhs != mod_n.mul_exp(&self.b, &self.q, &e) {
            return Err(Error::Verification("s^z2 * t^w2 == B * Q^e".to_string()));
        }
        let lhs = mod_n.exp_mul_exp(&self.q, &self.z1, t, &self.v);
        if lhs != mod_n.mul_exp(&self.t, &r, &e) {
            return Err(Error::Verification("Q^z1 * t^v == T * R^e".to_string()));
        }

        let limit = response_limit(pk_n);
        if self.z1.magnitude() > limit.magnitude() {
            return Err(Error::Verification("z1 exceeds the range limit".to_string()));
        }
        if self.z2.magnitude() > limit.magnitude() {
            return Err(Error::Verification("z2 exceeds the range limit".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_keys::{test_key, test_ring_pedersen};
    use super::*;
    use crate::prime::is_probable_prime;
    use num_bigint::RandBigInt;
    use num_traits::{One, Zero};
    use rand::rngs::OsRng;

    fn random_prime(bits: u64) -> BigInt {
        loop {
            let mut candidate = OsRng.gen_bigint(bits).abs();
            candidate.set_bit(bits - 1, true);
            candidate.set_bit(0, true);
            if is_probable_prime(&mut OsRng, &candidate, 20) {
                return candidate;
            }
        }
    }

    fn fixture() -> (PrivateKey, BigInt, BigInt, BigInt) {
        let key = test_key();
        let (aux, s, t, _) = test_ring_pedersen();
        (key, aux.n().clone(), s, t)
    }

    #[test]
    fn test_factor_proof_completeness() {
        let (key, n, s, t) = fixture();
        let proof = key.factor_proof(&mut OsRng, &n, &s, &t).unwrap();
        assert!(proof.verify(key.n(), &n, &s, &t).is_ok());
    }

    #[test]
    fn test_factor_proof_wrong_modulus_rejected() {
        let (key, n, s, t) = fixture();
        let proof = key.factor_proof(&mut OsRng, &n, &s, &t).unwrap();
        let bad_n = key.n() * 3;
        assert!(proof.verify(&bad_n, &n, &s, &t).is_err());
    }

    #[test]
    fn test_factor_proof_tampered_fields_rejected() {
        let (key, n, s, t) = fixture();
        let proof = key.factor_proof(&mut OsRng, &n, &s, &t).unwrap();

        let mut zeroed = proof.clone();
        zeroed.v = BigInt::zero();
        assert!(zeroed.verify(key.n(), &n, &s, &t).is_err());

        let mut shifted = proof.clone();
        shifted.w2 += BigInt::one();
        assert!(shifted.verify(key.n(), &n, &s, &t).is_err());

        let mut non_unit = proof.clone();
        non_unit.a = BigInt::zero();
        assert!(matches!(
            non_unit.verify(key.n(), &n, &s, &t),
            Err(Error::Verification(_))
        ));

        assert!(matches!(
            proof.verify(key.n(), &n, &s, &BigInt::zero()),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_factor_proof_unbalanced_factors_rejected() {
        let (_, n, s, t) = fixture();
        // a 128-bit factor leaves the other far above sqrt(N0)
        let bad_key = PrivateKey::from_primes(random_prime(1408), random_prime(128));
        let proof = bad_key.factor_proof(&mut OsRng, &n, &s, &t).unwrap();
        assert!(matches!(
            proof.verify(bad_key.n(), &n, &s, &t),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn test_factor_challenge_is_signed() {
        let values: Vec<BigInt> = (1..=10).map(BigInt::from).collect();
        let mut seen_negative = false;
        let mut seen_positive = false;
        for shift in 0..32 {
            let sigma = BigInt::from(shift);
            let e = factor_challenge(
                &values[0], &values[1], &values[2], &values[3], &values[4], &values[5],
                &values[6], &values[7], &values[8], &sigma,
            );
            assert!(e.magnitude().bits() <= 256);
            seen_negative |= e.is_negative();
            seen_positive |= e.is_positive();
        }
        assert!(seen_negative && seen_positive);
    }
}
