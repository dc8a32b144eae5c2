//! Paillier-Blum modulus proof
//!
//! Shows that `N = p * q` with `p, q ≡ 3 (mod 4)` and `gcd(N, phi(N)) = 1`,
//! following the Πmod protocol of Canetti et al., "UC Non-Interactive,
//! Proactive, Threshold ECDSA with Identifiable Aborts" (ePrint 2021/060).

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::error;

use super::{is_odd_modulus, PrivateKey};
use crate::error::{Error, Result};
use crate::hash::hash_to_n;
use crate::int::{lt, ModInt};
use crate::prime::{is_probable_prime, jacobi};
use crate::random::{random_positive_int, CRYPTOGRAPHIC_RETRY_MAX};

/// Parallel repetitions
pub const MOD_PROOF_ITERATIONS: usize = 80;

/// Miller-Rabin rounds used to reject a prime modulus
pub const MOD_PROOF_PRIMALITY_ROUNDS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModProof {
    pub w: BigInt,
    pub x: Vec<BigInt>,
    pub a: Vec<bool>,
    pub b: Vec<bool>,
    pub z: Vec<BigInt>,
}

/// Challenges `y_i = HashToN(N, w, i)`
pub fn mod_challenge(n: &BigInt, w: &BigInt) -> Vec<BigInt> {
    (0..MOD_PROOF_ITERATIONS)
        .map(|i| hash_to_n(n, &[w, &BigInt::from(i)]))
        .collect()
}

/// `(-1)^a * w^b * y mod n`
fn sign_twist(y: &BigInt, w: &BigInt, a: bool, b: bool, n: &BigInt) -> BigInt {
    let mut yy = y.clone();
    if b {
        yy *= w;
    }
    if a {
        yy = -yy;
    }
    yy.mod_floor(n)
}

/// Square roots of `x` modulo a prime `p ≡ 3 (mod 4)`
pub fn prime_mod_sqrt(x: &BigInt, p: &BigInt) -> Vec<BigInt> {
    let x = x.mod_floor(p);
    let e: BigInt = (p + 1) / 4;
    let r = x.modpow(&e, p);
    if (&r * &r).mod_floor(p) != x {
        return Vec::new();
    }
    if r.is_zero() {
        return vec![r];
    }
    let other = p - &r;
    vec![r, other]
}

/// Square roots of `x` modulo `n = p * q`, combined by CRT.
///
/// Empty when `x` has no root modulo either prime.
pub fn comp_mod_sqrt(x: &BigInt, p: &BigInt, q: &BigInt, n: &BigInt) -> Vec<BigInt> {
    let rps = prime_mod_sqrt(x, p);
    let rqs = prime_mod_sqrt(x, q);
    if rps.is_empty() || rqs.is_empty() {
        return Vec::new();
    }
    // a * p + b * q = 1
    let egcd = p.extended_gcd(q);
    let ap = &egcd.x * p;
    let bq = &egcd.y * q;

    let mut roots = Vec::with_capacity(rps.len() * rqs.len());
    for rp in &rps {
        for rq in &rqs {
            roots.push((&bq * rp + &ap * rq).mod_floor(n));
        }
    }
    roots
}

/// A fourth root of `x` modulo `n = p * q`: a square root of the unique square
/// root of `x` that is itself a residue
pub fn comp_mod_4th_rt(x: &BigInt, p: &BigInt, q: &BigInt, n: &BigInt) -> Option<BigInt> {
    comp_mod_sqrt(x, p, q, n)
        .iter()
        .find_map(|root| comp_mod_sqrt(root, p, q, n).into_iter().next())
}

fn is_quad_residue_mod_composite(x: &BigInt, p: &BigInt, q: &BigInt) -> bool {
    !prime_mod_sqrt(x, p).is_empty() && !prime_mod_sqrt(x, q).is_empty()
}

/// `x^((phi + 4) / 8)` applied twice: a fourth root of a quartic residue
fn quartic_root(x: &BigInt, n: &BigInt, phi: &BigInt) -> BigInt {
    let e: BigInt = (phi + 4) / 8;
    let root = x.modpow(&e, n);
    root.modpow(&e, n)
}

/// Pick `(a, b)` so that `(-1)^a w^b y` is a quartic residue and return its root.
/// Combinations are tried in the order `(0,0)`, `(0,1)`, `(1,0)`, `(1,1)`.
fn define_xi(w: &BigInt, y: &BigInt, key: &PrivateKey) -> Result<(bool, bool, BigInt)> {
    let n = key.n();
    for a in [false, true] {
        for b in [false, true] {
            let yy = sign_twist(y, w, a, b, n);
            if is_quad_residue_mod_composite(&yy, &key.p, &key.q) {
                return Ok((a, b, quartic_root(&yy, n, &key.phi_n)));
            }
        }
    }
    error!("no quartic residue among the sign twists of a challenge");
    Err(Error::InternalInvariant(
        "no fourth root exists for any (a, b); the modulus is not Paillier-Blum".to_string(),
    ))
}

impl ModProof {
    pub fn prove<R: RngCore + CryptoRng>(rng: &mut R, key: &PrivateKey) -> Result<Self> {
        let n = key.n();

        let mut w = None;
        for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
            let candidate = random_positive_int(rng, n)?;
            if jacobi(&candidate, n)? == -1 {
                w = Some(candidate);
                break;
            }
        }
        let w = w.ok_or_else(|| {
            Error::Crypto("no element with jacobi symbol -1 found".to_string())
        })?;

        let n_inverse = ModInt::new(&key.phi_n)
            .mod_inverse(n)
            .ok_or_else(|| Error::InternalInvariant("n is not invertible modulo phi(n)".to_string()))?;

        let y = mod_challenge(n, &w);
        let mut x = Vec::with_capacity(MOD_PROOF_ITERATIONS);
        let mut a = Vec::with_capacity(MOD_PROOF_ITERATIONS);
        let mut b = Vec::with_capacity(MOD_PROOF_ITERATIONS);
        let mut z = Vec::with_capacity(MOD_PROOF_ITERATIONS);
        for yi in &y {
            let (ai, bi, xi) = define_xi(&w, yi, key)?;
            x.push(xi);
            a.push(ai);
            b.push(bi);
            z.push(yi.modpow(&n_inverse, n));
        }

        Ok(Self { w, x, a, b, z })
    }

    pub fn verify(&self, n: &BigInt) -> Result<()> {
        let m = MOD_PROOF_ITERATIONS;
        if self.x.len() != m || self.a.len() != m || self.b.len() != m || self.z.len() != m {
            return Err(Error::Malformed(format!(
                "mod proof arrays must have {} entries",
                m
            )));
        }
        if !is_odd_modulus(n) {
            return Err(Error::ModulusShape("modulus is even".to_string()));
        }
        if is_probable_prime(&mut OsRng, n, MOD_PROOF_PRIMALITY_ROUNDS) {
            return Err(Error::ModulusShape("modulus seems prime".to_string()));
        }
        if jacobi(&self.w, n)? != -1 {
            return Err(Error::Verification("w has jacobi symbol other than -1".to_string()));
        }
        if !lt(&self.w, n) {
            return Err(Error::Verification("w exceeds the modulus".to_string()));
        }

        let y = mod_challenge(n, &self.w);
        let four = BigInt::from(4);
        for (i, yi) in y.iter().enumerate() {
            if !lt(&self.x[i], n) {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "x exceeds the modulus".to_string(),
                });
            }
            if !lt(&self.z[i], n) {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "z exceeds the modulus".to_string(),
                });
            }
            if &self.z[i].modpow(n, n) != yi {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "z^N == y".to_string(),
                });
            }
            let x4 = self.x[i].modpow(&four, n);
            if x4 != sign_twist(yi, &self.w, self.a[i], self.b[i], n) {
                return Err(Error::VerificationAt {
                    index: i,
                    check: "x^4 == (-1)^a * w^b * y".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_keys::test_key;
    use super::*;
    use rand::rngs::OsRng;

    fn b(v: i64) -> BigInt {
        BigInt::from(v)
    }

    fn sorted(mut v: Vec<BigInt>) -> Vec<BigInt> {
        v.sort();
        v
    }

    #[test]
    fn test_mod_proof_verify() {
        let key = test_key();
        let proof = key.mod_proof(&mut OsRng).unwrap();
        assert!(proof.verify(key.n()).is_ok());
    }

    #[test]
    fn test_mod_proof_tampered_response_rejected() {
        let key = test_key();
        let mut proof = key.mod_proof(&mut OsRng).unwrap();
        proof.z[MOD_PROOF_ITERATIONS - 1] -= 1;
        assert!(matches!(
            proof.verify(key.n()),
            Err(Error::VerificationAt { index, .. }) if index == MOD_PROOF_ITERATIONS - 1
        ));
    }

    #[test]
    fn test_mod_proof_forged_against_non_blum_modulus() {
        // 17 is not 3 mod 4
        let n = b(17 * 7);
        let phi = b(16 * 6);
        let w = b(0);
        let y = mod_challenge(&n, &w);
        let z0 = ModInt::new(&phi).mod_inverse(&n).unwrap();
        let forged = ModProof {
            w,
            x: vec![b(0); MOD_PROOF_ITERATIONS],
            a: vec![true; MOD_PROOF_ITERATIONS],
            b: vec![true; MOD_PROOF_ITERATIONS],
            z: y.iter().map(|yi| yi.modpow(&z0, &n)).collect(),
        };
        assert!(forged.verify(&n).is_err());
    }

    #[test]
    fn test_mod_proof_rejects_bad_moduli() {
        let key = test_key();
        let proof = key.mod_proof(&mut OsRng).unwrap();
        assert!(matches!(proof.verify(&(key.n() * 2)), Err(Error::ModulusShape(_))));
        assert!(matches!(proof.verify(&key.p), Err(Error::ModulusShape(_))));

        let mut short = proof.clone();
        short.a.pop();
        assert!(matches!(short.verify(key.n()), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_prime_mod_sqrt_tables() {
        let seven = b(7);
        assert_eq!(sorted(prime_mod_sqrt(&b(1), &seven)), vec![b(1), b(6)]);
        assert_eq!(sorted(prime_mod_sqrt(&b(2), &seven)), vec![b(3), b(4)]);
        assert!(prime_mod_sqrt(&b(3), &seven).is_empty());
        assert_eq!(sorted(prime_mod_sqrt(&b(4), &seven)), vec![b(2), b(5)]);
        assert!(prime_mod_sqrt(&b(5), &seven).is_empty());
        assert!(prime_mod_sqrt(&b(6), &seven).is_empty());

        let eleven = b(11);
        assert_eq!(sorted(prime_mod_sqrt(&b(1), &eleven)), vec![b(1), b(10)]);
        assert!(prime_mod_sqrt(&b(2), &eleven).is_empty());
        assert_eq!(sorted(prime_mod_sqrt(&b(3), &eleven)), vec![b(5), b(6)]);
        assert_eq!(sorted(prime_mod_sqrt(&b(4), &eleven)), vec![b(2), b(9)]);
        assert_eq!(sorted(prime_mod_sqrt(&b(5), &eleven)), vec![b(4), b(7)]);
        assert!(prime_mod_sqrt(&b(6), &eleven).is_empty());
        assert!(prime_mod_sqrt(&b(7), &eleven).is_empty());
        assert!(prime_mod_sqrt(&b(8), &eleven).is_empty());
        assert_eq!(sorted(prime_mod_sqrt(&b(9), &eleven)), vec![b(3), b(8)]);
        assert!(prime_mod_sqrt(&b(10), &eleven).is_empty());
    }

    #[test]
    fn test_composite_roots() {
        let (p, q, n) = (b(7), b(11), b(77));
        assert_eq!(
            sorted(comp_mod_sqrt(&b(60), &p, &q, &n)),
            vec![b(26), b(37), b(40), b(51)]
        );
        for r in comp_mod_sqrt(&b(60), &p, &q, &n) {
            assert_eq!((&r * &r) % &n, b(60));
        }
        assert_eq!(comp_mod_4th_rt(&b(58), &p, &q, &n), Some(b(37)));
        // 59 = 3 mod 7 has no root
        assert_eq!(comp_mod_4th_rt(&b(59), &p, &q, &n), None);
    }

    #[test]
    fn test_quartic_root_matches_crt_root() {
        let key = test_key();
        let n = key.n();
        let x = hash_to_n(n, &[&b(99)]);
        let sq = (&x * &x).mod_floor(n);
        let quartic = (&sq * &sq).mod_floor(n);
        let root = quartic_root(&quartic, n, &key.phi_n);
        assert_eq!(root.modpow(&b(4), n), quartic);
        let crt_root = comp_mod_4th_rt(&quartic, &key.p, &key.q, n).unwrap();
        assert_eq!(crt_root.modpow(&b(4), n), quartic);
    }
}
