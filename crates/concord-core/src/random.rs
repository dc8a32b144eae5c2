//! Sampling helpers over an explicit secure random source

use num_bigint::{BigInt, RandBigInt};
use num_traits::{Signed, Zero};
use rand::{CryptoRng, RngCore};

use crate::error::{Error, Result};
use crate::int::{is_number_in_multiplicative_group, ModInt};

/// Upper bound on rejection-sampling attempts
pub const CRYPTOGRAPHIC_RETRY_MAX: usize = 500;

/// Uniform value in `[0, less_than)`
pub fn random_positive_int<R: RngCore + CryptoRng>(
    rng: &mut R,
    less_than: &BigInt,
) -> Result<BigInt> {
    if !less_than.is_positive() {
        return Err(Error::InvalidParameters(
            "sampling bound must be positive".to_string(),
        ));
    }
    Ok(rng.gen_bigint_range(&BigInt::zero(), less_than))
}

/// Uniform unit of `Z_n`
pub fn random_positive_relatively_prime_int<R: RngCore + CryptoRng>(
    rng: &mut R,
    n: &BigInt,
) -> Result<BigInt> {
    for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
        let candidate = random_positive_int(rng, n)?;
        if is_number_in_multiplicative_group(n, &candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::Crypto(format!(
        "no unit found after {} attempts",
        CRYPTOGRAPHIC_RETRY_MAX
    )))
}

/// Uniform value in `[-2^bits * n, 2^bits * n]`
pub fn random_int_in_2pow_mul_range<R: RngCore + CryptoRng>(
    rng: &mut R,
    bits: usize,
    n: &BigInt,
) -> BigInt {
    let bound = n.abs() << bits;
    rng.gen_bigint_range(&-&bound, &(bound + 1))
}

/// Square of a random unit, a generator of the quadratic residues for the
/// moduli used here
pub fn random_quadratic_residue<R: RngCore + CryptoRng>(rng: &mut R, n: &BigInt) -> Result<BigInt> {
    let r = random_positive_relatively_prime_int(rng, n)?;
    Ok(ModInt::new(n).mul(&r, &r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_random_positive_int_bounds() {
        let bound = BigInt::from(10);
        for _ in 0..100 {
            let v = random_positive_int(&mut OsRng, &bound).unwrap();
            assert!(!v.is_negative() && v < bound);
        }
        assert!(random_positive_int(&mut OsRng, &BigInt::zero()).is_err());
    }

    #[test]
    fn test_relatively_prime_sample_is_unit() {
        let n = BigInt::from(3 * 5 * 7 * 11);
        for _ in 0..50 {
            let v = random_positive_relatively_prime_int(&mut OsRng, &n).unwrap();
            assert!(is_number_in_multiplicative_group(&n, &v));
        }
    }

    #[test]
    fn test_power_ranges_are_symmetric_bounds() {
        let n = BigInt::from(1000);
        let scaled = &n << 8usize;
        let mut saw_negative = false;
        for _ in 0..200 {
            let b = random_int_in_2pow_mul_range(&mut OsRng, 8, &n);
            assert!(b.abs() <= scaled);
            saw_negative |= b.is_negative();
        }
        assert!(saw_negative);
    }

    #[test]
    fn test_quadratic_residue_has_root() {
        let n = BigInt::from(7 * 11);
        let qr = random_quadratic_residue(&mut OsRng, &n).unwrap();
        let m = ModInt::new(&n);
        let has_root = (1..77).any(|r| m.mul(&BigInt::from(r), &BigInt::from(r)) == qr);
        assert!(has_root);
    }
}
