//! Feldman verifiable secret sharing over secp256k1

use k256::elliptic_curve::Field;
use k256::{ProjectivePoint, Scalar};
use num_bigint::BigInt;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::ec::scalar_from_bigint;
use crate::error::{Error, Result};

/// Commitments `a_k * G` to the polynomial coefficients
pub type Vs = Vec<ProjectivePoint>;

/// One evaluation of the sharing polynomial
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    pub threshold: usize,
    pub id: Scalar,
    pub share: Scalar,
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("threshold", &self.threshold)
            .field("id", &self.id)
            .field("share", &"[REDACTED]")
            .finish()
    }
}

impl Zeroize for Share {
    fn zeroize(&mut self) {
        self.share = Scalar::ZERO;
    }
}

/// Map party keys to non-zero, distinct scalars
pub fn check_indexes(indexes: &[BigInt]) -> Result<Vec<Scalar>> {
    let mut ids: Vec<Scalar> = Vec::with_capacity(indexes.len());
    for index in indexes {
        let id = scalar_from_bigint(index)?;
        if bool::from(id.is_zero()) {
            return Err(Error::InvalidParameters(
                "party index is zero modulo the group order".to_string(),
            ));
        }
        if ids.contains(&id) {
            return Err(Error::InvalidParameters(
                "duplicate party index modulo the group order".to_string(),
            ));
        }
        ids.push(id);
    }
    Ok(ids)
}

fn evaluate_polynomial(poly: &[Scalar], id: &Scalar) -> Scalar {
    poly.iter()
        .rev()
        .fold(Scalar::ZERO, |acc, coefficient| acc * id + coefficient)
}

/// Share `secret` with a degree-`threshold` polynomial, one share per index
pub fn create<R: RngCore + CryptoRng>(
    rng: &mut R,
    threshold: usize,
    secret: &Scalar,
    indexes: &[BigInt],
) -> Result<(Vs, Vec<Share>)> {
    if threshold < 1 {
        return Err(Error::InvalidParameters("threshold must be at least 1".to_string()));
    }
    if indexes.len() <= threshold {
        return Err(Error::InvalidParameters(format!(
            "{} shares cannot reach threshold {}",
            indexes.len(),
            threshold
        )));
    }
    let ids = check_indexes(indexes)?;

    let mut poly = Vec::with_capacity(threshold + 1);
    poly.push(*secret);
    for _ in 0..threshold {
        poly.push(Scalar::random(&mut *rng));
    }
    let vs: Vs = poly.iter().map(|a| ProjectivePoint::GENERATOR * a).collect();
    let shares = ids
        .iter()
        .map(|id| Share {
            threshold,
            id: *id,
            share: evaluate_polynomial(&poly, id),
        })
        .collect();
    poly.zeroize();
    Ok((vs, shares))
}

impl Share {
    /// Check `share * G == sum_k vs[k] * id^k`
    pub fn verify(&self, threshold: usize, vs: &[ProjectivePoint]) -> bool {
        if self.threshold != threshold || vs.len() != threshold + 1 {
            return false;
        }
        let mut v = vs[0];
        let mut t = Scalar::ONE;
        for vj in &vs[1..] {
            t *= self.id;
            v += *vj * t;
        }
        ProjectivePoint::GENERATOR * self.share == v
    }
}

/// Lagrange coefficient of `ids[i]` at zero over the whole id set
pub fn lagrange_coefficient(i: usize, ids: &[Scalar]) -> Result<Scalar> {
    let xi = ids
        .get(i)
        .ok_or_else(|| Error::InvalidParameters(format!("index {} out of range", i)))?;
    let mut coefficient = Scalar::ONE;
    for (j, xj) in ids.iter().enumerate() {
        if j == i {
            continue;
        }
        let denominator: Option<Scalar> = (*xj - xi).invert().into();
        let denominator = denominator
            .ok_or_else(|| Error::InvalidParameters("duplicate share ids".to_string()))?;
        coefficient *= *xj * denominator;
    }
    Ok(coefficient)
}

/// Recover the shared secret from at least `threshold + 1` shares
pub fn reconstruct(shares: &[Share]) -> Result<Scalar> {
    let threshold = shares
        .first()
        .map(|s| s.threshold)
        .ok_or_else(|| Error::InvalidParameters("no shares to reconstruct from".to_string()))?;
    if shares.len() <= threshold {
        return Err(Error::InvalidParameters(format!(
            "{} shares cannot reach threshold {}",
            shares.len(),
            threshold
        )));
    }
    let ids: Vec<Scalar> = shares.iter().map(|s| s.id).collect();
    let mut secret = Scalar::ZERO;
    for (i, share) in shares.iter().enumerate() {
        secret += share.share * lagrange_coefficient(i, &ids)?;
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn indexes(n: u64) -> Vec<BigInt> {
        (1..=n).map(|i| BigInt::from(i * 1000 + 7)).collect()
    }

    #[test]
    fn test_create_and_verify() {
        let secret = Scalar::random(&mut OsRng);
        let (vs, shares) = create(&mut OsRng, 2, &secret, &indexes(5)).unwrap();
        assert_eq!(vs.len(), 3);
        assert_eq!(vs[0], ProjectivePoint::GENERATOR * secret);
        for share in &shares {
            assert!(share.verify(2, &vs));
            assert!(!share.verify(1, &vs));
        }
        let mut bad = shares[0].clone();
        bad.share += Scalar::ONE;
        assert!(!bad.verify(2, &vs));
    }

    #[test]
    fn test_reconstruct_needs_threshold_plus_one() {
        let secret = Scalar::random(&mut OsRng);
        let (_, shares) = create(&mut OsRng, 2, &secret, &indexes(5)).unwrap();
        assert_eq!(reconstruct(&shares[..3]).unwrap(), secret);
        assert_eq!(reconstruct(&shares[2..]).unwrap(), secret);
        assert_eq!(reconstruct(&shares).unwrap(), secret);
        assert!(reconstruct(&shares[..2]).is_err());
    }

    #[test]
    fn test_rejects_bad_indexes() {
        let secret = Scalar::random(&mut OsRng);
        let dup = vec![BigInt::from(3), BigInt::from(3), BigInt::from(4)];
        assert!(create(&mut OsRng, 1, &secret, &dup).is_err());
        let zero = vec![BigInt::from(0), BigInt::from(3), BigInt::from(4)];
        assert!(create(&mut OsRng, 1, &secret, &zero).is_err());
        assert!(create(&mut OsRng, 3, &secret, &indexes(3)).is_err());
        assert!(create(&mut OsRng, 0, &secret, &indexes(3)).is_err());
    }
}
