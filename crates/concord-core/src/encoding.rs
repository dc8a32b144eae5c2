//! Byte encodings for big integers
//!
//! Public values travel as minimal unsigned big-endian strings. Values that can
//! be negative use a one-byte sign prefix: `0x00` for non-negative, anything
//! else for negative. A buffer of length one or less decodes to zero.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};

/// Minimal big-endian magnitude bytes. Zero encodes as an empty string.
pub fn to_unsigned_bytes(i: &BigInt) -> Vec<u8> {
    if i.is_zero() {
        return Vec::new();
    }
    i.magnitude().to_bytes_be()
}

/// Interpret big-endian bytes as a non-negative integer
pub fn from_unsigned_bytes(b: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, b)
}

pub fn ints_to_bytes(ints: &[BigInt]) -> Vec<Vec<u8>> {
    ints.iter().map(to_unsigned_bytes).collect()
}

pub fn bytes_to_ints(bzs: &[Vec<u8>]) -> Vec<BigInt> {
    bzs.iter().map(|b| from_unsigned_bytes(b)).collect()
}

/// Sign-prefixed encoding
pub fn marshal_signed(i: &BigInt) -> Vec<u8> {
    let magnitude = to_unsigned_bytes(i);
    let mut out = Vec::with_capacity(magnitude.len() + 1);
    out.push(if i.is_negative() { 1 } else { 0 });
    out.extend_from_slice(&magnitude);
    out
}

/// Inverse of [`marshal_signed`]
pub fn unmarshal_signed(b: &[u8]) -> BigInt {
    if b.len() <= 1 {
        return BigInt::zero();
    }
    let magnitude = from_unsigned_bytes(&b[1..]);
    if b[0] == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Non-empty byte string
pub fn non_empty_bytes(bz: &[u8]) -> bool {
    !bz.is_empty()
}

/// Every entry non-empty, and exactly `expected` entries when given
pub fn non_empty_multi_bytes(bzs: &[Vec<u8>], expected: Option<usize>) -> bool {
    if bzs.is_empty() {
        return false;
    }
    if let Some(len) = expected {
        if bzs.len() != len {
            return false;
        }
    }
    bzs.iter().all(|bz| non_empty_bytes(bz))
}

/// Exactly `expected` flags
pub fn non_empty_bools(bs: &[bool], expected: usize) -> bool {
    !bs.is_empty() && bs.len() == expected
}
