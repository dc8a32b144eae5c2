//! Domain-separated SHA-512/256 hashing and hash-to-range
//!
//! Inputs are framed as an 8-byte little-endian input count followed by each
//! input and a `$` delimiter, so distinct input lists never share a preimage.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use sha2::{Digest, Sha512_256};

use crate::encoding::to_unsigned_bytes;

const HASH_INPUT_DELIMITER: u8 = b'$';

/// Output length of SHA-512/256 in bytes
pub const HASH_LENGTH: usize = 32;

/// SHA-512/256 over framed byte strings
pub fn sha512_256(inputs: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha512_256::new();
    hasher.update((inputs.len() as u64).to_le_bytes());
    for input in inputs {
        hasher.update(input);
        hasher.update([HASH_INPUT_DELIMITER]);
    }
    hasher.finalize().into()
}

/// SHA-512/256 over framed integers, returning the raw digest
pub fn sha512_256i_bytes(inputs: &[&BigInt]) -> [u8; HASH_LENGTH] {
    let encoded: Vec<Vec<u8>> = inputs.iter().map(|i| to_unsigned_bytes(i)).collect();
    let slices: Vec<&[u8]> = encoded.iter().map(Vec::as_slice).collect();
    sha512_256(&slices)
}

/// SHA-512/256 over framed integers, interpreted as a non-negative integer
pub fn sha512_256i(inputs: &[&BigInt]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &sha512_256i_bytes(inputs))
}

/// Hash `inputs` to a value in `[0, n)`.
///
/// Concatenates `ceil(bitlen(n) / 256) + 2` digests, one per block index, so the
/// final reduction carries 512 bits of slack and its bias is negligible.
pub fn hash_to_n(n: &BigInt, inputs: &[&BigInt]) -> BigInt {
    let blocks = (n.bits() as usize).div_ceil(256) + 2;
    let mut out = Vec::with_capacity(blocks * HASH_LENGTH);
    for block in 0..blocks {
        let index = BigInt::from(block);
        let mut framed: Vec<&BigInt> = Vec::with_capacity(inputs.len() + 2);
        framed.push(&index);
        framed.push(n);
        framed.extend_from_slice(inputs);
        out.extend_from_slice(&sha512_256i_bytes(&framed));
    }
    BigInt::from_bytes_be(Sign::Plus, &out).mod_floor(n)
}

/// Little-endian bit expansion: bit `i` is `(bytes[i / 8] >> (i % 8)) & 1`.
///
/// Positions past the end of `bytes` read as zero.
pub fn bytes_to_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / 8)
                .map(|b| (b >> (i % 8)) & 1 == 1)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Signed;

    #[test]
    fn test_framing_separates_inputs() {
        let a = sha512_256(&[b"ab".as_slice(), b"c".as_slice()]);
        let b = sha512_256(&[b"a".as_slice(), b"bc".as_slice()]);
        let c = sha512_256(&[b"abc".as_slice()]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_integer_hash_matches_byte_hash() {
        let x = BigInt::from(0x0102u32);
        let zero = BigInt::from(0);
        let by_ints = sha512_256i_bytes(&[&x, &zero]);
        let empty: &[u8] = &[];
        let by_bytes = sha512_256(&[[1u8, 2].as_slice(), empty]);
        assert_eq!(by_ints, by_bytes);
    }

    #[test]
    fn test_hash_to_n_in_range_and_deterministic() {
        let n = BigInt::from(1_000_003u64);
        let w = BigInt::from(42);
        for i in 0..32 {
            let idx = BigInt::from(i);
            let y = hash_to_n(&n, &[&w, &idx]);
            assert!(!y.is_negative());
            assert!(y < n);
            assert_eq!(y, hash_to_n(&n, &[&w, &idx]));
        }
    }

    #[test]
    fn test_hash_to_n_depends_on_modulus() {
        let w = BigInt::from(7);
        let n1 = (BigInt::from(1) << 300usize) - 1;
        let n2 = (BigInt::from(1) << 300usize) - 3;
        assert_ne!(hash_to_n(&n1, &[&w]), hash_to_n(&n2, &[&w]));
    }

    #[test]
    fn test_bytes_to_bits() {
        let bits = bytes_to_bits(&[0b0000_0101, 0b1000_0000], 16);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[2]);
        assert!(bits[15]);
        assert_eq!(bits.iter().filter(|b| **b).count(), 3);

        let padded = bytes_to_bits(&[0xff], 12);
        assert!(padded[7]);
        assert!(!padded[8]);
    }
}
