//! Big-integer comparisons and the modulus-bound arithmetic context
//!
//! Every [`ModInt`] operation canonicalizes its result into `[0, modulus)`.
//! Mixing values reduced under different moduli is the caller's concern.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// `x == y`
pub fn eq(x: &BigInt, y: &BigInt) -> bool {
    x == y
}

/// `x > y`
pub fn gt(x: &BigInt, y: &BigInt) -> bool {
    x > y
}

/// `x < y`
pub fn lt(x: &BigInt, y: &BigInt) -> bool {
    x < y
}

/// Whether `gcd(x, y) == 1`
pub fn coprime(x: &BigInt, y: &BigInt) -> bool {
    x.gcd(y).is_one()
}

/// `x + y * z` over the integers
pub fn add_mul(x: &BigInt, y: &BigInt, z: &BigInt) -> BigInt {
    x + y * z
}

/// Whether `v` is a unit of `Z_n`, i.e. `1 <= v < n` and `gcd(v, n) == 1`
pub fn is_number_in_multiplicative_group(n: &BigInt, v: &BigInt) -> bool {
    v.is_positive() && v < n && coprime(v, n)
}

/// Euclidean quotient: `x = q * y + r` with `0 <= r < |y|`
fn div_euclid(x: &BigInt, y: &BigInt) -> BigInt {
    let (q, r) = x.div_rem(y);
    if r.is_negative() {
        if y.is_positive() {
            q - 1
        } else {
            q + 1
        }
    } else {
        q
    }
}

/// Arithmetic context for a fixed positive modulus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModInt {
    modulus: BigInt,
}

impl ModInt {
    /// Bind arithmetic to `modulus`, which must be positive
    pub fn new(modulus: &BigInt) -> Self {
        Self {
            modulus: modulus.clone(),
        }
    }

    /// The bound modulus
    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    fn reduce(&self, x: &BigInt) -> BigInt {
        x.mod_floor(&self.modulus)
    }

    pub fn neg(&self, x: &BigInt) -> BigInt {
        self.reduce(&-x)
    }

    pub fn add(&self, x: &BigInt, y: &BigInt) -> BigInt {
        self.reduce(&(x + y))
    }

    pub fn sub(&self, x: &BigInt, y: &BigInt) -> BigInt {
        self.reduce(&(x - y))
    }

    /// Euclidean division over the integers, then reduction.
    ///
    /// Panics if `y` is zero, like integer division.
    pub fn div(&self, x: &BigInt, y: &BigInt) -> BigInt {
        self.reduce(&div_euclid(x, y))
    }

    pub fn mul(&self, x: &BigInt, y: &BigInt) -> BigInt {
        self.reduce(&(x * y))
    }

    /// `x^y mod m`. A negative exponent raises the inverse of `x`; when `x` is
    /// not invertible the result is zero.
    pub fn exp(&self, x: &BigInt, y: &BigInt) -> BigInt {
        if y.is_negative() {
            match self.mod_inverse(x) {
                Some(inv) => inv.modpow(&-y, &self.modulus),
                None => BigInt::zero(),
            }
        } else {
            x.modpow(y, &self.modulus)
        }
    }

    /// `x * y^z mod m`
    pub fn mul_exp(&self, x: &BigInt, y: &BigInt, z: &BigInt) -> BigInt {
        self.mul(x, &self.exp(y, z))
    }

    /// `x^y * z^w mod m`
    pub fn exp_mul_exp(&self, x: &BigInt, y: &BigInt, z: &BigInt, w: &BigInt) -> BigInt {
        self.mul(&self.exp(x, y), &self.exp(z, w))
    }

    /// Multiplicative inverse of `g`, if one exists
    pub fn mod_inverse(&self, g: &BigInt) -> Option<BigInt> {
        let g = self.reduce(g);
        let egcd = g.extended_gcd(&self.modulus);
        if egcd.gcd.is_one() {
            Some(self.reduce(&egcd.x))
        } else {
            None
        }
    }
}
