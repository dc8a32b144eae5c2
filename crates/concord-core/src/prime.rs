//! Primality testing, the Jacobi symbol, and cancellable safe-prime search

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, RngCore};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

const SMALL_PRIME_COUNT: usize = 168;

/// Every prime below 1000
pub const SMALL_PRIMES: [u32; SMALL_PRIME_COUNT] = small_primes_below_1000();

const fn small_primes_below_1000() -> [u32; SMALL_PRIME_COUNT] {
    let mut composite = [false; 1000];
    let mut out = [0u32; SMALL_PRIME_COUNT];
    let mut count = 0;
    let mut i = 2;
    while i < 1000 {
        if !composite[i] {
            out[count] = i as u32;
            count += 1;
            let mut j = i * i;
            while j < 1000 {
                composite[j] = true;
                j += i;
            }
        }
        i += 1;
    }
    out
}

/// Miller-Rabin rounds applied to each half of a safe-prime candidate
const SAFE_PRIME_MR_ROUNDS: usize = 20;

/// Candidates scanned from one random starting point before resampling
const SIEVE_WINDOW: u64 = 1 << 16;

fn low_word(x: &BigInt) -> u32 {
    x.iter_u32_digits().next().unwrap_or(0)
}

/// Miller-Rabin with `rounds` bases drawn from `rng`, preceded by trial division.
pub fn is_probable_prime<R: RngCore + CryptoRng>(rng: &mut R, n: &BigInt, rounds: usize) -> bool {
    if n < &BigInt::from(2) {
        return false;
    }
    for p in SMALL_PRIMES {
        if n == &BigInt::from(p) {
            return true;
        }
        if (n % p).is_zero() {
            return false;
        }
    }
    // trial division covers everything below 1000^2
    if n < &BigInt::from(1_000_000) {
        return true;
    }

    let n_minus_one: BigInt = n - 1;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    let two = BigInt::from(2);

    'witness: for _ in 0..rounds {
        let a = rng.gen_bigint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x).mod_floor(n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn passes_fermat_base_two(n: &BigInt) -> bool {
    BigInt::from(2).modpow(&(n - 1), n).is_one()
}

/// Jacobi symbol `(a / n)` for odd positive `n`
pub fn jacobi(a: &BigInt, n: &BigInt) -> Result<i8> {
    if !n.is_positive() || n.is_even() {
        return Err(Error::InvalidParameters(
            "jacobi symbol needs an odd positive modulus".to_string(),
        ));
    }
    let mut a = a.mod_floor(n);
    let mut n = n.clone();
    let mut result: i8 = 1;
    while !a.is_zero() {
        while a.is_even() {
            a >>= 1u32;
            let r = low_word(&n) & 7;
            if r == 3 || r == 5 {
                result = -result;
            }
        }
        std::mem::swap(&mut a, &mut n);
        if low_word(&a) & 3 == 3 && low_word(&n) & 3 == 3 {
            result = -result;
        }
        a = a.mod_floor(&n);
    }
    Ok(if n.is_one() { result } else { 0 })
}

/// Deadline and cancellation flag threaded through long-running generation.
///
/// Clones share the flag, so cancelling any clone stops every holder.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl GenerationContext {
    /// A context that never expires on its own
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop every generation holding this context
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the context was cancelled or its deadline passed
    pub fn is_done(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`Error::Cancelled`] once the context is done
    pub fn check(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(Error::Cancelled("generation cancelled".to_string()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::Cancelled("generation deadline exceeded".to_string()));
        }
        Ok(())
    }
}

/// A safe prime `p = 2q + 1` together with its Sophie Germain prime `q`
#[derive(Clone, PartialEq, Eq)]
pub struct SafePrime {
    pub prime: BigInt,
    pub sophie_germain: BigInt,
}

impl std::fmt::Debug for SafePrime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafePrime")
            .field("bits", &self.prime.bits())
            .field("prime", &"[REDACTED]")
            .finish()
    }
}

/// Search for a `bits`-bit safe prime whose two top bits are set, so that the
/// product of two such primes has exactly `2 * bits` bits.
#[instrument(skip(rng, ctx))]
pub fn generate_safe_prime<R: RngCore + CryptoRng>(
    rng: &mut R,
    bits: usize,
    ctx: &GenerationContext,
) -> Result<SafePrime> {
    if bits < 16 {
        return Err(Error::InvalidParameters(format!(
            "safe primes need at least 16 bits, got {}",
            bits
        )));
    }
    let q_bits = (bits - 1) as u64;
    let top_bits = (BigUint::one() << (q_bits - 1)) | (BigUint::one() << (q_bits - 2));
    let mut attempts = 0u64;

    loop {
        ctx.check()?;
        let start = BigInt::from(rng.gen_biguint(q_bits) | &top_bits | BigUint::one());
        let residues: Vec<u64> = SMALL_PRIMES
            .iter()
            .map(|p| u64::from(low_word(&(&start % *p))))
            .collect();

        let mut delta = 0u64;
        while delta < SIEVE_WINDOW {
            if delta % 1024 == 0 {
                ctx.check()?;
            }
            let sieved = SMALL_PRIMES.iter().zip(&residues).all(|(p, r)| {
                let p = u64::from(*p);
                let rq = (r + delta) % p;
                rq != 0 && (2 * rq + 1) % p != 0
            });
            if sieved {
                attempts += 1;
                let q = &start + delta;
                if q.bits() != q_bits {
                    break;
                }
                let p: BigInt = &q * 2 + 1;
                if passes_fermat_base_two(&q)
                    && passes_fermat_base_two(&p)
                    && is_probable_prime(rng, &q, SAFE_PRIME_MR_ROUNDS)
                    && is_probable_prime(rng, &p, SAFE_PRIME_MR_ROUNDS)
                {
                    debug!(bits, attempts, "found safe prime");
                    return Ok(SafePrime {
                        prime: p,
                        sophie_germain: q,
                    });
                }
            }
            delta += 2;
        }
    }
}
