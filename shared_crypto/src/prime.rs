// sistema_chat_criptografado/shared_crypto/src/prime.rs

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::error::CryptoError;
use crate::math::modexp;

/// Rodadas de Miller-Rabin por candidato: erro ≤ 4^-64 = 2^-128.
pub const MILLER_RABIN_ROUNDS: usize = 64;

/// Candidatos sorteados antes de desistir com `PrimalityExhaustion`.
pub const MAX_PRIME_ATTEMPTS: u32 = 20_000;

// Crivo preliminar: descarta a maioria dos compostos sem nenhuma exponenciação.
const SMALL_PRIMES: &[u32] = &[
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283,
    293, 307, 311, 313, 317, 331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401,
    409, 419, 421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503, 509,
    521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607, 613, 617, 619, 631,
    641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701, 709, 719, 727, 733, 739, 743, 751,
    757, 761, 769, 773, 787, 797, 809, 811, 821, 823, 827, 829, 839, 853, 857, 859, 863, 877,
    881, 883, 887, 907, 911, 919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997,
];

/// Gera um primo provável de exatamente `bits` bits.
pub fn generate_prime(bits: u64) -> Result<BigUint, CryptoError> {
    generate_prime_with_attempts(bits, MAX_PRIME_ATTEMPTS)
}

/// Como [`generate_prime`], com limite explícito de candidatos.
///
/// Cada candidato é ímpar e tem o bit mais alto ligado.
pub fn generate_prime_with_attempts(bits: u64, max_attempts: u32) -> Result<BigUint, CryptoError> {
    if bits <= 1 {
        return Err(CryptoError::InvalidPrimeBits(bits));
    }

    let mut rng = OsRng;
    for attempt in 1..=max_attempts {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probably_prime(&candidate, MILLER_RABIN_ROUNDS, &mut rng) {
            debug!(bits, attempt, "primo encontrado");
            return Ok(candidate);
        }
    }
    Err(CryptoError::PrimalityExhaustion { bits, attempts: max_attempts })
}

/// Teste de Miller-Rabin com `rounds` bases aleatórias, precedido por divisão
/// pelos primos pequenos.
pub fn is_probably_prime(n: &BigUint, rounds: usize, rng: &mut impl RngCore) -> bool {
    if n <= &BigUint::one() {
        return false;
    }
    if n == &BigUint::from(2u32) {
        return true;
    }
    if n.is_even() {
        return false;
    }
    for &p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - BigUint::one();
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    // n > 997 aqui, então [2, n-2] nunca é vazio
    let two = BigUint::from(2u32);
    let upper = n - BigUint::one();
    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &upper);
        let mut x = modexp(&a, &d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
