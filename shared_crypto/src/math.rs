// sistema_chat_criptografado/shared_crypto/src/math.rs

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::CryptoError;

/// Algoritmo de Euclides estendido.
///
/// Retorna `(g, x, y)` com `a*x + b*y == g == gcd(a, b)`. Iterativo, então a
/// profundidade não cresce com o tamanho das entradas.
pub fn extended_gcd(a: &BigUint, b: &BigUint) -> (BigUint, BigInt, BigInt) {
    let (mut old_r, mut r) = (BigInt::from(a.clone()), BigInt::from(b.clone()));
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let quotient = &old_r / &r;

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &quotient * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    // Entradas não negativas: o resto final nunca é negativo.
    let (_, g) = old_r.into_parts();
    (g, old_s, old_t)
}

/// Inverso modular `x` em `[0, m)` com `a*x ≡ 1 (mod m)`.
pub fn modinv(a: &BigUint, m: &BigUint) -> Result<BigUint, CryptoError> {
    if m.is_zero() || m.is_one() {
        return Err(CryptoError::NoInverse);
    }
    let (g, x, _) = extended_gcd(a, m);
    if !g.is_one() {
        return Err(CryptoError::NoInverse);
    }

    let m_signed = BigInt::from(m.clone());
    let (sign, magnitude) = x.mod_floor(&m_signed).into_parts();
    debug_assert_ne!(sign, Sign::Minus);
    Ok(magnitude)
}

/// `base^exponent mod modulus` por quadrados sucessivos.
///
/// Cada produto é reduzido módulo `modulus` na hora, então nenhum valor
/// intermediário passa de `modulus²`.
///
/// # Panics
///
/// Se `modulus` for zero. `rsa::encrypt` e `rsa::decrypt` nunca chegam aqui
/// com módulo zero: a entrada precisa ser menor que `n`.
pub fn modexp(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_one() {
        return BigUint::zero();
    }
    assert!(!modulus.is_zero(), "modexp com módulo zero");

    let mut result = BigUint::one();
    let mut base = base % modulus;
    for i in 0..exponent.bits() {
        if exponent.bit(i) {
            result = (&result * &base) % modulus;
        }
        base = (&base * &base) % modulus;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::RandBigInt;
    use rand::rngs::OsRng;

    #[test]
    fn test_extended_gcd_bezout_identity_on_random_inputs() {
        let mut rng = OsRng;
        for _ in 0..200 {
            let a = rng.gen_biguint(256);
            let b = rng.gen_biguint(192);
            let (g, x, y) = extended_gcd(&a, &b);
            assert_eq!(g, a.gcd(&b));
            let lhs = BigInt::from(a.clone()) * x + BigInt::from(b.clone()) * y;
            assert_eq!(lhs, BigInt::from(g));
        }
    }

    #[test]
    fn test_extended_gcd_with_zero() {
        let seven = BigUint::from(7u32);
        let zero = BigUint::zero();

        let (g, x, y) = extended_gcd(&seven, &zero);
        assert_eq!(g, seven);
        assert_eq!(BigInt::from(7) * x + BigInt::zero() * y, BigInt::from(7));

        let (g, _, y) = extended_gcd(&zero, &seven);
        assert_eq!(g, seven);
        assert_eq!(BigInt::from(7) * y, BigInt::from(7));

        let (g, _, _) = extended_gcd(&zero, &zero);
        assert!(g.is_zero());
    }

    #[test]
    fn test_modinv_known_value() {
        // 3 * 7 = 21 ≡ 1 (mod 10)
        let inv = modinv(&BigUint::from(3u32), &BigUint::from(10u32)).unwrap();
        assert_eq!(inv, BigUint::from(7u32));

        // 17 * 2753 ≡ 1 (mod 3120), par clássico de RSA com p=61, q=53
        let inv = modinv(&BigUint::from(17u32), &BigUint::from(3120u32)).unwrap();
        assert_eq!(inv, BigUint::from(2753u32));
    }

    #[test]
    fn test_modinv_random_is_in_range_and_inverts() {
        let mut rng = OsRng;
        let m = rng.gen_biguint(256) | BigUint::one();
        let mut checked = 0;
        while checked < 50 {
            let a = rng.gen_biguint_below(&m);
            if !a.gcd(&m).is_one() {
                continue;
            }
            let x = modinv(&a, &m).unwrap();
            assert!(x < m);
            assert!(((&a * &x) % &m).is_one());
            checked += 1;
        }
    }

    #[test]
    fn test_modinv_fails_without_coprimality() {
        let err = modinv(&BigUint::from(6u32), &BigUint::from(9u32)).unwrap_err();
        assert_eq!(err, CryptoError::NoInverse);
        assert_eq!(
            modinv(&BigUint::from(5u32), &BigUint::one()),
            Err(CryptoError::NoInverse)
        );
    }

    #[test]
    fn test_modexp_matches_modpow() {
        let mut rng = OsRng;
        for _ in 0..50 {
            let base = rng.gen_biguint(512);
            let exponent = rng.gen_biguint(300);
            let modulus = rng.gen_biguint(256) + BigUint::from(2u32);
            assert_eq!(
                modexp(&base, &exponent, &modulus),
                base.modpow(&exponent, &modulus)
            );
        }
    }

    #[test]
    #[should_panic(expected = "módulo zero")]
    fn test_modexp_zero_modulus_panics() {
        modexp(&BigUint::from(2u32), &BigUint::from(3u32), &BigUint::zero());
    }

    #[test]
    fn test_modexp_edge_cases() {
        let n = BigUint::from(13u32);
        assert_eq!(modexp(&BigUint::from(5u32), &BigUint::zero(), &n), BigUint::one());
        assert_eq!(modexp(&BigUint::zero(), &BigUint::from(5u32), &n), BigUint::zero());
        assert_eq!(
            modexp(&BigUint::from(5u32), &BigUint::from(3u32), &BigUint::one()),
            BigUint::zero()
        );
        // 4^13 mod 497 = 445
        assert_eq!(
            modexp(&BigUint::from(4u32), &BigUint::from(13u32), &BigUint::from(497u32)),
            BigUint::from(445u32)
        );
    }
}
