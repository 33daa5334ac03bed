// sistema_chat_criptografado/shared_crypto/src/rsa.rs

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use tracing::{debug, info};

use crate::error::CryptoError;
use crate::math::{modexp, modinv};
use crate::prime::generate_prime;

/// Menor módulo aceito. Abaixo disso os primos de `bits/2` bits são tão poucos
/// que o sorteio de p != q pode não terminar.
pub const MIN_KEY_BITS: u64 = 32;

/// Chave pública `(e, n)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    pub e: BigUint,
    pub n: BigUint,
}

/// Chave privada `(d, n)`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub d: BigUint,
    pub n: BigUint,
}

// d nunca vai para os logs
impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("d", &"<oculto>")
            .field("n", &self.n)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl PublicKey {
    /// Comprimento de `n` em bytes.
    pub fn byte_len(&self) -> usize {
        modulus_byte_len(&self.n)
    }
}

impl KeyPair {
    /// Gera um par de chaves com módulo de aproximadamente `bits` bits.
    ///
    /// p e q têm `bits/2` bits cada e são sempre distintos; `e` é sorteado
    /// uniformemente em `[2, φ-1]` até ser coprimo com φ(n).
    pub fn generate(bits: u64) -> Result<KeyPair, CryptoError> {
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::InvalidKeySize { bits, reason: "mínimo de 32 bits" });
        }
        if bits % 2 != 0 {
            return Err(CryptoError::InvalidKeySize { bits, reason: "o módulo n deve ter tamanho par" });
        }

        let p = generate_prime(bits / 2)?;
        let mut q = generate_prime(bits / 2)?;
        while p == q {
            debug!("q repetiu p, sorteando outro primo");
            q = generate_prime(bits / 2)?;
        }
        let keys = KeyPair::from_primes(&p, &q)?;
        info!(bits, modulus_bits = keys.public_key.n.bits(), "par de chaves RSA gerado");
        Ok(keys)
    }

    /// Deriva o par de chaves a partir de dois primos distintos.
    pub fn from_primes(p: &BigUint, q: &BigUint) -> Result<KeyPair, CryptoError> {
        let two = BigUint::from(2u32);
        if p < &two || q < &two {
            return Err(CryptoError::InvalidKeySize {
                bits: (p * q).bits(),
                reason: "p e q precisam ser primos (>= 2)",
            });
        }
        if p == q {
            return Err(CryptoError::InvalidKeySize {
                bits: p.bits() * 2,
                reason: "p e q precisam ser distintos",
            });
        }
        let n = p * q;
        let phi = (p - BigUint::one()) * (q - BigUint::one());
        if phi <= two {
            return Err(CryptoError::InvalidKeySize { bits: n.bits(), reason: "φ(n) pequeno demais" });
        }

        let mut rng = OsRng;
        let e = loop {
            let candidate = rng.gen_biguint_range(&two, &phi);
            if candidate.gcd(&phi).is_one() {
                break candidate;
            }
        };
        let d = modinv(&e, &phi)?;
        debug_assert!(((&e * &d) % &phi).is_one());

        Ok(KeyPair {
            public_key: PublicKey { e, n: n.clone() },
            private_key: PrivateKey { d, n },
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// Cifra um único bloco: os bytes UTF-8 de `message` lidos como inteiro
/// big-endian, que precisa ser menor que `n`.
pub fn encrypt(message: &str, public_key: &PublicKey) -> Result<BigUint, CryptoError> {
    let m = BigUint::from_bytes_be(message.as_bytes());
    if m >= public_key.n {
        return Err(CryptoError::MessageTooLarge {
            len: message.len(),
            capacity: public_key.byte_len().saturating_sub(1),
        });
    }
    Ok(modexp(&m, &public_key.e, &public_key.n))
}

/// Decifra um bloco e decodifica o resultado como UTF-8.
///
/// Bytes zero à esquerda do texto original não sobrevivem à ida e volta pelo
/// inteiro.
pub fn decrypt(ciphertext: &BigUint, private_key: &PrivateKey) -> Result<String, CryptoError> {
    if ciphertext >= &private_key.n {
        return Err(CryptoError::MessageTooLarge {
            len: modulus_byte_len(ciphertext),
            capacity: modulus_byte_len(&private_key.n),
        });
    }
    let m = modexp(ciphertext, &private_key.d, &private_key.n);
    let bytes = if m.is_zero() { Vec::new() } else { m.to_bytes_be() };
    Ok(String::from_utf8(bytes)?)
}

fn modulus_byte_len(n: &BigUint) -> usize {
    ((n.bits() + 7) / 8) as usize
}
