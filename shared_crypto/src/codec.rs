// sistema_chat_criptografado/shared_crypto/src/codec.rs

use num_bigint::BigUint;

use crate::error::CryptoError;
use crate::rsa::{self, PrivateKey, PublicKey};
use crate::sha256::{digest, is_valid_sha256_hex_format, DIGEST_HEX_LEN};

/// Resultado de [`decrypt_and_verify`]. `verified == false` não é erro do
/// codec: quem chama decide o que fazer com a mensagem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedMessage {
    pub message: String,
    pub verified: bool,
}

impl VerifiedMessage {
    pub fn into_authenticated(self) -> Result<String, CryptoError> {
        if self.verified {
            Ok(self.message)
        } else {
            Err(CryptoError::AuthenticationFailed)
        }
    }
}

/// Maior mensagem (em bytes UTF-8) que cabe num bloco junto com o digest.
pub fn max_message_len(public_key: &PublicKey) -> usize {
    public_key.byte_len().saturating_sub(1 + DIGEST_HEX_LEN)
}

/// Anexa o digest à mensagem e cifra o conjunto com a chave do destinatário.
pub fn sign_and_encrypt(message: &str, recipient: &PublicKey) -> Result<BigUint, CryptoError> {
    let signature = digest(message);
    let mut payload = String::with_capacity(message.len() + DIGEST_HEX_LEN);
    payload.push_str(message);
    payload.push_str(&signature);

    rsa::encrypt(&payload, recipient).map_err(|err| match err {
        CryptoError::MessageTooLarge { .. } => CryptoError::MessageTooLarge {
            len: message.len(),
            capacity: max_message_len(recipient),
        },
        other => other,
    })
}

/// Decifra com a chave própria e confere o digest dos últimos 64 caracteres.
pub fn decrypt_and_verify(ciphertext: &BigUint, own_key: &PrivateKey) -> Result<VerifiedMessage, CryptoError> {
    let payload = rsa::decrypt(ciphertext, own_key)?;
    let (message, received_digest) = split_payload(&payload)?;
    let verified = is_valid_sha256_hex_format(received_digest) && digest(message) == received_digest;
    Ok(VerifiedMessage { message: message.to_owned(), verified })
}

/// Separa mensagem e digest. O corte é por caractere, não por byte: um payload
/// adulterado pode ter caracteres multibyte no trecho do digest.
fn split_payload(payload: &str) -> Result<(&str, &str), CryptoError> {
    match payload.char_indices().rev().nth(DIGEST_HEX_LEN - 1) {
        Some((split, _)) => Ok(payload.split_at(split)),
        None => Err(CryptoError::MalformedPayload { chars: payload.chars().count() }),
    }
}
