// sistema_chat_criptografado/shared_crypto/src/error.rs

use std::string::FromUtf8Error;

use thiserror::Error;

/// Erros das operações criptográficas.
///
/// Falhas de geração de chaves (`NoInverse`, `PrimalityExhaustion`,
/// `InvalidPrimeBits`, `InvalidKeySize`) impedem a inicialização do peer.
/// As demais são por mensagem: a mensagem é descartada e o peer continua.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("inverso modular não existe (gcd(a, m) != 1)")]
    NoInverse,

    #[error("nenhum primo de {bits} bits encontrado em {attempts} tentativas")]
    PrimalityExhaustion { bits: u64, attempts: u32 },

    #[error("tamanho de primo inválido: {0} bits (mínimo 2)")]
    InvalidPrimeBits(u64),

    #[error("tamanho de chave inválido: {bits} bits ({reason})")]
    InvalidKeySize { bits: u64, reason: &'static str },

    #[error("mensagem muito longa para a chave RSA: {len} bytes, capacidade {capacity} bytes")]
    MessageTooLarge { len: usize, capacity: usize },

    #[error("texto decifrado não é UTF-8 válido: {0}")]
    Decode(#[from] FromUtf8Error),

    #[error("payload com {chars} caracteres não contém um digest de 64")]
    MalformedPayload { chars: usize },

    #[error("digest não confere: mensagem adulterada ou cifrada para outra chave")]
    AuthenticationFailed,
}

impl CryptoError {
    /// `true` para erros de uma única mensagem, que não devem derrubar o peer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CryptoError::MessageTooLarge { .. }
                | CryptoError::Decode(_)
                | CryptoError::MalformedPayload { .. }
                | CryptoError::AuthenticationFailed
        )
    }
}
