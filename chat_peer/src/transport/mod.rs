// sistema_chat_criptografado/chat_peer/src/transport/mod.rs

//! Transportes intercambiáveis entre dois peers.
//!
//! A sessão só conhece [`Transport`]: frames de troca de chaves e textos
//! cifrados entram por `receive` e saem por `send`. Conexão, enquadramento e
//! timeouts de rede ficam com cada adaptador.

pub mod http;
pub mod memory;
pub mod socket;

use async_trait::async_trait;
use shared_crypto::PublicKeyExchangeMessage;
use thiserror::Error;

pub use http::HttpTransport;
pub use memory::MemoryTransport;
pub use socket::SocketTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    KeyExchange(PublicKeyExchangeMessage),
    /// Texto cifrado como inteiro decimal
    Ciphertext(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("falha ao conectar em {addr}: {source}")]
    Connect { addr: String, source: std::io::Error },

    #[error("nenhum peer conectado ainda")]
    NotConnected,

    #[error("erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("erro HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("peer respondeu com status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("frame inválido: {0}")]
    Frame(String),

    /// A conexão caiu, mas o transporte pode voltar a ser usado
    #[error("conexão com o peer perdida")]
    Disconnected,

    #[error("transporte encerrado")]
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Próximo frame recebido. `Err(Closed)` quando não há mais nada a receber;
    /// `Err(Disconnected)` quando a conexão caiu e pode ser refeita.
    async fn receive(&self) -> Result<Frame, TransportError>;

    async fn close(&self);
}

/// Texto cifrado válido: só dígitos decimais.
pub(crate) fn parse_ciphertext(text: &str) -> Result<String, TransportError> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransportError::Frame(format!("texto cifrado não é decimal: {:?}", text)));
    }
    Ok(text.to_string())
}
