// sistema_chat_criptografado/chat_peer/src/session.rs

//! Sessão entre dois peers sobre um [`Transport`].
//!
//! Estados: `Init → KeysExchanged → Active → Closed`. A chave do peer é
//! gravada uma única vez, pelo laço de entrada ([`Session::run_inbound`]), e
//! lida a partir daí por quem envia mensagens.

use std::fmt;
use std::time::Duration;

use num_bigint::BigUint;
use shared_crypto::{
    decrypt_and_verify, digest, max_message_len, sign_and_encrypt, CryptoError, KeyPair, PublicKey,
    PublicKeyExchangeMessage,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::event_log::EventLog;
use crate::transport::{Frame, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    KeysExchanged,
    Active,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "INIT",
            SessionState::KeysExchanged => "KEYS_EXCHANGED",
            SessionState::Active => "ACTIVE",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sessão não está pronta (estado {0})")]
    NotReady(SessionState),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub local_name: String,
    pub peer_name: String,
    /// Espera entre tentativas de enviar a chave durante o handshake
    pub retry_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            local_name: "Chat".to_string(),
            peer_name: "Peer".to_string(),
            retry_interval: Duration::from_secs(1),
        }
    }
}

pub struct Session<T: Transport> {
    keys: KeyPair,
    transport: T,
    events: EventLog,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    peer_key: watch::Sender<Option<PublicKey>>,
    /// Conta as quedas de conexão durante o handshake
    link_lost: watch::Sender<u64>,
}

impl<T: Transport> Session<T> {
    pub fn new(keys: KeyPair, transport: T, events: EventLog, options: SessionOptions) -> Self {
        Session {
            keys,
            transport,
            events,
            options,
            state: watch::channel(SessionState::Init).0,
            peer_key: watch::channel(None).0,
            link_lost: watch::channel(0).0,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    pub fn peer_key(&self) -> Option<PublicKey> {
        self.peer_key.borrow().clone()
    }

    pub fn peer_name(&self) -> &str {
        &self.options.peer_name
    }

    /// Maior mensagem aceita pela chave do peer, se já conhecida.
    pub fn peer_capacity(&self) -> Option<usize> {
        self.peer_key.borrow().as_ref().map(max_message_len)
    }

    /// Envia a chave local e espera a do peer.
    ///
    /// O envio é repetido a cada `retry_interval` enquanto o transporte
    /// falhar, sem limite de tentativas, e refeito se a conexão cair antes da
    /// chave do peer chegar. A chave do peer chega pelo `run_inbound`, que
    /// precisa estar rodando.
    pub async fn handshake(&self) -> Result<(), SessionError> {
        let current = self.state();
        if current != SessionState::Init {
            return Err(SessionError::NotReady(current));
        }

        let mut state = self.state.subscribe();
        let mut peer_key = self.peer_key.subscribe();
        let mut link_lost = self.link_lost.subscribe();
        let closed = async { state.wait_for(|s| *s == SessionState::Closed).await.map(|_| ()) };
        let exchange = async {
            loop {
                drop(link_lost.borrow_and_update());
                self.send_local_key().await;
                tokio::select! {
                    biased;
                    _ = async { let _ = peer_key.wait_for(Option::is_some).await; } => break,
                    _ = link_lost.changed() => debug!("conexão perdida, reenviando a chave pública"),
                }
            }
        };

        tokio::select! {
            biased;
            _ = closed => return Err(SessionError::NotReady(SessionState::Closed)),
            _ = exchange => {}
        }

        let advanced = self.state.send_if_modified(|s| {
            if *s == SessionState::Init {
                *s = SessionState::KeysExchanged;
                true
            } else {
                false
            }
        });
        if !advanced {
            return Err(SessionError::NotReady(self.state()));
        }
        info!(peer = %self.options.peer_name, "chaves trocadas");
        Ok(())
    }

    async fn send_local_key(&self) {
        let message = PublicKeyExchangeMessage::new(self.keys.public_key(), Some(self.options.local_name.clone()));
        let mut attempt = 1u64;
        loop {
            match self.transport.send(Frame::KeyExchange(message.clone())).await {
                Ok(()) => {
                    debug!(attempt, "chave pública enviada");
                    return;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "peer indisponível, tentando de novo");
                    attempt += 1;
                    tokio::time::sleep(self.options.retry_interval).await;
                }
            }
        }
    }

    /// `KeysExchanged → Active`.
    pub fn activate(&self) -> Result<(), SessionError> {
        let activated = self.state.send_if_modified(|s| {
            if *s == SessionState::KeysExchanged {
                *s = SessionState::Active;
                true
            } else {
                false
            }
        });
        if activated {
            Ok(())
        } else {
            Err(SessionError::NotReady(self.state()))
        }
    }

    /// Laço de entrada: chaves e mensagens vindas do transporte.
    ///
    /// Mensagens autenticadas vão para `mailbox`; as demais são registradas e
    /// descartadas. Uma queda de conexão ainda em `Init` faz o handshake reenviar
    /// a chave; depois disso, encerra a sessão como o fim do transporte ou um
    /// `close` local.
    pub async fn run_inbound(&self, mailbox: mpsc::UnboundedSender<String>) {
        let mut state = self.state.subscribe();
        loop {
            let frame = tokio::select! {
                biased;
                _ = async { state.wait_for(|s| *s == SessionState::Closed).await.map(|_| ()) } => break,
                frame = self.transport.receive() => frame,
            };

            match frame {
                Ok(Frame::KeyExchange(message)) => self.accept_peer_key(&message),
                Ok(Frame::Ciphertext(ciphertext)) => match self.open_message(&ciphertext) {
                    Ok(message) => {
                        if mailbox.send(message).is_err() {
                            debug!("caixa de entrada fechada, mensagem descartada");
                        }
                    }
                    Err(e) => warn!(error = %e, "mensagem descartada"),
                },
                // durante o handshake a queda é só mais uma falha de transporte
                Err(TransportError::Disconnected) if self.state() == SessionState::Init => {
                    warn!(peer = %self.options.peer_name, "conexão perdida durante a troca de chaves");
                    self.link_lost.send_modify(|count| *count += 1);
                }
                Err(TransportError::Closed | TransportError::Disconnected) => {
                    info!(peer = %self.options.peer_name, "conexão encerrada");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "falha no transporte");
                    break;
                }
            }
        }
        self.close().await;
    }

    fn accept_peer_key(&self, message: &PublicKeyExchangeMessage) {
        let key = message.public_key();
        let mut conflicting = false;
        let stored = self.peer_key.send_if_modified(|current| match current {
            None => {
                *current = Some(key.clone());
                true
            }
            Some(existing) => {
                conflicting = *existing != key;
                false
            }
        });

        if stored {
            info!(peer = ?message.peer, bits = key.n.bits(), "chave pública do peer recebida");
            self.events.key_exchange(&self.options.peer_name, &key);
        } else if conflicting {
            warn!(peer = ?message.peer, "chave diferente da já recebida ignorada");
        }
    }

    fn open_message(&self, ciphertext: &str) -> Result<String, SessionError> {
        let value = BigUint::parse_bytes(ciphertext.as_bytes(), 10)
            .ok_or_else(|| TransportError::Frame(format!("texto cifrado não é decimal: {:?}", ciphertext)))?;
        let message = decrypt_and_verify(&value, self.keys.private_key())?.into_authenticated()?;
        self.events
            .message_received(&self.options.peer_name, ciphertext, &message, &digest(&message));
        Ok(message)
    }

    /// Assina, cifra com a chave do peer e envia. Sem nova tentativa em caso
    /// de falha.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let current = self.state();
        if current != SessionState::Active {
            return Err(SessionError::NotReady(current));
        }
        let peer_key = self.peer_key().ok_or(SessionError::NotReady(current))?;

        let ciphertext = sign_and_encrypt(text, &peer_key)?.to_string();
        self.transport.send(Frame::Ciphertext(ciphertext.clone())).await?;
        self.events
            .message_sent(&self.options.peer_name, &ciphertext, text, &digest(text));
        Ok(())
    }

    pub async fn close(&self) {
        let previous = self.state.send_replace(SessionState::Closed);
        if previous != SessionState::Closed {
            info!(from = %previous, "sessão encerrada");
        }
        self.transport.close().await;
    }
}
