// sistema_chat_criptografado/chat_peer/src/transport/socket.rs

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shared_crypto::PublicKeyExchangeMessage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use super::{parse_ciphertext, Frame, Transport, TransportError};

type Inbound = Result<Frame, TransportError>;

enum Role {
    /// Aceita conexões; a mais recente substitui a anterior
    Listen,
    /// Conecta no peer sob demanda, no `send`, e de novo após cada queda
    Dial(String),
}

/// Conexão ativa. `id` separa a conexão atual de uma que já caiu.
struct Link {
    id: u64,
    writer: OwnedWriteHalf,
}

struct Shared {
    link: Mutex<Option<Link>>,
    next_id: AtomicU64,
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl Shared {
    /// Troca a conexão em `slot` por `stream` e começa a ler dela.
    fn attach(self: &Arc<Self>, stream: TcpStream, slot: &mut Option<Link>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (read_half, writer) = stream.into_split();
        *slot = Some(Link { id, writer });
        spawn_reader(Arc::clone(self), id, read_half);
    }
}

/// Conexão TCP com o peer.
///
/// Um frame por linha: objeto JSON para a troca de chaves, dígitos decimais
/// para o texto cifrado. A queda da conexão chega em `receive` como
/// `Err(Disconnected)`; o transporte continua utilizável e reconecta (dial) ou
/// aceita uma nova conexão (listen). Só `close` o encerra de vez.
pub struct SocketTransport {
    role: Role,
    local_addr: Option<SocketAddr>,
    shared: Arc<Shared>,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    shutdown: watch::Sender<bool>,
}

impl SocketTransport {
    pub async fn listen(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener)
    }

    pub fn from_listener(listener: TcpListener) -> Result<Self, TransportError> {
        let local_addr = listener.local_addr()?;
        let transport = Self::new(Role::Listen, Some(local_addr));

        let shared = Arc::clone(&transport.shared);
        let mut stop = transport.shutdown.subscribe();
        tokio::spawn(async move {
            info!(addr = %local_addr, "aguardando conexão TCP");
            loop {
                let accepted = tokio::select! {
                    accepted = listener.accept() => accepted,
                    _ = async { let _ = stop.wait_for(|closed| *closed).await; } => break,
                };
                match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "peer conectado");
                        let mut link = shared.link.lock().await;
                        shared.attach(stream, &mut link);
                    }
                    Err(e) => warn!(error = %e, "falha ao aceitar conexão"),
                }
            }
            debug!("escuta TCP encerrada");
        });
        Ok(transport)
    }

    pub fn dial(peer: impl Into<String>) -> Self {
        Self::new(Role::Dial(peer.into()), None)
    }

    fn new(role: Role, local_addr: Option<SocketAddr>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        SocketTransport {
            role,
            local_addr,
            shared: Arc::new(Shared {
                link: Mutex::new(None),
                next_id: AtomicU64::new(0),
                inbound: inbound_tx,
            }),
            inbound: Mutex::new(inbound_rx),
            shutdown: watch::channel(false).0,
        }
    }

    /// Endereço de escuta (só no papel `listen`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::Closed);
        }

        let mut link = self.shared.link.lock().await;
        if link.is_none() {
            match &self.role {
                Role::Listen => return Err(TransportError::NotConnected),
                Role::Dial(addr) => {
                    let stream = TcpStream::connect(addr.as_str())
                        .await
                        .map_err(|source| TransportError::Connect { addr: addr.clone(), source })?;
                    info!(peer = %addr, "conectado ao peer");
                    self.shared.attach(stream, &mut link);
                }
            }
        }

        let mut line = encode_frame(&frame)?;
        line.push('\n');
        let Some(current) = link.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        if let Err(e) = write_line(&mut current.writer, &line).await {
            // a próxima chamada abre (ou espera) outra conexão
            *link = None;
            return Err(e.into());
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Frame, TransportError> {
        let mut shutdown = self.shutdown.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            item = inbound.recv() => item.unwrap_or(Err(TransportError::Closed)),
            _ = async { let _ = shutdown.wait_for(|closed| *closed).await; } => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        self.shutdown.send_replace(true);
        if let Some(mut link) = self.shared.link.lock().await.take() {
            let _ = link.writer.shutdown().await;
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

fn spawn_reader(shared: Arc<Shared>, id: u64, read_half: OwnedReadHalf) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match decode_frame(&line) {
                    Ok(frame) => {
                        if shared.inbound.send(Ok(frame)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "frame descartado"),
                },
                Ok(None) => {
                    info!(connection = id, "peer desconectado");
                    break;
                }
                Err(e) => {
                    warn!(connection = id, error = %e, "conexão com o peer perdida");
                    break;
                }
            }
        }

        // só a queda da conexão atual é avisada; uma substituída ou fechada
        // localmente some em silêncio
        let mut link = shared.link.lock().await;
        if link.as_ref().is_some_and(|current| current.id == id) {
            *link = None;
            let _ = shared.inbound.send(Err(TransportError::Disconnected));
        }
        debug!(connection = id, "leitor TCP encerrado");
    });
}

fn encode_frame(frame: &Frame) -> Result<String, TransportError> {
    match frame {
        Frame::KeyExchange(key) => {
            serde_json::to_string(key).map_err(|e| TransportError::Frame(e.to_string()))
        }
        Frame::Ciphertext(ciphertext) => Ok(ciphertext.clone()),
    }
}

fn decode_frame(line: &str) -> Result<Frame, TransportError> {
    let line = line.trim();
    if line.starts_with('{') {
        let key: PublicKeyExchangeMessage =
            serde_json::from_str(line).map_err(|e| TransportError::Frame(e.to_string()))?;
        Ok(Frame::KeyExchange(key))
    } else {
        parse_ciphertext(line).map(Frame::Ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn key() -> PublicKeyExchangeMessage {
        PublicKeyExchangeMessage { e: BigUint::from(65_537u32), n: BigUint::from(3233u32), peer: None }
    }

    #[test]
    fn test_frame_encoding() {
        let encoded = encode_frame(&Frame::KeyExchange(key())).unwrap();
        assert_eq!(encoded, r#"{"e":"65537","n":"3233"}"#);
        assert_eq!(decode_frame(&encoded).unwrap(), Frame::KeyExchange(key()));
        assert_eq!(decode_frame("12345\r").unwrap(), Frame::Ciphertext("12345".into()));
        // e e n como números JSON também são aceitos
        assert_eq!(
            decode_frame(r#"{"e": 65537, "n": 3233}"#).unwrap(),
            Frame::KeyExchange(key())
        );
        assert!(decode_frame("{quebrado").is_err());
        assert!(decode_frame("olá").is_err());
    }

    #[tokio::test]
    async fn test_listen_and_dial_exchange_frames() {
        let server = SocketTransport::listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr().unwrap();

        // ninguém conectou ainda
        assert!(matches!(
            server.send(Frame::KeyExchange(key())).await,
            Err(TransportError::NotConnected)
        ));

        let client = SocketTransport::dial(addr.to_string());
        client.send(Frame::KeyExchange(key())).await.unwrap();
        assert_eq!(server.receive().await.unwrap(), Frame::KeyExchange(key()));

        server.send(Frame::Ciphertext("4242".into())).await.unwrap();
        assert_eq!(client.receive().await.unwrap(), Frame::Ciphertext("4242".into()));

        client.send(Frame::Ciphertext("1".into())).await.unwrap();
        client.send(Frame::Ciphertext("2".into())).await.unwrap();
        assert_eq!(server.receive().await.unwrap(), Frame::Ciphertext("1".into()));
        assert_eq!(server.receive().await.unwrap(), Frame::Ciphertext("2".into()));

        // a queda chega como Disconnected; só close encerra o transporte
        client.close().await;
        assert!(matches!(server.receive().await, Err(TransportError::Disconnected)));
        assert!(matches!(
            server.send(Frame::Ciphertext("3".into())).await,
            Err(TransportError::NotConnected)
        ));
        server.close().await;
        assert!(matches!(server.receive().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_dial_reconnects_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = SocketTransport::dial(listener.local_addr().unwrap().to_string());

        client.send(Frame::Ciphertext("1".into())).await.unwrap();
        let (first, _) = listener.accept().await.unwrap();
        drop(first);
        assert!(matches!(client.receive().await, Err(TransportError::Disconnected)));

        client.send(Frame::Ciphertext("2".into())).await.unwrap();
        let (second, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(second).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_listener_takes_a_new_connection() {
        let server = SocketTransport::listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let first = SocketTransport::dial(addr.to_string());
        first.send(Frame::Ciphertext("1".into())).await.unwrap();
        assert_eq!(server.receive().await.unwrap(), Frame::Ciphertext("1".into()));
        first.close().await;
        assert!(matches!(server.receive().await, Err(TransportError::Disconnected)));

        let second = SocketTransport::dial(addr.to_string());
        second.send(Frame::Ciphertext("2".into())).await.unwrap();
        assert_eq!(server.receive().await.unwrap(), Frame::Ciphertext("2".into()));
        server.send(Frame::Ciphertext("3".into())).await.unwrap();
        assert_eq!(second.receive().await.unwrap(), Frame::Ciphertext("3".into()));
    }

    #[tokio::test]
    async fn test_dial_refused_is_connect_error() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = dead.local_addr().unwrap();
        drop(dead);

        let client = SocketTransport::dial(addr.to_string());
        assert!(matches!(
            client.send(Frame::KeyExchange(key())).await,
            Err(TransportError::Connect { .. })
        ));
    }
}
