// sistema_chat_criptografado/chat_peer/src/transport/http.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Client;
use serde_json::json;
use shared_crypto::{EncryptedChatMessage, PublicKeyExchangeMessage};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use super::{parse_ciphertext, Frame, Transport, TransportError};

/// Timeout das requisições ao peer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
struct ServerState {
    local_key: Arc<PublicKeyExchangeMessage>,
    inbound: mpsc::UnboundedSender<Frame>,
}

/// Peer HTTP: recebe em `/exchange_keys` e `/webhook`, envia com reqwest para
/// as mesmas rotas do outro lado.
pub struct HttpTransport {
    client: Client,
    peer_url: String,
    local_addr: SocketAddr,
    inbound_tx: mpsc::UnboundedSender<Frame>,
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
    shutdown: watch::Sender<bool>,
}

impl HttpTransport {
    pub async fn bind(
        listen: SocketAddr,
        peer_url: impl Into<String>,
        local_key: PublicKeyExchangeMessage,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(listen).await?;
        Self::from_listener(listener, peer_url, local_key)
    }

    pub fn from_listener(
        listener: TcpListener,
        peer_url: impl Into<String>,
        local_key: PublicKeyExchangeMessage,
    ) -> Result<Self, TransportError> {
        let local_addr = listener.local_addr()?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);

        let state = ServerState { local_key: Arc::new(local_key), inbound: inbound_tx.clone() };
        let app = Router::new()
            .route("/exchange_keys", post(handle_key_exchange))
            .route("/webhook", post(handle_chat_message))
            .with_state(state);

        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            info!(addr = %local_addr, "servidor HTTP escutando");
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = stop.wait_for(|closed| *closed).await;
            });
            if let Err(e) = server.await {
                warn!(error = %e, "servidor HTTP encerrado com erro");
            }
        });

        // conexão direta entre peers, sem proxy do ambiente
        let client = Client::builder().timeout(REQUEST_TIMEOUT).no_proxy().build()?;
        Ok(HttpTransport {
            client,
            peer_url: peer_url.into().trim_end_matches('/').to_string(),
            local_addr,
            inbound_tx,
            inbound: Mutex::new(inbound_rx),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn post<T: serde::Serialize>(&self, route: &str, body: &T) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .post(format!("{}{}", self.peer_url, route))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), body });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::Closed);
        }
        match frame {
            Frame::KeyExchange(key) => {
                let response = self.post("/exchange_keys", &key).await?;
                // a resposta traz a chave do peer
                let peer_key: PublicKeyExchangeMessage = response.json().await?;
                self.inbound_tx
                    .send(Frame::KeyExchange(peer_key))
                    .map_err(|_| TransportError::Closed)
            }
            Frame::Ciphertext(message) => {
                self.post("/webhook", &EncryptedChatMessage { message }).await?;
                Ok(())
            }
        }
    }

    async fn receive(&self) -> Result<Frame, TransportError> {
        let mut shutdown = self.shutdown.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            frame = inbound.recv() => frame.ok_or(TransportError::Closed),
            _ = shutdown.wait_for(|closed| *closed) => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn handle_key_exchange(
    State(state): State<ServerState>,
    Json(peer_key): Json<PublicKeyExchangeMessage>,
) -> Json<PublicKeyExchangeMessage> {
    debug!(peer = ?peer_key.peer, "chave pública recebida via /exchange_keys");
    if state.inbound.send(Frame::KeyExchange(peer_key)).is_err() {
        warn!("chave recebida depois do encerramento do transporte");
    }
    Json(state.local_key.as_ref().clone())
}

async fn handle_chat_message(
    State(state): State<ServerState>,
    Json(body): Json<EncryptedChatMessage>,
) -> impl IntoResponse {
    match parse_ciphertext(&body.message) {
        Ok(ciphertext) => {
            if state.inbound.send(Frame::Ciphertext(ciphertext)).is_err() {
                return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "peer encerrado"})));
            }
            (StatusCode::OK, Json(json!({"status": "received"})))
        }
        Err(e) => {
            warn!(error = %e, "requisição inválida em /webhook");
            (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid request"})))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn key(e: u32, name: &str) -> PublicKeyExchangeMessage {
        PublicKeyExchangeMessage {
            e: BigUint::from(e),
            n: BigUint::from(3233u32),
            peer: Some(name.to_string()),
        }
    }

    async fn connected_pair() -> (HttpTransport, HttpTransport) {
        let a_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let a_url = format!("http://{}", a_listener.local_addr().unwrap());
        let b_url = format!("http://{}", b_listener.local_addr().unwrap());
        let a = HttpTransport::from_listener(a_listener, b_url, key(17, "A")).unwrap();
        let b = HttpTransport::from_listener(b_listener, a_url, key(7, "B")).unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_key_exchange_delivers_keys_to_both_sides() {
        let (a, b) = connected_pair().await;

        a.send(Frame::KeyExchange(key(17, "A"))).await.unwrap();

        // B recebe a chave pela rota; A recebe a de B pela resposta
        assert_eq!(b.receive().await.unwrap(), Frame::KeyExchange(key(17, "A")));
        assert_eq!(a.receive().await.unwrap(), Frame::KeyExchange(key(7, "B")));
    }

    #[tokio::test]
    async fn test_ciphertext_reaches_webhook() {
        let (a, b) = connected_pair().await;
        a.send(Frame::Ciphertext("98765".into())).await.unwrap();
        assert_eq!(b.receive().await.unwrap(), Frame::Ciphertext("98765".into()));
    }

    #[tokio::test]
    async fn test_non_decimal_body_is_rejected() {
        let (a, _b) = connected_pair().await;
        let err = a
            .post("/webhook", &json!({"message": "not-a-number"}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        // porta reservada e liberada logo em seguida: ninguém escuta nela
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_url = format!("http://{}", dead.local_addr().unwrap());
        drop(dead);

        let a = HttpTransport::from_listener(listener, dead_url, key(17, "A")).unwrap();
        assert!(matches!(
            a.send(Frame::KeyExchange(key(17, "A"))).await,
            Err(TransportError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_close_ends_receive_and_send() {
        let (a, _b) = connected_pair().await;
        a.close().await;
        assert!(matches!(a.receive().await, Err(TransportError::Closed)));
        assert!(matches!(
            a.send(Frame::Ciphertext("1".into())).await,
            Err(TransportError::Closed)
        ));
    }
}
