// sistema_chat_criptografado/chat_peer/src/config.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Servidor axum + cliente reqwest (rotas /exchange_keys e /webhook)
    Http,
    /// Conexão TCP única entre os dois peers
    Socket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SocketRole {
    Listen,
    Dial,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chat_peer", version, about = "Chat com RSA + SHA-256 entre dois peers")]
pub struct Args {
    /// Nome deste peer nos prompts e no log de eventos
    #[arg(long, default_value = "Chat", env = "CHAT_NAME")]
    pub name: String,

    /// Nome do outro peer
    #[arg(long, default_value = "Peer", env = "CHAT_PEER_NAME")]
    pub peer_name: String,

    #[arg(long, value_enum, default_value_t = TransportKind::Http, env = "CHAT_TRANSPORT")]
    pub transport: TransportKind,

    /// Endereço local (servidor HTTP ou socket em modo listen)
    #[arg(long, default_value = "127.0.0.1:5001", env = "CHAT_LISTEN")]
    pub listen: SocketAddr,

    /// Endereço do outro peer
    #[arg(long, default_value = "127.0.0.1:5000", env = "CHAT_PEER")]
    pub peer: String,

    /// Papel na conexão TCP (só para --transport socket)
    #[arg(long, value_enum, default_value_t = SocketRole::Listen, env = "CHAT_ROLE")]
    pub role: SocketRole,

    /// Tamanho do módulo RSA
    #[arg(long, default_value_t = 1024, env = "CHAT_KEY_BITS")]
    pub key_bits: u64,

    #[arg(long, default_value = "rsa_monitor.log", env = "CHAT_LOG_FILE")]
    pub log_file: PathBuf,

    /// Não grava o log de eventos
    #[arg(long)]
    pub no_event_log: bool,

    /// Intervalo entre tentativas de troca de chaves, em milissegundos
    #[arg(long, default_value_t = 1000, env = "CHAT_RETRY_MS")]
    pub retry_ms: u64,
}

impl Args {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// URL base do peer para o transporte HTTP.
    pub fn peer_url(&self) -> String {
        if self.peer.starts_with("http://") || self.peer.starts_with("https://") {
            self.peer.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.peer)
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "monitor", version, about = "Monitor do log de eventos RSA")]
pub struct MonitorArgs {
    #[arg(long, default_value = "rsa_monitor.log", env = "CHAT_LOG_FILE")]
    pub log_file: PathBuf,

    /// Intervalo de leitura do log, em milissegundos
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}
