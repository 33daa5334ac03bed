// sistema_chat_criptografado/chat_peer/src/lib.rs

pub mod config;
pub mod event_log;
pub mod monitor;
pub mod session;
pub mod transport;

use tracing_subscriber::EnvFilter;

/// Logs de diagnóstico em stderr; `RUST_LOG` substitui o filtro padrão.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
