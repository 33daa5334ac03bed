// sistema_chat_criptografado/chat_peer/src/main.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clearscreen::clear;
use inquire::{InquireError, Text};
use shared_crypto::{KeyPair, PublicKeyExchangeMessage};
use tokio::sync::mpsc;
use tracing::{info, warn};

use chat_peer::config::{Args, SocketRole, TransportKind};
use chat_peer::event_log::EventLog;
use chat_peer::session::{Session, SessionError, SessionOptions, SessionState};
use chat_peer::transport::{HttpTransport, SocketTransport, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    chat_peer::init_tracing("chat_peer=info,shared_crypto=info");
    clear().unwrap_or_else(|e| eprintln!("Erro ao limpar tela: {}", e));

    println!("--- {} ---", args.name);
    println!("Gerando chaves RSA de {} bits...", args.key_bits);
    let bits = args.key_bits;
    let keys = tokio::task::spawn_blocking(move || KeyPair::generate(bits))
        .await
        .context("tarefa de geração de chaves interrompida")?
        .context("não foi possível gerar as chaves RSA")?;
    println!("✅ Chaves geradas (n com {} bits)", keys.public_key().n.bits());

    let events = if args.no_event_log {
        EventLog::disabled()
    } else {
        EventLog::to_file(&args.log_file)
    };
    let options = SessionOptions {
        local_name: args.name.clone(),
        peer_name: args.peer_name.clone(),
        retry_interval: args.retry_interval(),
    };

    match args.transport {
        TransportKind::Http => {
            let local_key = PublicKeyExchangeMessage::new(keys.public_key(), Some(args.name.clone()));
            let transport = HttpTransport::bind(args.listen, args.peer_url(), local_key)
                .await
                .with_context(|| format!("não foi possível escutar em {}", args.listen))?;
            println!("Servidor em http://{}, peer em {}", transport.local_addr(), args.peer_url());
            run(Session::new(keys, transport, events, options), &args.name).await
        }
        TransportKind::Socket => {
            let transport = match args.role {
                SocketRole::Listen => {
                    let transport = SocketTransport::listen(args.listen)
                        .await
                        .with_context(|| format!("não foi possível escutar em {}", args.listen))?;
                    println!("Escutando em {}", args.listen);
                    transport
                }
                SocketRole::Dial => {
                    println!("Conectando em {}", args.peer);
                    SocketTransport::dial(args.peer.clone())
                }
            };
            run(Session::new(keys, transport, events, options), &args.name).await
        }
    }
}

async fn run<T: Transport + 'static>(session: Session<T>, name: &str) -> Result<()> {
    let session = Arc::new(session);
    let (mailbox_tx, mut mailbox) = mpsc::unbounded_channel();
    let inbound = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.run_inbound(mailbox_tx).await })
    };

    println!("Aguardando conexão com {}...", session.peer_name());
    tokio::select! {
        result = session.handshake() => result?,
        _ = tokio::signal::ctrl_c() => {
            session.close().await;
            let _ = inbound.await;
            return Ok(());
        }
    }
    session.activate()?;

    clear().unwrap_or_else(|e| eprintln!("Erro ao limpar tela: {}", e));
    println!("--- Chat com {} ---", session.peer_name());
    if let Some(capacity) = session.peer_capacity() {
        println!("Mensagens de até {} bytes.", capacity);
    }
    println!("Digite 'sair' ou 'exit' para encerrar.");
    println!("----------------------------------------------------");

    let printer = {
        let peer = session.peer_name().to_string();
        tokio::spawn(async move {
            while let Some(message) = mailbox.recv().await {
                println!("\r[{}] >>> {}", peer, message);
            }
        })
    };

    let mut state = session.subscribe();
    loop {
        let prompt = format!("[{}] <<<", name);
        let input = tokio::task::spawn_blocking(move || Text::new(&prompt).prompt());
        let line = tokio::select! {
            line = input => line.context("leitura do terminal interrompida")?,
            _ = state.wait_for(|s| *s == SessionState::Closed) => {
                println!("\n❌ {} saiu do chat. Pressione Enter para sair.", session.peer_name());
                break;
            }
        };

        let text = match line {
            Ok(text) => text,
            Err(InquireError::OperationInterrupted | InquireError::OperationCanceled) => break,
            Err(e) => {
                warn!(error = %e, "falha ao ler a entrada");
                break;
            }
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("sair") || text.eq_ignore_ascii_case("exit") {
            break;
        }

        match session.send_message(text).await {
            Ok(()) => {}
            Err(SessionError::NotReady(SessionState::Closed)) => break,
            Err(SessionError::Crypto(e)) => eprintln!("❌ Mensagem não enviada: {}", e),
            Err(e) => eprintln!("❌ Falha ao enviar: {}", e),
        }
    }

    session.close().await;
    let _ = inbound.await;
    let _ = printer.await;
    info!("chat encerrado");
    println!("Chat encerrado.");
    Ok(())
}
