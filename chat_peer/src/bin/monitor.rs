// sistema_chat_criptografado/chat_peer/src/bin/monitor.rs

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use chat_peer::config::MonitorArgs;
use chat_peer::monitor::{render, LogTail};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MonitorArgs::parse();
    chat_peer::init_tracing("chat_peer=info");

    let mut tail = LogTail::open(&args.log_file)
        .with_context(|| format!("não foi possível abrir {}", args.log_file.display()))?;

    println!("\n=== MONITOR RSA - ATIVO ===");
    println!("Monitorando {} em tempo real...", tail.path().display());
    println!("Pressione Ctrl+C para sair\n");

    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_ms.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => match tail.poll() {
                Ok(events) => {
                    for event in &events {
                        println!("{}", render(event));
                    }
                }
                Err(e) => warn!(error = %e, "erro ao ler o log"),
            },
        }
    }

    println!("\nMonitoramento encerrado.");
    Ok(())
}
