// sistema_chat_criptografado/chat_peer/src/event_log.rs

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use serde_json::{json, Value};
use shared_crypto::{EventKind, EventRecord, PublicKey};
use tracing::warn;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log de eventos em JSON, uma linha por evento, lido pelo `monitor`.
///
/// Falhas de escrita só geram um aviso: o log nunca interrompe o chat.
#[derive(Debug)]
pub struct EventLog {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        EventLog { path: Some(path.into()), write_lock: Mutex::new(()) }
    }

    pub fn disabled() -> Self {
        EventLog { path: None, write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, kind: EventKind, data: Value) {
        let Some(path) = &self.path else { return };
        let record = EventRecord {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            kind,
            data,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "evento não serializável descartado");
                return;
            }
        };

        // uma linha por vez no arquivo
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "falha ao gravar no log de eventos");
        }
    }

    pub fn key_exchange(&self, peer: &str, key: &PublicKey) {
        self.record(
            EventKind::KeyExchange,
            json!({
                "peer": peer,
                "public_key": [key.e.to_string(), key.n.to_string()],
            }),
        );
    }

    pub fn message_sent(&self, to: &str, ciphertext: &str, message: &str, signature: &str) {
        self.record(
            EventKind::MessageSent,
            json!({
                "to": to,
                "encrypted": preview(ciphertext, 20),
                "decrypted": message,
                "signature": preview(signature, 16),
            }),
        );
    }

    pub fn message_received(&self, from: &str, ciphertext: &str, message: &str, signature: &str) {
        self.record(
            EventKind::MessageReceived,
            json!({
                "from": from,
                "encrypted": preview(ciphertext, 20),
                "decrypted": message,
                "signature": preview(signature, 16),
            }),
        );
    }
}

/// Primeiros `len` caracteres seguidos de `...`.
pub fn preview(text: &str, len: usize) -> String {
    let mut out: String = text.chars().take(len).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use std::fs;

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("chat_peer_{}_{}.log", name, std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    fn read_records(path: &Path) -> Vec<EventRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_records_are_appended_as_json_lines() {
        let path = temp_log("append");
        let log = EventLog::to_file(&path);
        let key = PublicKey { e: BigUint::from(17u32), n: BigUint::from(3233u32) };

        log.key_exchange("Chat 1", &key);
        log.message_sent("Chat 1", "123456789012345678901234567890", "oi", &"a".repeat(64));

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, EventKind::KeyExchange);
        assert_eq!(records[0].data["public_key"][1], "3233");
        assert_eq!(records[1].kind, EventKind::MessageSent);
        assert_eq!(records[1].data["encrypted"], "12345678901234567890...");
        assert_eq!(records[1].data["signature"], "aaaaaaaaaaaaaaaa...");
        assert_eq!(records[1].data["decrypted"], "oi");
        assert!(chrono::NaiveDateTime::parse_from_str(&records[1].timestamp, TIMESTAMP_FORMAT).is_ok());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let log = EventLog::to_file(std::env::temp_dir().join("não-existe").join("sub").join("x.log"));
        log.message_received("Chat 2", "1", "oi", "abc");
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let log = EventLog::disabled();
        assert!(log.path().is_none());
        log.message_received("Chat 2", "1", "oi", "abc");
    }

    #[test]
    fn test_preview_counts_characters() {
        assert_eq!(preview("ãéíõú", 2), "ãé...");
        assert_eq!(preview("12", 20), "12...");
    }
}
