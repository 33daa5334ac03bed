// sistema_chat_criptografado/chat_peer/src/monitor.rs

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;
use shared_crypto::{EventKind, EventRecord};
use tracing::debug;

use crate::event_log::TIMESTAMP_FORMAT;

const SEPARATOR_WIDTH: usize = 50;
const MODULUS_PREVIEW: usize = 20;

/// Acompanha o log de eventos a partir do último byte lido.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    /// Abre o log, criando um arquivo vazio se ainda não existir.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(LogTail { path, offset: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Eventos gravados desde a última chamada.
    ///
    /// Só linhas completas são consumidas; uma linha ainda sem `\n` fica para a
    /// próxima leitura. Se o arquivo encolheu, a leitura recomeça do início.
    pub fn poll(&mut self) -> io::Result<Vec<EventRecord>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            debug!(path = %self.path.display(), "log truncado, relendo do início");
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = Vec::with_capacity((len - self.offset) as usize);
        file.read_to_end(&mut chunk)?;

        let Some(end) = chunk.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        self.offset += end as u64 + 1;

        let records = String::from_utf8_lossy(&chunk[..end])
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str::<EventRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "linha ignorada");
                    None
                }
            })
            .collect();
        Ok(records)
    }
}

/// Texto de um evento para o terminal, terminado pela linha separadora.
pub fn render(event: &EventRecord) -> String {
    let time = NaiveDateTime::parse_from_str(&event.timestamp, TIMESTAMP_FORMAT)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| event.timestamp.clone());
    let data = &event.data;

    let mut out = String::new();
    match event.kind {
        EventKind::KeyExchange => {
            let modulus: String = field(&data["public_key"][1]).chars().take(MODULUS_PREVIEW).collect();
            out.push_str(&format!("\n[{}]  Troca de Chaves com {}\n", time, field(&data["peer"])));
            out.push_str(&format!("   Chave pública (e): {}\n", field(&data["public_key"][0])));
            out.push_str(&format!("   Chave pública (n): {}...\n", modulus));
        }
        EventKind::MessageSent => {
            out.push_str(&format!("\n[{}]  Mensagem enviada para {}\n", time, field(&data["to"])));
            push_message_fields(&mut out, data);
        }
        EventKind::MessageReceived => {
            out.push_str(&format!("\n[{}]  Mensagem recebida de {}\n", time, field(&data["from"])));
            push_message_fields(&mut out, data);
        }
    }
    out.push_str(&"-".repeat(SEPARATOR_WIDTH));
    out
}

fn push_message_fields(out: &mut String, data: &Value) {
    out.push_str(&format!("   Conteúdo: {}\n", field(&data["decrypted"])));
    out.push_str(&format!("   Criptografado: {}\n", field(&data["encrypted"])));
    out.push_str(&format!("   Assinatura: {}\n", field(&data["signature"])));
}

fn field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "?".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::io::Write;

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("monitor_{}_{}.log", name, std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    const SENT: &str = r#"{"timestamp":"2024-05-01 10:20:30","type":"MESSAGE_SENT","data":{"to":"Chat 1","encrypted":"123...","decrypted":"oi","signature":"abc..."}}"#;

    #[test]
    fn test_tail_follows_complete_lines() {
        let path = temp_log("follow");
        let mut tail = LogTail::open(&path).unwrap();
        assert!(path.exists());
        assert!(tail.poll().unwrap().is_empty());

        append(&path, &format!("{}\n", SENT));
        assert_eq!(tail.poll().unwrap().len(), 1);
        assert!(tail.poll().unwrap().is_empty());

        // linha incompleta espera o resto
        let (head, rest) = SENT.split_at(30);
        append(&path, head);
        assert!(tail.poll().unwrap().is_empty());
        append(&path, &format!("{}\nlixo\n{{\"type\":\"SERVER_START\"}}\n", rest));
        let events = tail.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::MessageSent);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_tail_restarts_after_truncation() {
        let path = temp_log("truncate");
        let mut tail = LogTail::open(&path).unwrap();
        append(&path, &format!("{}\n{}\n", SENT, SENT));
        assert_eq!(tail.poll().unwrap().len(), 2);

        fs::write(&path, format!("{}\n", SENT)).unwrap();
        assert_eq!(tail.poll().unwrap().len(), 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_render_key_exchange() {
        let event = EventRecord {
            timestamp: "2024-05-01 10:20:30".to_string(),
            kind: EventKind::KeyExchange,
            data: json!({"peer": "Chat 2", "public_key": ["65537", "1234567890123456789012345"]}),
        };
        let text = render(&event);
        assert!(text.starts_with("\n[10:20:30]  Troca de Chaves com Chat 2\n"));
        assert!(text.contains("   Chave pública (e): 65537\n"));
        assert!(text.contains("   Chave pública (n): 12345678901234567890...\n"));
        assert!(text.ends_with(&"-".repeat(50)));
    }

    #[test]
    fn test_render_messages() {
        let sent: EventRecord = serde_json::from_str(SENT).unwrap();
        let text = render(&sent);
        assert!(text.contains("Mensagem enviada para Chat 1"));
        assert!(text.contains("   Conteúdo: oi\n"));
        assert!(text.contains("   Assinatura: abc...\n"));

        let received = EventRecord {
            timestamp: "sem data".to_string(),
            kind: EventKind::MessageReceived,
            data: json!({"from": "Chat 1", "decrypted": "olá"}),
        };
        let text = render(&received);
        assert!(text.contains("[sem data]  Mensagem recebida de Chat 1"));
        assert!(text.contains("   Criptografado: ?\n"));
    }
}
