// sistema_chat_criptografado/shared_crypto/src/models.rs

use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::rsa::PublicKey;

/// Mensagem para trocar chaves públicas.
///
/// `e` e `n` saem como strings decimais e são aceitos como string ou número
/// JSON de qualquer tamanho.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyExchangeMessage {
    #[serde(serialize_with = "biguint_as_decimal", deserialize_with = "biguint_from_str_or_number")]
    pub e: BigUint,
    #[serde(serialize_with = "biguint_as_decimal", deserialize_with = "biguint_from_str_or_number")]
    pub n: BigUint,
    /// Nome de quem enviou a chave (ex: "Chat 2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

impl PublicKeyExchangeMessage {
    pub fn new(key: &PublicKey, peer: Option<String>) -> Self {
        PublicKeyExchangeMessage { e: key.e.clone(), n: key.n.clone(), peer }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey { e: self.e.clone(), n: self.n.clone() }
    }
}

/// Mensagem de chat cifrada: o inteiro do texto cifrado em decimal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncryptedChatMessage {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    KeyExchange,
    MessageSent,
    MessageReceived,
}

/// Uma linha do log de eventos lido pelo monitor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Hora local no formato `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
}

fn biguint_as_decimal<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_str_radix(10))
}

fn biguint_from_str_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    let digits = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return Err(de::Error::custom(format!("inteiro esperado, recebido {}", other))),
    };
    BigUint::parse_bytes(digits.trim().as_bytes(), 10)
        .ok_or_else(|| de::Error::custom(format!("inteiro decimal inválido: {:?}", digits)))
}
