// sistema_chat_criptografado/shared_crypto/src/lib.rs

// Declaração dos módulos da biblioteca.
pub mod codec;
pub mod error;
pub mod math;
pub mod models;
pub mod prime;
pub mod rsa;
pub mod sha256;

// Exporta as structs e funções públicas principais para fácil acesso pelas aplicações.
pub use codec::{decrypt_and_verify, max_message_len, sign_and_encrypt, VerifiedMessage};
pub use error::CryptoError;
pub use math::{extended_gcd, modexp, modinv};
pub use models::{EncryptedChatMessage, EventKind, EventRecord, PublicKeyExchangeMessage};
pub use prime::generate_prime;
pub use rsa::{KeyPair, PrivateKey, PublicKey};
pub use sha256::{digest, sha256_from_bytes, DIGEST_HEX_LEN};
