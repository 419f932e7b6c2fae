//! Codec Module
//!
//! Byte transforms applied to cached bodies: structural + deflate compression
//! and AES-256-GCM authenticated encryption. Every failure is a [`CodecError`];
//! nothing here returns a best-effort value.

pub mod compression;
pub mod encryption;


use thiserror::Error;

pub use compression::{compress, decompress};
pub use encryption::{decrypt, derive_key, encrypt, EncryptionKey};

// == Codec Error ==
/// Failure raised by either codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Key material is not the size AES-256 requires
    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The system random source failed to produce a nonce
    #[error("random nonce generation failed")]
    Random,

    /// Sealing the plaintext failed
    #[error("encryption failed")]
    Encrypt,

    /// Envelope does not have the `nonce:ciphertext` shape
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// Tag check failed: wrong key or tampered data
    #[error("authentication failed")]
    Authentication,

    /// Packed JSON does not follow the structural encoding
    #[error("malformed packed value: {0}")]
    MalformedPacked(String),

    /// Stored status or header pairs cannot be restored
    #[error("malformed stored entry: {0}")]
    MalformedEntry(String),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("deflate: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
