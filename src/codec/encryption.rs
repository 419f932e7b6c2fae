//! Encryption Codec
//!
//! AES-256-GCM with a fresh 96-bit random nonce per call. The envelope is
//! `base64(nonce):base64(ciphertext || tag)`; `:` never occurs in standard base64.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use super::CodecError;

/// Separator between the nonce and ciphertext parts of an envelope.
pub const ENVELOPE_DELIMITER: char = ':';

/// Required key size in bytes.
pub const KEY_LEN: usize = 32;

// == Encryption Key ==
/// Imported AES-256-GCM key. Cheap to clone; the key material never appears in `Debug`.
#[derive(Clone)]
pub struct EncryptionKey {
    inner: Arc<LessSafeKey>,
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

// == Derive Key ==
/// Imports raw key material as-is. No stretching is applied, so the secret
/// must already be exactly [`KEY_LEN`] bytes.
pub fn derive_key(secret: &[u8]) -> Result<EncryptionKey, CodecError> {
    if secret.len() != KEY_LEN {
        return Err(CodecError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: secret.len(),
        });
    }
    let unbound = UnboundKey::new(&AES_256_GCM, secret).map_err(|_| CodecError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: secret.len(),
    })?;
    Ok(EncryptionKey {
        inner: Arc::new(LessSafeKey::new(unbound)),
    })
}

// == Encrypt ==
/// Seals `plaintext` under a newly generated nonce and returns the envelope.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<String, CodecError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| CodecError::Random)?;

    let mut in_out = plaintext.to_vec();
    key.inner
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CodecError::Encrypt)?;

    Ok(format!(
        "{}{}{}",
        BASE64.encode(nonce_bytes),
        ENVELOPE_DELIMITER,
        BASE64.encode(&in_out)
    ))
}

// == Decrypt ==
/// Opens an envelope. Returns plaintext only when the tag verifies.
pub fn decrypt(envelope: &str, key: &EncryptionKey) -> Result<Vec<u8>, CodecError> {
    let (nonce_part, cipher_part) = envelope
        .split_once(ENVELOPE_DELIMITER)
        .ok_or(CodecError::MalformedEnvelope("missing delimiter"))?;

    let nonce_bytes = BASE64.decode(nonce_part)?;
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
        .map_err(|_| CodecError::MalformedEnvelope("nonce must be 96 bits"))?;

    let mut in_out = BASE64.decode(cipher_part)?;
    if in_out.len() < AES_256_GCM.tag_len() {
        return Err(CodecError::MalformedEnvelope("ciphertext shorter than tag"));
    }

    let plaintext = key
        .inner
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CodecError::Authentication)?;
    Ok(plaintext.to_vec())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> EncryptionKey {
        derive_key(&[fill; KEY_LEN]).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let key = test_key(7);
        let envelope = encrypt(b"hello cache", &key).unwrap();
        assert_eq!(decrypt(&envelope, &key).unwrap(), b"hello cache");
    }

    #[test]
    fn test_roundtrip_empty_plaintext() {
        let key = test_key(7);
        let envelope = encrypt(b"", &key).unwrap();
        assert!(decrypt(&envelope, &key).unwrap().is_empty());
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = encrypt(b"payload", &test_key(1)).unwrap();
        let (nonce, cipher) = envelope.split_once(':').unwrap();
        assert_eq!(BASE64.decode(nonce).unwrap().len(), NONCE_LEN);
        assert_eq!(BASE64.decode(cipher).unwrap().len(), b"payload".len() + 16);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = test_key(3);
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a.split_once(':').unwrap().0, b.split_once(':').unwrap().0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let envelope = encrypt(b"secret", &test_key(1)).unwrap();
        assert!(matches!(
            decrypt(&envelope, &test_key(2)),
            Err(CodecError::Authentication)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let key = test_key(9);
        let envelope = encrypt(b"secret payload", &key).unwrap();
        let (nonce, cipher) = envelope.split_once(':').unwrap();
        let mut bytes = BASE64.decode(cipher).unwrap();
        bytes[0] ^= 0x01;
        let tampered = format!("{}:{}", nonce, BASE64.encode(bytes));
        assert!(matches!(
            decrypt(&tampered, &key),
            Err(CodecError::Authentication)
        ));
    }

    #[test]
    fn test_malformed_envelopes() {
        let key = test_key(4);
        assert!(matches!(
            decrypt("no-delimiter", &key),
            Err(CodecError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decrypt("AAAA:AAAA", &key),
            Err(CodecError::MalformedEnvelope(_))
        ));
        assert!(decrypt("###:###", &key).is_err());
    }

    #[test]
    fn test_key_length_enforced() {
        assert!(matches!(
            derive_key(b"too short"),
            Err(CodecError::InvalidKeyLength { expected: 32, actual: 9 })
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", test_key(0x41));
        assert!(rendered.contains("AES-256-GCM"));
        assert!(!rendered.contains("65"));
    }
}
