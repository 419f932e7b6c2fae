//! Cache Entry Module
//!
//! Defines the persisted form of a cached response and the tagged body payload
//! that goes through the codec chain.

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderName, HeaderValue};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::CodecError;

// == Cache Entry ==
/// One persisted row. `encoded_body` is always the output of compression
/// followed by encryption; plaintext is never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Hex digest of the request identity
    pub key: String,
    /// Encryption envelope bytes
    pub encoded_body: Vec<u8>,
    /// Upstream HTTP status code
    pub status: u16,
    /// Upstream response headers as captured at write time
    pub headers: Vec<HeaderPair>,
    /// After this instant the entry is logically absent
    pub expires_at: DateTime<Utc>,
    /// Write time, informational only
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Is Live ==
    /// True while `expires_at` is strictly after `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// == Header Conversion ==
/// A persisted header value. Visible ASCII stays readable as a JSON string;
/// any other bytes are kept verbatim as `{"b64": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredHeaderValue {
    Text(String),
    Raw { b64: String },
}

impl From<&HeaderValue> for StoredHeaderValue {
    fn from(value: &HeaderValue) -> Self {
        match value.to_str() {
            Ok(text) => StoredHeaderValue::Text(text.to_string()),
            Err(_) => StoredHeaderValue::Raw {
                b64: BASE64.encode(value.as_bytes()),
            },
        }
    }
}

impl StoredHeaderValue {
    fn to_header_value(&self) -> Result<HeaderValue, CodecError> {
        let invalid = |_: InvalidHeaderValue| CodecError::MalformedEntry("invalid header value".to_string());
        match self {
            StoredHeaderValue::Text(text) => HeaderValue::from_str(text).map_err(invalid),
            StoredHeaderValue::Raw { b64 } => {
                HeaderValue::from_bytes(&BASE64.decode(b64)?).map_err(invalid)
            }
        }
    }
}

/// One `[name, value]` element of the persisted header list.
pub type HeaderPair = (String, StoredHeaderValue);

/// Flattens a header map into `[name, value]` pairs, keeping every value.
pub fn headers_to_pairs(headers: &HeaderMap) -> Vec<HeaderPair> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), StoredHeaderValue::from(value)))
        .collect()
}

/// Rebuilds a header map from stored pairs, keeping repeated names.
pub fn pairs_to_headers(pairs: &[HeaderPair]) -> Result<HeaderMap, CodecError> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| CodecError::MalformedEntry(format!("invalid header name {name:?}")))?;
        headers.append(name, value.to_header_value()?);
    }
    Ok(headers)
}

// == Stored Body ==
/// Body payload handed to the compression codec.
///
/// `Json` is only used when compact re-serialisation reproduces the original
/// bytes exactly, so every variant restores a byte-identical body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StoredBody {
    Json(Value),
    Text(String),
    Binary(String),
}

impl StoredBody {
    pub fn from_bytes(body: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            if serde_json::to_vec(&value).is_ok_and(|compact| compact == body) {
                return StoredBody::Json(value);
            }
        }
        match std::str::from_utf8(body) {
            Ok(text) => StoredBody::Text(text.to_string()),
            Err(_) => StoredBody::Binary(BASE64.encode(body)),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes, CodecError> {
        match self {
            StoredBody::Json(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
            StoredBody::Text(text) => Ok(Bytes::from(text)),
            StoredBody::Binary(encoded) => Ok(Bytes::from(BASE64.decode(encoded)?)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry_expiring(expires_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            key: "k".to_string(),
            encoded_body: Vec::new(),
            status: 200,
            headers: Vec::new(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_live_before_expiry() {
        let now = Utc::now();
        let entry = entry_expiring(now + Duration::seconds(30));
        assert!(entry.is_live_at(now));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        // Not strictly in the future means expired
        let now = Utc::now();
        let entry = entry_expiring(now);
        assert!(!entry.is_live_at(now));
        assert!(!entry.is_live_at(now + Duration::seconds(5)));
    }

    #[test]
    fn test_header_pairs_keep_repeated_names() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let pairs = headers_to_pairs(&headers);
        assert_eq!(pairs.len(), 3);

        let restored = pairs_to_headers(&pairs).unwrap();
        assert_eq!(restored.get_all("set-cookie").iter().count(), 2);
        assert_eq!(restored["content-type"], "application/json");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let pairs = vec![("bad name".to_string(), StoredHeaderValue::Text("x".to_string()))];
        assert!(pairs_to_headers(&pairs).is_err());
    }

    #[test]
    fn test_non_ascii_header_value_kept_verbatim() {
        let raw = b"attachment; filename=\"caf\xe9.json\"";
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("content-disposition", HeaderValue::from_bytes(raw).unwrap());

        let pairs = headers_to_pairs(&headers);
        assert_eq!(pairs.len(), 2);
        assert!(matches!(pairs[1].1, StoredHeaderValue::Raw { .. }));

        let json = serde_json::to_string(&pairs).unwrap();
        let reloaded: Vec<HeaderPair> = serde_json::from_str(&json).unwrap();
        let restored = pairs_to_headers(&reloaded).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored["content-disposition"].as_bytes(), raw);
    }

    #[test]
    fn test_stored_header_value_json_forms() {
        let text = StoredHeaderValue::Text("no-cache".to_string());
        assert_eq!(serde_json::to_string(&text).unwrap(), r#""no-cache""#);

        let raw: StoredHeaderValue = serde_json::from_str(r#"{"b64":"/w=="}"#).unwrap();
        assert_eq!(raw.to_header_value().unwrap().as_bytes(), &[0xff]);
    }

    #[test]
    fn test_stored_body_compact_json() {
        let body = br#"{"id":1}"#;
        let stored = StoredBody::from_bytes(body);
        assert!(matches!(stored, StoredBody::Json(_)));
        assert_eq!(stored.into_bytes().unwrap().as_ref(), body);
    }

    #[test]
    fn test_stored_body_pretty_json_kept_verbatim() {
        let body = b"{\n  \"id\": 1\n}";
        let stored = StoredBody::from_bytes(body);
        assert!(matches!(stored, StoredBody::Text(_)));
        assert_eq!(stored.into_bytes().unwrap().as_ref(), body);
    }

    #[test]
    fn test_stored_body_empty_and_binary() {
        let empty = StoredBody::from_bytes(b"");
        assert_eq!(empty, StoredBody::Text(String::new()));

        let binary = [0xff, 0x00, 0xfe];
        let stored = StoredBody::from_bytes(&binary);
        assert!(matches!(stored, StoredBody::Binary(_)));
        assert_eq!(stored.into_bytes().unwrap().as_ref(), &binary);
    }
}
