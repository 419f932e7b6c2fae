//! Cache Store Module
//!
//! TTL-aware read/write of responses against a [`CacheBackend`]. Bodies are
//! compressed then encrypted on write and decrypted then decompressed on read.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::cache::entry::{headers_to_pairs, pairs_to_headers, StoredBody};
use crate::cache::{CacheBackend, CacheEntry, CacheMetrics};
use crate::codec::{compression, encryption, CodecError, EncryptionKey};
use crate::error::{CacheError, Result};
use crate::proxy::UpstreamResponse;

// == Cache Store ==
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    key: EncryptionKey,
    metrics: Arc<CacheMetrics>,
}

impl CacheStore {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        key: EncryptionKey,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            backend,
            key,
            metrics,
        }
    }

    // == Lookup ==
    /// Returns the live, decodable response stored under `key`.
    ///
    /// Undecodable rows are logged and reported as absent. Backend failures
    /// are returned so the caller can decide how to degrade.
    pub async fn lookup(&self, key: &str) -> Result<Option<UpstreamResponse>> {
        self.lookup_at(key, Utc::now()).await
    }

    pub async fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<UpstreamResponse>> {
        let entry = match self.backend.get(key, now).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(CacheError::Decode(reason)) => {
                self.metrics.record_decode_failure();
                warn!(key, %reason, "unreadable cache row, treating as miss");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        if !entry.is_live_at(now) {
            return Ok(None);
        }

        match self.decode(entry) {
            Ok(response) => Ok(Some(response)),
            Err(err) => {
                self.metrics.record_decode_failure();
                warn!(key, error = %err, "cache entry failed to decode, treating as miss");
                Ok(None)
            }
        }
    }

    // == Store ==
    /// Encodes `response` and upserts it with `expires = now + ttl_secs`.
    pub async fn store(&self, key: &str, response: &UpstreamResponse, ttl_secs: u64) -> Result<()> {
        self.store_at(key, response, ttl_secs, Utc::now()).await
    }

    pub async fn store_at(
        &self,
        key: &str,
        response: &UpstreamResponse,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| CacheError::InvalidRequest(format!("ttl {ttl_secs}s out of range")))?;

        let entry = CacheEntry {
            key: key.to_string(),
            encoded_body: self.encode(&response.body)?,
            status: response.status.as_u16(),
            headers: headers_to_pairs(&response.headers),
            expires_at,
            created_at: now,
        };

        self.backend.upsert(entry).await?;
        debug!(key, ttl_secs, "cache entry written");
        Ok(())
    }

    // == Codec Chain ==
    fn encode(&self, body: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        let payload = serde_json::to_value(StoredBody::from_bytes(body))?;
        let compressed = compression::compress(&payload)?;
        let envelope = encryption::encrypt(compressed.as_bytes(), &self.key)?;
        Ok(envelope.into_bytes())
    }

    fn decode(&self, entry: CacheEntry) -> std::result::Result<UpstreamResponse, CodecError> {
        let envelope = String::from_utf8(entry.encoded_body)?;
        let compressed = String::from_utf8(encryption::decrypt(&envelope, &self.key)?)?;
        let payload: StoredBody = serde_json::from_value(compression::decompress(&compressed)?)?;

        let status = StatusCode::from_u16(entry.status)
            .map_err(|_| CodecError::MalformedEntry(format!("status {}", entry.status)))?;

        Ok(UpstreamResponse {
            status,
            headers: pairs_to_headers(&entry.headers)?,
            body: payload.into_bytes()?,
        })
    }
}
