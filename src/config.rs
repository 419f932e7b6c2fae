//! Configuration Module
//!
//! Handles loading and validating proxy configuration from environment variables.
//! The resulting value is immutable and shared for the life of the process.

use std::env;
use std::fmt;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Url;

use crate::cache::sqlite::{is_valid_table_name, DEFAULT_TABLE};
use crate::cache::DEFAULT_TTL_SECS;
use crate::codec::encryption::KEY_LEN;

/// Prefix selecting base64 decoding for `CACHE_ENCRYPTION_KEY`.
const BASE64_PREFIX: &str = "base64:";

/// Proxy configuration parameters.
#[derive(Clone)]
pub struct Config {
    /// Origin API; only scheme, host and port are used
    pub upstream_url: Url,
    /// Expected `X-Cache-Service-Key` value
    pub service_key: String,
    /// Raw AES-256 key material
    pub encryption_key: Vec<u8>,
    /// SQLite database file
    pub database_path: String,
    /// Cache table name
    pub table_name: String,
    /// Path substrings that are never cached
    pub bypass_paths: Vec<String>,
    /// TTL in seconds when the request sets none
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Largest inbound body buffered for forwarding
    pub max_body_bytes: usize,
    /// Timeout applied by the upstream client
    pub upstream_timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("upstream_url", &self.upstream_url.as_str())
            .field("service_key", &"<redacted>")
            .field("encryption_key", &"<redacted>")
            .field("database_path", &self.database_path)
            .field("table_name", &self.table_name)
            .field("bypass_paths", &self.bypass_paths)
            .field("default_ttl", &self.default_ttl)
            .field("server_port", &self.server_port)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Loads the configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `UPSTREAM_URL` - Origin API base URL (required)
    /// - `CACHE_SERVICE_KEY` - Service key callers must present (required)
    /// - `CACHE_ENCRYPTION_KEY` - 32-byte key, raw or `base64:`-prefixed (required)
    /// - `CACHE_DATABASE_PATH` - SQLite file (default: cache.db)
    /// - `CACHE_TABLE` - Table name (default: cache_entries)
    /// - `CACHE_BYPASS_PATHS` - Comma-separated list (default: /realtime/,/subscribe)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 900)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAX_BODY_BYTES` - Inbound body limit (default: 10 MiB)
    /// - `UPSTREAM_TIMEOUT_SECS` - Upstream timeout (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup.
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{name} must be set"))
        };

        let upstream_url = parse_upstream_url(&required("UPSTREAM_URL")?)?;
        let service_key = required("CACHE_SERVICE_KEY")?;
        let encryption_key = parse_encryption_key(&required("CACHE_ENCRYPTION_KEY")?)?;

        let table_name = lookup("CACHE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if !is_valid_table_name(&table_name) {
            bail!("CACHE_TABLE {table_name:?} is not a plain SQL identifier");
        }

        let bypass_paths = lookup("CACHE_BYPASS_PATHS")
            .unwrap_or_else(|| "/realtime/,/subscribe".to_string())
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            upstream_url,
            service_key,
            encryption_key,
            database_path: lookup("CACHE_DATABASE_PATH").unwrap_or_else(|| "cache.db".to_string()),
            table_name,
            bypass_paths,
            default_ttl: lookup("DEFAULT_TTL")
                .and_then(|v| v.parse().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_TTL_SECS),
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            max_body_bytes: lookup("MAX_BODY_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            upstream_timeout_secs: lookup("UPSTREAM_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }
}

fn parse_upstream_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("UPSTREAM_URL {raw:?} is not a URL"))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        bail!("UPSTREAM_URL must be an http(s) base URL");
    }
    Ok(url)
}

fn parse_encryption_key(raw: &str) -> anyhow::Result<Vec<u8>> {
    let key = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => BASE64
            .decode(encoded.trim())
            .context("CACHE_ENCRYPTION_KEY is not valid base64")?,
        None => raw.as_bytes().to_vec(),
    };
    if key.len() != KEY_LEN {
        bail!(
            "CACHE_ENCRYPTION_KEY must be {KEY_LEN} bytes, got {}",
            key.len()
        );
    }
    Ok(key)
}
