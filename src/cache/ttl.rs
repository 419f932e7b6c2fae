//! TTL resolution from request headers.
//!
//! Precedence: a positive `X-TTL`, then a positive `max-age` in the request's
//! `Cache-Control`, then the configured default. `s-maxage` is not consulted.

use axum::http::{header::CACHE_CONTROL, HeaderMap};
use once_cell::sync::Lazy;
use regex::Regex;

/// Request header carrying an explicit TTL in seconds.
pub const TTL_HEADER: &str = "x-ttl";

/// Fallback TTL when the request expresses none.
pub const DEFAULT_TTL_SECS: u64 = 900;

static MAX_AGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s,])max-age\s*=\s*(\d+)").expect("max-age pattern is valid")
});

/// Picks the TTL, in seconds, for an entry written on behalf of this request.
pub fn resolve_ttl(headers: &HeaderMap, default_ttl: u64) -> u64 {
    explicit_ttl(headers)
        .or_else(|| max_age(headers))
        .unwrap_or(default_ttl)
}

fn explicit_ttl(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(TTL_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ttl| *ttl > 0)
}

fn max_age(headers: &HeaderMap) -> Option<u64> {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            MAX_AGE
                .captures(value)
                .and_then(|caps| caps[1].parse::<u64>().ok())
        })
        .filter(|ttl| *ttl > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_x_ttl_wins() {
        let h = headers(&[("x-ttl", "30"), ("cache-control", "max-age=600")]);
        assert_eq!(resolve_ttl(&h, DEFAULT_TTL_SECS), 30);
    }

    #[test]
    fn test_max_age_fallback() {
        let h = headers(&[("cache-control", "public, max-age=120")]);
        assert_eq!(resolve_ttl(&h, DEFAULT_TTL_SECS), 120);
    }

    #[test]
    fn test_invalid_x_ttl_falls_through() {
        for bad in ["0", "-5", "abc", "1.5", ""] {
            let h = headers(&[("x-ttl", bad), ("cache-control", "max-age=45")]);
            assert_eq!(resolve_ttl(&h, DEFAULT_TTL_SECS), 45, "x-ttl {bad:?}");
        }
    }

    #[test]
    fn test_s_maxage_ignored() {
        let h = headers(&[("cache-control", "s-maxage=300")]);
        assert_eq!(resolve_ttl(&h, DEFAULT_TTL_SECS), DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_max_age_zero_uses_default() {
        let h = headers(&[("cache-control", "max-age=0")]);
        assert_eq!(resolve_ttl(&h, DEFAULT_TTL_SECS), DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_default_when_absent() {
        assert_eq!(resolve_ttl(&HeaderMap::new(), 900), 900);
        assert_eq!(resolve_ttl(&HeaderMap::new(), 60), 60);
    }
}
