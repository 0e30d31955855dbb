use axum::body::Bytes;
use axum::http::HeaderValue;

/// A memoized `200 OK` API response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Bytes,
    pub content_type: Option<HeaderValue>,
    /// Milliseconds since the epoch.
    pub stored_at: u64,
}

impl CacheEntry {
    /// Servable iff `now_ms - stored_at < ttl_ms`.
    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at) < ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(stored_at: u64) -> CacheEntry {
        CacheEntry {
            key: "GET:/api/x:{}".into(),
            payload: Bytes::from_static(b"{}"),
            content_type: None,
            stored_at,
        }
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let entry = entry_at(0);
        assert!(entry.is_fresh(0, 300_000));
        assert!(entry.is_fresh(299_999, 300_000));
        assert!(!entry.is_fresh(300_000, 300_000));
        assert!(!entry.is_fresh(400_000, 300_000));
    }

    #[test]
    fn boundary_is_relative_to_store_time() {
        let entry = entry_at(1_000);
        assert!(entry.is_fresh(300_999, 300_000));
        assert!(!entry.is_fresh(301_000, 300_000));
    }
}
