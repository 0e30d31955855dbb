use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header, response::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::{StreamExt, stream};
use tracing::{debug, warn};

use crate::{
    cache::{CacheEntry, ResponseCache, keys::QueryParams, shaping::shape_json_body},
    config::Config,
    error::AppError,
    utils::path_has_prefix,
};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Read-through caching of `GET` responses under the API prefix.
#[derive(Clone)]
pub struct ResponseCaching {
    cache: Arc<ResponseCache>,
    enabled: bool,
    remove_empty_fields: bool,
    api_prefix: String,
    max_body_bytes: usize,
}

impl ResponseCaching {
    pub fn new(cache: Arc<ResponseCache>, config: &Config) -> Self {
        Self {
            cache,
            enabled: config.cache_enabled,
            remove_empty_fields: config.cache_remove_empty_fields,
            api_prefix: config.api_prefix.clone(),
            max_body_bytes: config.cache_max_body_bytes,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    fn applies_to(&self, req: &Request<Body>) -> bool {
        self.enabled
            && req.method() == Method::GET
            && path_has_prefix(req.uri().path(), &self.api_prefix)
    }

    fn cache_control(&self) -> HeaderValue {
        let max_age = self.cache.ttl_ms() / 1000;
        HeaderValue::from_str(&format!("public, max-age={}", max_age))
            .unwrap_or_else(|_| HeaderValue::from_static("public"))
    }

    fn hit(&self, entry: CacheEntry) -> Response {
        let mut response = Response::new(Body::from(entry.payload));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        if let Some(content_type) = entry.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
        headers.insert(header::CACHE_CONTROL, self.cache_control());
        response
    }

    /// Buffers a `200` response, shapes it, stores it and hands it back
    /// marked as a miss. Oversized, streaming or unshapeable responses pass
    /// through unstored; a body that errors mid-read becomes a 502.
    async fn memoize(&self, path: &str, query: &QueryParams, response: Response) -> Response {
        if is_streaming(&response) || self.declared_too_large(&response) {
            debug!(path, "Response not cacheable, passing through");
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match buffer_up_to(body, self.max_body_bytes).await {
            Buffered::Complete(bytes) => bytes,
            Buffered::Overflow(body) => {
                debug!(path, "Response exceeds cacheable size, passing through");
                return Response::from_parts(parts, body);
            }
            Buffered::Failed(e) => {
                return AppError::UpstreamFailed(format!("{} {}: {}", Method::GET, path, e))
                    .into_response();
            }
        };

        let payload = if self.remove_empty_fields && is_json(&parts) {
            match shape_json_body(&bytes) {
                Ok(shaped) => shaped,
                Err(e) => {
                    warn!(path, "Could not shape JSON response, skipping cache: {}", e);
                    return rebuild(parts, bytes);
                }
            }
        } else {
            bytes
        };

        let entry = self.cache.store(
            &Method::GET,
            path,
            query,
            payload.clone(),
            parts.headers.get(header::CONTENT_TYPE).cloned(),
        );
        debug!(key = %entry.key, "Cached response");

        parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
        parts.headers.insert(header::CACHE_CONTROL, self.cache_control());
        rebuild(parts, payload)
    }

    fn declared_too_large(&self, response: &Response) -> bool {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .is_some_and(|len| len > self.max_body_bytes)
    }
}

enum Buffered {
    Complete(Bytes),
    /// More than the limit arrived; the body replays what was read, then the rest.
    Overflow(Body),
    Failed(axum::Error),
}

/// Reads `body` into memory unless it grows past `limit` bytes.
async fn buffer_up_to(body: Body, limit: usize) -> Buffered {
    let mut chunks = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                buf.extend_from_slice(&chunk);
                if buf.len() > limit {
                    let head =
                        stream::once(async move { Ok::<_, axum::Error>(Bytes::from(buf)) });
                    return Buffered::Overflow(Body::from_stream(head.chain(chunks)));
                }
            }
            Err(e) => return Buffered::Failed(e),
        }
    }
    Buffered::Complete(Bytes::from(buf))
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn is_streaming(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"))
}

fn rebuild(mut parts: Parts, body: Bytes) -> Response {
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

pub async fn response_cache(
    State(caching): State<ResponseCaching>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !caching.applies_to(&req) {
        return next.run(req).await;
    }

    let Some(query) = QueryParams::from_uri(req.uri()) else {
        debug!(uri = %req.uri(), "Undecodable query string, bypassing cache");
        return next.run(req).await;
    };
    let path = req.uri().path().to_owned();

    if let Some(entry) = caching.cache.lookup(&Method::GET, &path, &query) {
        debug!(key = %entry.key, "Cache hit");
        return caching.hit(entry);
    }

    let response = next.run(req).await;
    if response.status() != StatusCode::OK {
        return response;
    }
    caching.memoize(&path, &query, response).await
}
