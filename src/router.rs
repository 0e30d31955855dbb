use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::{
    AppState,
    cache::{ResponseCache, Sweep},
    clock::Clock,
    config::Config,
    middleware::{RateLimiter, ResponseCaching, log_errors, rate_limit, response_cache},
    routes,
};

/// Stateful request stages, one set per process.
#[derive(Clone)]
pub struct Stages {
    pub caching: ResponseCaching,
    pub rate_limiter: Arc<RateLimiter>,
    pub contact_limiter: Arc<RateLimiter>,
}

impl Stages {
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(ResponseCache::new(
            config.cache_ttl_ms,
            config.cache_key_mode,
            clock.clone(),
        ));
        Self {
            caching: ResponseCaching::new(cache, config),
            rate_limiter: Arc::new(RateLimiter::general(config, clock.clone())),
            contact_limiter: Arc::new(RateLimiter::contact(config, clock)),
        }
    }

    /// Tables the background sweeper should visit.
    pub fn sweepables(&self) -> Vec<Arc<dyn Sweep>> {
        vec![
            self.caching.cache().clone() as Arc<dyn Sweep>,
            self.rate_limiter.clone() as Arc<dyn Sweep>,
            self.contact_limiter.clone() as Arc<dyn Sweep>,
        ]
    }

    /// Wraps `router` so requests pass the rate limiter, then the cache.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(from_fn_with_state(self.caching.clone(), response_cache))
            .layer(from_fn_with_state(self.rate_limiter.clone(), rate_limit))
    }
}

pub fn create_router(state: AppState, stages: &Stages) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/health", get(routes::health::ping))
        .route(
            "/contact",
            post(routes::contact::submit).route_layer(from_fn_with_state(
                stages.contact_limiter.clone(),
                rate_limit,
            )),
        );

    let mut router = Router::new().nest(&config.api_prefix, api);

    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving SPA from {}", dir);
        let index = Path::new(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    let router = stages.apply(router).layer(from_fn(log_errors));

    let router = if config.compression_enabled {
        router.layer(CompressionLayer::new())
    } else {
        router
    };

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
