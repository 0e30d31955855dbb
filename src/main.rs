use std::net::SocketAddr;
use std::sync::Arc;

use storefront::{
    AppState,
    cache::spawn_sweeper,
    clock::{Clock, SystemClock},
    config::Config,
    router::{Stages, create_router},
    routes::contact::notifier_from_config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        cache_enabled = config.cache_enabled,
        cache_ttl_ms = config.cache_ttl_ms,
        key_mode = %config.cache_key_mode,
        rate_limit_interval_ms = config.rate_limit_interval_ms,
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stages = Stages::from_config(&config, clock);
    let sweeper = spawn_sweeper(stages.sweepables(), config.sweep_interval());

    let notifier = notifier_from_config(&config).expect("Failed to set up contact notifications");
    let state = AppState::new(config.clone(), notifier);
    let app = create_router(state, &stages);

    let addr = SocketAddr::new(config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");

    sweeper.abort();
}
