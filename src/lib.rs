use std::sync::Arc;

use crate::config::Config;
use crate::routes::contact::ContactNotifier;

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notifier: Arc<dyn ContactNotifier>,
}

impl AppState {
    pub fn new(config: Config, notifier: Arc<dyn ContactNotifier>) -> Self {
        Self {
            config: Arc::new(config),
            notifier,
        }
    }
}
