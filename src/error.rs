use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

/// Startup configuration problems. These abort the process before it binds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} is required")]
    Missing { name: &'static str },
    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
    #[error("{name} must start with '/' and not end with '/': {value:?}")]
    BadPrefix { name: &'static str, value: String },
}

/// Failure reported by a contact notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("notification failed")]
    NotificationFailed(#[from] NotifyError),
    #[error("upstream response failed: {0}")]
    UpstreamFailed(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                msg.clone(),
            ),
            AppError::NotificationFailed(e) => {
                tracing::error!("Contact notification failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    error_codes::NOTIFY_FAILED,
                    "Your message could not be delivered, please try again later".to_string(),
                )
            }
            AppError::UpstreamFailed(reason) => {
                tracing::error!("Upstream response failed: {}", reason);
                (
                    StatusCode::BAD_GATEWAY,
                    error_codes::UPSTREAM_ERROR,
                    "The upstream response could not be read".to_string(),
                )
            }
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}
