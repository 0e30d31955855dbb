use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{AppState, error::AppError, utils::success_to_api_response};

use super::model::{ContactRequest, ContactResponse};

#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = req.into_submission()?;
    state.notifier.notify(&submission).await?;

    tracing::info!(id = %submission.id, "Contact submission accepted");
    Ok((
        StatusCode::OK,
        success_to_api_response(ContactResponse {
            id: submission.id,
            received_at: submission.received_at.timestamp(),
        }),
    ))
}
