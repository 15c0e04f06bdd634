use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::event;
use crate::state::SharedState;

/// Accept one notification envelope and run it through the pipeline.
///
/// Stage failures are reported to the submitter and recorded, so the response
/// is `200` for every event that decodes; only undecodable events get `400`.
pub async fn receive(State(state): State<SharedState>, body: Bytes) -> Result<Response, AppError> {
    let submission = event::parse_envelope(&body).map_err(|e| {
        tracing::warn!("Rejected inbound event: {e}");
        AppError::from(e)
    })?;

    let outcome = state.pipeline.run(&submission).await;

    Ok((StatusCode::OK, Json(outcome)).into_response())
}
