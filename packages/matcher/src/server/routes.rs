//! Thin JSON glue between HTTP and the matching service. No business logic
//! lives here; handlers validate shape, call the service and map errors.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::common::{DispatchError, NeedId, ResponderId};
use crate::kernel::registry::ResponderDelta;
use crate::kernel::service::{NeedSubmission, ResponderRegistration};

use super::app::AxumAppState;

/// HTTP wrapper around `DispatchError` with status mapping.
pub struct ApiError(DispatchError);

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DispatchError::InvalidCoordinates { .. }
            | DispatchError::UnknownCapability(_)
            | DispatchError::InvalidHeadcount
            | DispatchError::InvalidCapacity => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::UnknownNeed(_) | DispatchError::UnknownResponder(_) => {
                StatusCode::NOT_FOUND
            }
            DispatchError::DuplicateResponder(_) | DispatchError::NoActiveAssignment(_) => {
                StatusCode::CONFLICT
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn submit_need_handler(
    State(state): State<AxumAppState>,
    Json(submission): Json<NeedSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let need = state.service.on_need_created(submission).await?;
    Ok((StatusCode::CREATED, Json(need)))
}

pub async fn cancel_need_handler(
    State(state): State<AxumAppState>,
    Path(need_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .on_need_cancelled(NeedId::from_uuid(need_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn fulfill_need_handler(
    State(state): State<AxumAppState>,
    Path(need_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .on_need_fulfilled(NeedId::from_uuid(need_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn register_responder_handler(
    State(state): State<AxumAppState>,
    Json(registration): Json<ResponderRegistration>,
) -> Result<impl IntoResponse, ApiError> {
    let responder = state.service.on_responder_registered(registration).await?;
    Ok((StatusCode::CREATED, Json(responder)))
}

pub async fn update_responder_handler(
    State(state): State<AxumAppState>,
    Path(responder_id): Path<Uuid>,
    Json(delta): Json<ResponderDelta>,
) -> Result<impl IntoResponse, ApiError> {
    let responder = state
        .service
        .on_responder_status_changed(ResponderId::from_uuid(responder_id), delta)
        .await?;
    Ok(Json(responder))
}

pub async fn confirm_assignment_handler(
    State(state): State<AxumAppState>,
    Path(need_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = state
        .service
        .confirm_assignment(NeedId::from_uuid(need_id))
        .await?;
    Ok(Json(assignment))
}

pub async fn get_assignment_handler(
    State(state): State<AxumAppState>,
    Path(need_id): Path<Uuid>,
) -> Response {
    match state.service.get_assignment(&NeedId::from_uuid(need_id)) {
        Some(assignment) => Json(assignment).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no assignment for need" })),
        )
            .into_response(),
    }
}

pub async fn unmatched_needs_handler(State(state): State<AxumAppState>) -> impl IntoResponse {
    Json(state.service.unmatched_needs())
}
