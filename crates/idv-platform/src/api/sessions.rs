//! Verification session creation endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::{ApiError, AppState};

/// User id tagged onto sessions requested without one
pub const DEFAULT_USER_ID: &str = "demo_user";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub url: String,
}

/// Create a hosted verification session and return its URL
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Response {
    let user_id = body
        .and_then(|Json(req)| req.user_id)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

    match state.provider.create_verification_session(&user_id).await {
        Ok(session) => {
            info!(user_id = %user_id, session_id = %session.session_id, "Verification session created");
            Json(CreateSessionResponse { url: session.url }).into_response()
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Verification session creation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: "SESSION_CREATION_FAILED".to_string(),
                    message: "Failed to create verification session".to_string(),
                    details: None,
                }),
            )
                .into_response()
        }
    }
}
