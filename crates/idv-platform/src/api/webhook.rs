//! Provider event delivery endpoint

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use tracing::debug;

use crate::api::{AppState, WebhookAck};
use crate::error::PlatformError;
use crate::service::SIGNATURE_HEADER;

/// Receive a signed event.
///
/// The body is taken as raw bytes: the signature covers the exact bytes
/// sent, so it must not be parsed before verification.
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, PlatformError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    debug!(bytes = body.len(), signed = signature.is_some(), "Webhook delivery received");

    let report = state.processor.process(&body, signature).await?;
    Ok(Json(report.into()))
}
