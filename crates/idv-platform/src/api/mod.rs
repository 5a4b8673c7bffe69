//! API Layer
//!
//! HTTP endpoints for provider event delivery and session creation.

pub mod common;
pub mod sessions;
pub mod webhook;

use std::sync::Arc;

use axum::{routing::post, Router};

use crate::provider::IdentityProvider;
use crate::service::VerificationEventProcessor;

pub use common::{ApiError, WebhookAck, IDENTITY_MISMATCH};
pub use sessions::{CreateSessionRequest, CreateSessionResponse, DEFAULT_USER_ID};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<VerificationEventProcessor>,
    pub provider: Arc<dyn IdentityProvider>,
}

/// Build the public router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook::receive_event))
        .route("/create-verification-session", post(sessions::create_session))
        .with_state(state)
}
