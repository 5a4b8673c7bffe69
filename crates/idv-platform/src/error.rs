//! Platform Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::api::common::ApiError;
use crate::domain::AgeError;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Invalid signature: {message}")]
    InvalidSignature { message: String },

    #[error("Invalid event: {message}")]
    InvalidEvent { message: String },

    #[error("Incomplete document: {message}")]
    IncompleteDocument { message: String },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Identity provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    #[error("User store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature { message: message.into() }
    }

    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent { message: message.into() }
    }

    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        Self::UserNotFound { user_id: user_id.into() }
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable { message: message.into() }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Stable label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::InvalidEvent { .. } => "invalid_event",
            Self::IncompleteDocument { .. } => "incomplete_document",
            Self::UserNotFound { .. } => "user_not_found",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Configuration { .. } => "configuration",
            Self::Internal { .. } => "internal",
        }
    }

    /// Transient infrastructure failures; the provider should redeliver
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::StoreUnavailable { .. } | Self::Internal { .. }
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSignature { .. } | Self::InvalidEvent { .. } => StatusCode::BAD_REQUEST,
            Self::IncompleteDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UserNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ProviderUnavailable { .. }
            | Self::StoreUnavailable { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSignature { .. } => "INVALID_SIGNATURE",
            Self::InvalidEvent { .. } => "INVALID_EVENT",
            Self::IncompleteDocument { .. } => "INCOMPLETE_DOCUMENT",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::Configuration { .. } | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Server-side failures never echo upstream details to the caller
    fn public_message(&self) -> String {
        match self {
            Self::ProviderUnavailable { .. } => "Identity provider unavailable".to_string(),
            Self::StoreUnavailable { .. } => "User store unavailable".to_string(),
            Self::Configuration { .. } | Self::Internal { .. } => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<mongodb::error::Error> for PlatformError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::StoreUnavailable { message: err.to_string() }
    }
}

impl From<AgeError> for PlatformError {
    fn from(err: AgeError) -> Self {
        Self::IncompleteDocument { message: err.to_string() }
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "Request failed");
        }
        let body = ApiError {
            error: self.error_code().to_string(),
            message: self.public_message(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
