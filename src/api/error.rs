//! JSON error envelope for rejected requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::auth::AuthError;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
}

/// `{"error":{"message":..,"status_code":..}}`
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(status: StatusCode, message: &str) -> Self {
        Self {
            error: ErrorBody {
                message: message.to_string(),
                status_code: status.as_u16(),
            },
        }
    }
}

impl AuthError {
    /// Status and client-facing message for this rejection.
    #[must_use]
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MissingCredentials => (StatusCode::UNAUTHORIZED, "Missing Credentials"),
            Self::InvalidCredentials | Self::InvalidSession => (
                StatusCode::UNAUTHORIZED,
                "Invalid Username/Email or Password",
            ),
            Self::SecondFactorRequired => (
                StatusCode::UNAUTHORIZED,
                "Requires Two-Factor Authentication",
            ),
            Self::SessionCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create auth cookie",
            ),
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!("Request failed: {self}");
        } else {
            debug!("Request rejected: {self}");
        }
        let (status, message) = self.status_and_message();
        (status, Json(ErrorResponse::new(status, message))).into_response()
    }
}
