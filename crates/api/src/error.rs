//! HTTP error mapping for the manual trigger API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quorum_domain::QuorumError;

/// Wrapper giving domain errors an HTTP shape.
pub struct ApiError(pub QuorumError);

impl From<QuorumError> for ApiError {
    fn from(err: QuorumError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            QuorumError::NotFound(_) => StatusCode::NOT_FOUND,
            QuorumError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            QuorumError::NotConnected(_) => StatusCode::CONFLICT,
            QuorumError::Auth(_) | QuorumError::AuthExpired(_) => StatusCode::UNAUTHORIZED,
            QuorumError::Provider(_) | QuorumError::Network(_) => StatusCode::BAD_GATEWAY,
            QuorumError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            QuorumError::CursorInvalid
            | QuorumError::Database(_)
            | QuorumError::Config(_)
            | QuorumError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self.0)).into_response()
    }
}
