use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use log::error;
use log::warn;

use crate::service::error::ServiceError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BotError {
    #[error("Missing header `{name}`")]
    MissingHeader { name: &'static str },

    #[error("Request timestamp is outside the accepted window")]
    StaleRequest,

    #[error("Request signature does not match")]
    InvalidSignature,

    #[error("Invalid request payload: {message}")]
    InvalidPayload { message: String },

    #[error("ServiceError: {0}")]
    ServiceError(#[from] ServiceError),
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let status = match &self {
            BotError::MissingHeader { .. }
            | BotError::StaleRequest
            | BotError::InvalidSignature => StatusCode::UNAUTHORIZED,
            BotError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            BotError::ServiceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            warn!("Rejected request: {self}");
        }
        (status, self.to_string()).into_response()
    }
}

impl From<serde_urlencoded::de::Error> for BotError {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        BotError::InvalidPayload {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::InvalidPayload {
            message: e.to_string(),
        }
    }
}
