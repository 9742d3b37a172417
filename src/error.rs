//! Error taxonomy
//!
//! Only admission failures ever reach a client. Everything after a stream is
//! established is handled inside the session (see [`crate::stream::SessionEnd`]),
//! and publish failures are logged and swallowed by the publisher.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a stream request is turned away before it registers with the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("events not available")]
    Unavailable,

    #[error("unauthorized")]
    Unauthorized,
}

impl AdmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AdmissionError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

/// JSON body returned with an admission error
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}
