//! HTTP error responses for the webhook surface.
//!
//! Deliberately small: a signature rejection is the only error the platform
//! should ever see, because a non-2xx is what makes it retry. Everything
//! else (malformed payloads, unknown targets, dispatch failures) is
//! logged and acknowledged in the handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug)]
pub enum ApiError {
    /// 401 - Timestamp or signature header absent while a secret is set.
    SignatureMissing,
    /// 401 - Header present but the MAC or the replay window check failed.
    SignatureInvalid,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SignatureMissing => StatusCode::UNAUTHORIZED,
            ApiError::SignatureInvalid => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::SignatureMissing => "signature_missing",
            ApiError::SignatureInvalid => "signature_invalid",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::SignatureMissing => {
                "Request is missing the timestamp or signature header."
            }
            ApiError::SignatureInvalid => "Request signature verification failed.",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}
