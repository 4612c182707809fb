//! API error types and handling.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::guard::RejectReason;
use relay_engine::{FailureKind, SubmissionFailure};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Error code for programmatic handling.
    pub code: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid JSON: {0}")]
    JsonRejection(String),

    /// The relay refused the request before submission.
    #[error("{0}")]
    Rejected(RejectReason),

    /// The relay failed on chain or at the RPC boundary.
    #[error("{0}")]
    SubmissionFailed(SubmissionFailure),

    #[error("Upstream RPC error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::JsonRejection(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(reason) => match reason {
                RejectReason::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
                RejectReason::InvalidSignature => StatusCode::UNAUTHORIZED,
                RejectReason::Expired { .. } => StatusCode::GONE,
                RejectReason::NonceMismatch { .. }
                | RejectReason::NonceRaceLost { .. }
                | RejectReason::Cancelled => StatusCode::CONFLICT,
                RejectReason::ForwarderRejected => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::SubmissionFailed(failure) => match failure.kind {
                FailureKind::Reverted => StatusCode::INTERNAL_SERVER_ERROR,
                FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureKind::GasEstimation | FailureKind::Rpc => StatusCode::BAD_GATEWAY,
            },
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::JsonRejection(_) => "INVALID_JSON",
            ApiError::Rejected(reason) => reason.code(),
            ApiError::SubmissionFailed(failure) => failure.kind.code(),
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Rejected(reason) => match reason {
                RejectReason::Expired { .. }
                | RejectReason::NonceMismatch { .. }
                | RejectReason::NonceRaceLost { .. } => serde_json::to_value(reason).ok(),
                _ => None,
            },
            ApiError::SubmissionFailed(failure) => serde_json::to_value(failure).ok(),
            _ => None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection, "JSON parsing failed");
        ApiError::JsonRejection(rejection.body_text())
    }
}

impl From<relay_core::Error> for ApiError {
    fn from(error: relay_core::Error) -> Self {
        match error {
            relay_core::Error::Malformed { message } => ApiError::BadRequest(message),
            relay_core::Error::Config { message } => ApiError::Internal(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(
                error_code = self.error_code(),
                error = %self,
                "Request failed"
            );
        }

        let mut body = ErrorResponse::new(self.error_code(), self.to_string());
        if let Some(details) = self.details() {
            body = body.with_details(details);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};

    #[test]
    fn test_rejections_map_to_client_errors() {
        let cases = [
            (
                RejectReason::MalformedRequest {
                    message: "bad".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (RejectReason::InvalidSignature, StatusCode::UNAUTHORIZED),
            (
                RejectReason::Expired {
                    valid_until: U256::from(1u64),
                    now: 2,
                },
                StatusCode::GONE,
            ),
            (
                RejectReason::NonceMismatch {
                    expected: U256::from(6u64),
                    got: U256::from(5u64),
                },
                StatusCode::CONFLICT,
            ),
            (RejectReason::ForwarderRejected, StatusCode::UNPROCESSABLE_ENTITY),
            (RejectReason::Cancelled, StatusCode::CONFLICT),
        ];

        for (reason, status) in cases {
            let error = ApiError::Rejected(reason);
            assert_eq!(error.status_code(), status);
            assert!(error.status_code().is_client_error());
        }
    }

    #[test]
    fn test_submission_failures_map_to_server_errors() {
        let nonce = U256::from(5u64);
        let timeout = ApiError::SubmissionFailed(
            SubmissionFailure::new(FailureKind::Timeout, "no receipt", nonce)
                .with_tx_hash(B256::repeat_byte(0x11)),
        );
        let reverted = ApiError::SubmissionFailed(SubmissionFailure::new(
            FailureKind::Reverted,
            "ERC20: insufficient balance",
            nonce,
        ));

        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.error_code(), "TIMEOUT");
        assert_eq!(reverted.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let details = timeout.details().unwrap();
        assert!(details["txHash"].is_string());
        assert_eq!(details["kind"], "timeout");
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorResponse::new("INVALID_SIGNATURE", "invalid signature");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "invalid signature");
        assert_eq!(json["code"], "INVALID_SIGNATURE");
        assert!(json.get("details").is_none());
    }
}
