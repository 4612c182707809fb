//! Relay endpoint.
//!
//! Accepts a signed forward request, runs it through the relay engine and
//! answers once the relayer transaction is confirmed or the relay has failed.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use relay_core::guard::RejectReason;
use relay_core::signing::{parse_hex_bytes, ForwardRequest, ForwardRequestMessage, SignedRequest};
use relay_engine::RelayOutcome;

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestId;
use crate::state::AppState;

/// Relay request body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelayRequest {
    /// Forward request fields exactly as signed. Integers as decimal strings.
    #[schema(value_type = Object)]
    pub message: ForwardRequestMessage,
    /// 65-byte `r || s || v` signature, `0x` hex.
    pub signature: String,
}

/// Relay success response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    /// Hash of the relayer transaction.
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

impl RelayRequest {
    /// Decode the wire form into a typed request.
    ///
    /// Decoding failures are malformed-request rejections.
    pub fn decode(&self) -> Result<SignedRequest, RejectReason> {
        let request = ForwardRequest::try_from(&self.message).map_err(malformed)?;
        let signature = parse_hex_bytes(&self.signature, "signature").map_err(malformed)?;
        Ok(SignedRequest::new(request, signature))
    }
}

fn malformed(error: relay_core::Error) -> RejectReason {
    let message = match error {
        relay_core::Error::Malformed { message } => message,
        other => other.to_string(),
    };
    RejectReason::MalformedRequest { message }
}

/// Relay a signed forward request.
#[utoipa::path(
    post,
    path = "/api/relay",
    tag = "relay",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "Forward request executed", body = RelayResponse),
        (status = 400, description = "Malformed request", body = crate::error::ErrorResponse),
        (status = 401, description = "Signature does not recover to the sender", body = crate::error::ErrorResponse),
        (status = 409, description = "Nonce mismatch or lost race", body = crate::error::ErrorResponse),
        (status = 410, description = "Request expired", body = crate::error::ErrorResponse),
        (status = 422, description = "Forwarder refused the request", body = crate::error::ErrorResponse),
        (status = 500, description = "Execution reverted", body = crate::error::ErrorResponse),
        (status = 502, description = "RPC or gas estimation failure", body = crate::error::ErrorResponse),
        (status = 504, description = "No receipt in time", body = crate::error::ErrorResponse)
    )
)]
pub async fn relay(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> ApiResult<Json<RelayResponse>> {
    let Json(body) = payload?;
    let request_id = request_id.map(|Extension(RequestId(id))| id).unwrap_or_default();

    let signed = body.decode().map_err(|reason| {
        tracing::debug!(request_id = %request_id, %reason, "Relay request malformed");
        ApiError::Rejected(reason)
    })?;

    tracing::info!(
        request_id = %request_id,
        signer = %signed.from(),
        nonce = %signed.nonce(),
        "Relay request accepted"
    );

    // A dropped connection cancels the relay unless it has already been broadcast.
    let (ticket, handle) = state.orchestrator.spawn(signed);
    let guard = ticket.cancel_on_drop();
    let outcome = handle
        .await
        .map_err(|e| ApiError::Internal(format!("relay task failed: {}", e)))?;
    guard.disarm();

    match outcome {
        RelayOutcome::Executed { receipt, .. } => {
            tracing::info!(
                request_id = %request_id,
                tx_hash = %receipt.tx_hash,
                block_number = receipt.block_number,
                "Relay executed"
            );
            Ok(Json(RelayResponse {
                success: true,
                tx_hash: receipt.tx_hash.to_string(),
                block_number: receipt.block_number,
                gas_used: receipt.gas_used,
            }))
        }
        RelayOutcome::Rejected { reason } => Err(ApiError::Rejected(reason)),
        RelayOutcome::SubmissionFailed { failure } => Err(ApiError::SubmissionFailed(failure)),
    }
}
