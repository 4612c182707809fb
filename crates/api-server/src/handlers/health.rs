//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Relay counters since startup.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelayCounters {
    pub received: u64,
    pub executed: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relays: Option<RelayCounters>,
    /// Chain the forwarder is reached on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Relayer gas balance in wei, as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relayer_balance: Option<String>,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.orchestrator.stats();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_secs: Some((Utc::now() - state.started_at).num_seconds()),
        relays: Some(RelayCounters {
            received: stats.received,
            executed: stats.executed,
            rejected: stats.rejected,
            failed: stats.failed,
        }),
        chain_id: None,
        relayer_balance: None,
    })
}

/// Readiness check endpoint (RPC reachable, chain matches the domain, relayer funded).
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = crate::error::ErrorResponse)
    )
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let forwarder = state.orchestrator.forwarder();
    let expected_chain = state.orchestrator.domain().chain_id;

    let chain_id = forwarder.chain_id().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness: chain id unavailable");
        ApiError::ServiceUnavailable(format!("RPC unreachable: {}", e))
    })?;

    if chain_id != expected_chain {
        tracing::warn!(chain_id, expected_chain, "Readiness: chain id mismatch");
        return Err(ApiError::ServiceUnavailable(format!(
            "RPC reports chain {} but the domain is bound to chain {}",
            chain_id, expected_chain
        )));
    }

    let balance = forwarder.relayer_balance().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness: relayer balance unavailable");
        ApiError::ServiceUnavailable(format!("RPC unreachable: {}", e))
    })?;

    if balance < state.min_relayer_balance {
        tracing::warn!(
            relayer = %forwarder.relayer_address(),
            balance = %balance,
            minimum = %state.min_relayer_balance,
            "Readiness: relayer balance below minimum"
        );
        return Err(ApiError::ServiceUnavailable(format!(
            "relayer balance {} wei is below the minimum of {} wei",
            balance, state.min_relayer_balance
        )));
    }

    Ok(Json(HealthResponse {
        status: "ready".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_secs: None,
        relays: None,
        chain_id: Some(chain_id),
        relayer_balance: Some(balance.to_string()),
    }))
}
