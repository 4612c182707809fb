//! API route definitions.

use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::handlers::{health, relay, signing};
use crate::state::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gasless Relay API",
        version = "1.0.0",
        description = "Relays EIP-712 signed forward requests through a trusted forwarder"
    ),
    paths(
        health::health_check,
        health::readiness,
        relay::relay,
        signing::get_domain,
        signing::get_nonce,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            health::HealthResponse,
            health::RelayCounters,
            relay::RelayRequest,
            relay::RelayResponse,
            signing::TypedDataTemplate,
            signing::TypedField,
            signing::NonceResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "relay", description = "Gasless execution of signed forward requests"),
        (name = "signing", description = "Helpers for wallets preparing a forward request"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the main router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))

        // Relay endpoints
        .route("/api/relay", post(relay::relay))
        .route("/api/domain", get(signing::get_domain))
        .route("/api/nonce/{address}", get(signing::get_nonce))

        // OpenAPI document
        .route("/api-docs/openapi.json", get(openapi_json))

        // Add state
        .with_state(state)
}
