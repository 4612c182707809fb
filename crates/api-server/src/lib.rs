//! API Server
//!
//! HTTP front of the gasless relayer.
//!
//! # Features
//!
//! - **Relay**: `POST /api/relay` executes a signed forward request and
//!   answers with the relayer transaction receipt
//! - **Wallet helpers**: typed-data template and current signer nonce
//! - **OpenAPI**: generated document at `/api-docs/openapi.json`
//!
//! # Example
//!
//! ```ignore
//! use api_server::{ApiServer, AppState, ServerConfig};
//!
//! let config = ServerConfig::from_env();
//! let state = AppState::from_config(&relay_config, config.min_relayer_balance).await?;
//! ApiServer::new(config, state).run().await?;
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use alloy_primitives::U256;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable CORS for all origins (development only).
    pub cors_permissive: bool,
    /// Origins allowed when `cors_permissive` is off. Empty allows none.
    pub cors_allowed_origins: Vec<String>,
    /// Relayer balance (wei) required for `/ready`.
    pub min_relayer_balance: U256,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_permissive: true,
            cors_allowed_origins: Vec::new(),
            min_relayer_balance: U256::ZERO,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            // PORT first (platform-assigned), then API_PORT, then 3000
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("API_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            cors_permissive: std::env::var("CORS_PERMISSIVE")
                .map(|v| v == "true")
                .unwrap_or(true),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            min_relayer_balance: std::env::var("MIN_RELAYER_BALANCE_WEI")
                .ok()
                .and_then(|v| U256::from_str_radix(v.trim(), 10).ok())
                .unwrap_or(U256::ZERO),
        }
    }

    /// Get the socket address.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }
}

/// The API server.
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Router with every middleware layer applied.
    pub fn router(&self) -> axum::Router {
        let state = Arc::new(self.state.clone());

        create_router(state)
            .layer(
                TraceLayer::new_for_http()
                    .on_request(|request: &Request<_>, _span: &tracing::Span| {
                        tracing::info!(
                            method = %request.method(),
                            uri = %request.uri(),
                            "Incoming request"
                        );
                    })
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG))
                    .on_failure(
                        |error: tower_http::classify::ServerErrorsFailureClass,
                         latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::error!(
                                error = %error,
                                latency_ms = latency.as_millis(),
                                "Request failed"
                            );
                        },
                    ),
            )
            .layer(axum::middleware::from_fn(middleware::inject_request_id))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(self.cors_layer())
    }

    fn cors_layer(&self) -> CorsLayer {
        if self.config.cors_permissive {
            return CorsLayer::permissive();
        }

        let origins: Vec<HeaderValue> = self
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(middleware::REQUEST_ID_HEADER),
            ])
            .expose_headers([HeaderName::from_static(middleware::REQUEST_ID_HEADER)])
    }

    /// Run the server until SIGINT or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();

        let addr = self.config.socket_addr()?;
        info!(
            address = %addr,
            chain_id = self.state.orchestrator.domain().chain_id,
            forwarder = %self.state.orchestrator.domain().verifying_contract,
            "Starting API server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use axum::body::Body;
    use relay_core::api::MemoryForwarder;
    use relay_core::signing::DomainDescriptor;
    use relay_engine::{RelayContext, RelayOrchestrator, RelaySettings};
    use std::time::Duration;
    use tower::ServiceExt;

    fn server() -> ApiServer {
        server_with(ServerConfig::default())
    }

    fn server_with(config: ServerConfig) -> ApiServer {
        let domain = DomainDescriptor::new(31337, Address::repeat_byte(0xf0));
        let settings = RelaySettings {
            gas_multiplier: 2,
            max_gas_limit: None,
            max_data_bytes: 1024,
            rpc_timeout: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(2),
        };
        let context = RelayContext::new(
            domain.clone(),
            Arc::new(MemoryForwarder::new(domain)),
            settings,
        );
        let state = AppState::new(Arc::new(RelayOrchestrator::new(context)), U256::ZERO);
        ApiServer::new(config, state)
    }

    async fn preflight(server: &ApiServer, origin: &str) -> axum::http::Response<Body> {
        server
            .router()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/relay")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_restricted_cors_allows_only_listed_origins() {
        let server = server_with(ServerConfig {
            cors_permissive: false,
            cors_allowed_origins: vec!["https://wallet.example".to_string()],
            ..ServerConfig::default()
        });

        let allowed = preflight(&server, "https://wallet.example").await;
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://wallet.example"))
        );

        let other = preflight(&server, "https://evil.example").await;
        assert!(other.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_permissive_cors_allows_any_origin() {
        let response = preflight(&server(), "https://anywhere.example").await;
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        let bad = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[tokio::test]
    async fn test_router_sets_request_id() {
        let response = server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let body = vec![b'x'; MAX_BODY_BYTES + 1];
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/relay")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
