//! Application state shared across handlers.

use alloy_primitives::U256;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use relay_core::api::RpcForwarder;
use relay_core::signing::DomainDescriptor;
use relay_core::Config;
use relay_engine::{RelayContext, RelayOrchestrator, RelaySettings};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Relay engine bound to one forwarder deployment.
    pub orchestrator: Arc<RelayOrchestrator>,
    /// Process start time.
    pub started_at: DateTime<Utc>,
    /// Relayer balance below which `/ready` reports not ready.
    pub min_relayer_balance: U256,
}

impl AppState {
    pub fn new(orchestrator: Arc<RelayOrchestrator>, min_relayer_balance: U256) -> Self {
        Self {
            orchestrator,
            started_at: Utc::now(),
            min_relayer_balance,
        }
    }

    /// Connect to the chain and build the relay engine.
    pub async fn from_config(config: &Config, min_relayer_balance: U256) -> anyhow::Result<Self> {
        let forwarder = RpcForwarder::connect(config)
            .await
            .context("Failed to connect to forwarder RPC")?;

        let domain = DomainDescriptor::from_config(config, forwarder.signing_chain_id());
        tracing::info!(
            chain_id = domain.chain_id,
            forwarder = %domain.verifying_contract,
            relayer = %relay_core::api::Forwarder::relayer_address(&forwarder),
            domain_name = %domain.name,
            "Relay engine configured"
        );

        let context = RelayContext::new(
            domain,
            Arc::new(forwarder),
            RelaySettings::from_config(config),
        );

        Ok(Self::new(
            Arc::new(RelayOrchestrator::new(context)),
            min_relayer_balance,
        ))
    }
}
