//! Configuration management for the relayer.
//!
//! Values are layered: built-in defaults, an optional `relayer.toml`, the
//! `RELAYER_*` environment and finally the legacy unprefixed variable names
//! (`FORWARDER_CONTRACT_ADDRESS`, `RPC_URL`) used by earlier deployments.

use crate::api::RetryPolicy;
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default EIP-712 domain name of the forwarder contract.
pub const DEFAULT_DOMAIN_NAME: &str = "GaslessForwarder";

/// Default EIP-712 domain version of the forwarder contract.
pub const DEFAULT_DOMAIN_VERSION: &str = "1";

/// Relayer configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint of the target chain.
    pub rpc_url: String,
    /// Hex private key of the gas-paying relayer account.
    pub private_key: String,
    /// Forwarder contract address; also the EIP-712 verifying contract.
    pub forwarder_address: Address,
    /// Chain id; discovered with `eth_chainId` when absent.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default = "default_domain_version")]
    pub domain_version: String,
    /// Safety factor applied to the gas estimate of the forwarding call.
    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: u64,
    /// Hard ceiling for the relayer transaction gas limit.
    #[serde(default)]
    pub max_gas_limit: Option<u64>,
    /// Largest accepted inner call-data payload, in bytes.
    #[serde(default = "default_max_data_bytes")]
    pub max_data_bytes: usize,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_domain_name() -> String {
    DEFAULT_DOMAIN_NAME.to_string()
}

fn default_domain_version() -> String {
    DEFAULT_DOMAIN_VERSION.to_string()
}

fn default_gas_multiplier() -> u64 {
    2
}

fn default_max_data_bytes() -> usize {
    64 * 1024
}

fn default_rpc_timeout_secs() -> u64 {
    15
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_receipt_poll_interval_ms() -> u64 {
    2000
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    4000
}

impl Config {
    /// Load configuration from `relayer.toml` (optional) and the environment.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("relayer").required(false))
            .add_source(config::Environment::with_prefix("RELAYER").try_parsing(true))
            .set_override_option("forwarder_address", env::var("FORWARDER_CONTRACT_ADDRESS").ok())?
            .set_override_option("rpc_url", env::var("RPC_URL").ok())?;

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the relayer unsafe to run.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(Error::Config {
                message: "rpc_url must not be empty".to_string(),
            });
        }
        if self.forwarder_address == Address::ZERO {
            return Err(Error::Config {
                message: "forwarder_address must not be the zero address".to_string(),
            });
        }
        if self.gas_multiplier == 0 {
            return Err(Error::Config {
                message: "gas_multiplier must be at least 1".to_string(),
            });
        }
        if self.retry_max_attempts == 0 {
            return Err(Error::Config {
                message: "retry_max_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// Configuration for tests: local node, well-known dev key.
    pub fn test_config() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .to_string(),
            forwarder_address: Address::repeat_byte(0xf0),
            chain_id: Some(31337),
            domain_name: default_domain_name(),
            domain_version: default_domain_version(),
            gas_multiplier: default_gas_multiplier(),
            max_gas_limit: None,
            max_data_bytes: default_max_data_bytes(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private key in debug output
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("forwarder_address", &self.forwarder_address)
            .field("chain_id", &self.chain_id)
            .field("domain_name", &self.domain_name)
            .field("domain_version", &self.domain_version)
            .field("gas_multiplier", &self.gas_multiplier)
            .field("max_gas_limit", &self.max_gas_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::test_config();
        assert_eq!(config.domain_name, "GaslessForwarder");
        assert_eq!(config.domain_version, "1");
        assert_eq!(config.gas_multiplier, 2);
        assert_eq!(config.max_data_bytes, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_forwarder() {
        let mut config = Config::test_config();
        config.forwarder_address = Address::ZERO;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_multiplier() {
        let mut config = Config::test_config();
        config.gas_multiplier = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_does_not_expose_key() {
        let config = Config::test_config();
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("forwarder_address"));
        assert!(!debug_str.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config::test_config();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }
}
