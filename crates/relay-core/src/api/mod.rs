//! Clients for the chain and the forwarder contract.

pub mod forwarder;
pub mod memory;
pub mod rpc;

use std::time::Duration;

pub use forwarder::{ExecutionReceipt, Forwarder, RpcForwarder};
pub use memory::MemoryForwarder;
pub use rpc::{BlockTag, JsonRpcClient, TransactionReceipt};

#[cfg(any(test, feature = "mock"))]
pub use forwarder::MockForwarder;

/// Retry policy for read-only RPC calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`: 500ms, 1s, 2s, ... capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}
