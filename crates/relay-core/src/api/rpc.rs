//! Ethereum JSON-RPC client.
//!
//! Thin typed wrappers over the handful of `eth_*` methods the relayer
//! needs. Read-only methods retry transient failures with exponential
//! backoff; `eth_sendRawTransaction` is attempted exactly once.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::RetryPolicy;
use crate::{Error, Result};

/// Block selector for state reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    fn as_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Pending => "pending".to_string(),
            BlockTag::Number(n) => format!("0x{:x}", n),
        }
    }
}

/// JSON-RPC client for one endpoint.
pub struct JsonRpcClient {
    rpc_url: String,
    http_client: reqwest::Client,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client; `timeout` bounds every individual HTTP round trip.
    #[allow(clippy::result_large_err)]
    pub fn new(rpc_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            http_client,
            retry,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Chain id of the connected node.
    pub async fn chain_id(&self) -> Result<u64> {
        let hex: String = self
            .request_with_retry("eth_chainId", serde_json::json!([]))
            .await?;
        parse_u64(&hex)
    }

    /// Current legacy gas price, in wei.
    pub async fn gas_price(&self) -> Result<u128> {
        let hex: String = self
            .request_with_retry("eth_gasPrice", serde_json::json!([]))
            .await?;
        let price = parse_quantity(&hex)?;
        u128::try_from(price).map_err(|_| Error::Transport {
            message: format!("gas price {} out of range", price),
            status: None,
        })
    }

    /// Account transaction count at `block`.
    pub async fn transaction_count(&self, address: Address, block: BlockTag) -> Result<u64> {
        let hex: String = self
            .request_with_retry(
                "eth_getTransactionCount",
                serde_json::json!([address, block.as_param()]),
            )
            .await?;
        parse_u64(&hex)
    }

    /// Native balance of `address`, in wei.
    pub async fn balance(&self, address: Address) -> Result<U256> {
        let hex: String = self
            .request_with_retry(
                "eth_getBalance",
                serde_json::json!([address, BlockTag::Latest.as_param()]),
            )
            .await?;
        parse_quantity(&hex)
    }

    /// Execute a read-only call and return its output.
    pub async fn call(
        &self,
        from: Option<Address>,
        to: Address,
        data: &Bytes,
        block: BlockTag,
    ) -> Result<Bytes> {
        let params = serde_json::json!([CallRequest::new(from, to, data, U256::ZERO), block.as_param()]);
        let output: Bytes = self.request_with_retry("eth_call", params).await?;
        Ok(output)
    }

    /// Estimate gas for a call.
    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &Bytes,
        value: U256,
    ) -> Result<u64> {
        let params = serde_json::json!([CallRequest::new(Some(from), to, data, value)]);
        let hex: String = self.request_with_retry("eth_estimateGas", params).await?;
        parse_u64(&hex)
    }

    /// Broadcast a signed raw transaction. Never retried.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let raw_hex = format!("0x{}", hex::encode(raw));
        self.request("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await?
            .ok_or_else(|| Error::Transport {
                message: "eth_sendRawTransaction returned no hash".to_string(),
                status: None,
            })
    }

    /// Receipt of a mined transaction, or `None` while it is pending.
    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let mut attempt = 0;
        loop {
            match self
                .request::<TransactionReceipt>("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await
            {
                Ok(receipt) => return Ok(receipt),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    self.back_off("eth_getTransactionReceipt", attempt, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Call a method that must return a non-null result, retrying transient
    /// transport failures.
    async fn request_with_retry<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.request::<T>(method, params.clone()).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {
                    return Err(Error::Transport {
                        message: format!("{} returned no result", method),
                        status: None,
                    })
                }
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    self.back_off(method, attempt, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn back_off(&self, method: &str, attempt: u32, error: &Error) {
        let delay = self.retry.delay_for(attempt);
        warn!(
            method = method,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient RPC failure, backing off"
        );
        tokio::time::sleep(delay).await;
    }

    /// Single JSON-RPC round trip. A JSON `null` result maps to `None`.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(method = method, id = request.id, "RPC request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Transport {
                message: format!("RPC request failed: {}", response.status()),
                status: Some(response.status().as_u16()),
            });
        }

        let body: JsonRpcResponse<T> = response.json().await?;

        if let Some(error) = body.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
                data: error.data.map(|d| match d {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
            });
        }

        Ok(body.result)
    }
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("rpc_url", &self.rpc_url)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: &'a Bytes,
    #[serde(skip_serializing_if = "U256::is_zero")]
    value: U256,
}

impl<'a> CallRequest<'a> {
    fn new(from: Option<Address>, to: Address, data: &'a Bytes, value: U256) -> Self {
        Self {
            from,
            to,
            data,
            value,
        }
    }
}

/// The subset of a transaction receipt the relayer reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: String,
    pub gas_used: String,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("0x01"))
    }

    #[allow(clippy::result_large_err)]
    pub fn block_number(&self) -> Result<u64> {
        parse_u64(&self.block_number)
    }

    #[allow(clippy::result_large_err)]
    pub fn gas_used(&self) -> Result<u64> {
        parse_u64(&self.gas_used)
    }
}

/// Parse a `0x`-prefixed hex quantity.
#[allow(clippy::result_large_err)]
pub fn parse_quantity(hex: &str) -> Result<U256> {
    let digits = hex.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| Error::Transport {
        message: format!("Failed to parse quantity {:?}: {}", hex, e),
        status: None,
    })
}

#[allow(clippy::result_large_err)]
fn parse_u64(hex: &str) -> Result<u64> {
    let value = parse_quantity(hex)?;
    u64::try_from(value).map_err(|_| Error::Transport {
        message: format!("quantity {} does not fit in u64", value),
        status: None,
    })
}
