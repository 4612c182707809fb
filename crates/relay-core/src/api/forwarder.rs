//! Forwarder contract collaborator.
//!
//! [`Forwarder`] is the boundary between the relay state machine and the
//! chain. [`RpcForwarder`] reaches a deployed forwarder over JSON-RPC and
//! pays for `execute` with the relayer wallet.

use alloy_consensus::TxLegacy;
use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::rpc::{BlockTag, JsonRpcClient};
use crate::config::Config;
use crate::signing::{ForwardRequest, SignedRequest};
use crate::wallet::RelayerWallet;
use crate::{Error, Result};

mod abi {
    alloy_sol_types::sol! {
        struct ForwardRequest {
            address from;
            address to;
            uint256 value;
            uint256 gas;
            uint256 nonce;
            bytes data;
            uint256 validUntil;
        }

        interface IForwarder {
            function getNonce(address from) external view returns (uint256);
            function verify(ForwardRequest calldata req, bytes calldata signature) external view returns (bool);
            function execute(ForwardRequest calldata req, bytes calldata signature) external payable returns (bool, bytes memory);
        }
    }
}

impl From<&ForwardRequest> for abi::ForwardRequest {
    fn from(request: &ForwardRequest) -> Self {
        Self {
            from: request.from,
            to: request.to,
            value: request.value,
            gas: request.gas,
            nonce: request.nonce,
            data: request.data.clone(),
            validUntil: request.valid_until,
        }
    }
}

/// Calldata for `execute(request, signature)`.
pub fn encode_execute(signed: &SignedRequest) -> Bytes {
    abi::IForwarder::executeCall {
        req: signed.request().into(),
        signature: signed.signature().clone(),
    }
    .abi_encode()
    .into()
}

/// Mined relayer transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// Receipt status; `false` means the relayer transaction reverted.
    pub success: bool,
}

/// The on-chain forwarder as seen by the relayer.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<u64>;

    /// Authoritative nonce of `signer`.
    async fn nonce_of(&self, signer: Address) -> Result<U256>;

    /// The contract's own signature and nonce check.
    async fn verify(&self, request: &SignedRequest) -> Result<bool>;

    /// Gas the relayer transaction is expected to use.
    async fn estimate_execute_gas(&self, request: &SignedRequest) -> Result<u64>;

    /// Dry-run `execute` against the latest state. `Some(reason)` when the
    /// forwarded call would fail, even if `execute` itself would not revert.
    async fn simulate_execute(&self, request: &SignedRequest) -> Result<Option<String>>;

    /// Sign and broadcast `execute` with the given gas limit.
    ///
    /// Implementations bound the broadcast themselves. A send whose outcome is
    /// unknown fails with [`Error::BroadcastUnconfirmed`] carrying the hash.
    async fn submit_execute(&self, request: &SignedRequest, gas_limit: u64) -> Result<B256>;

    /// Wait until `tx_hash` is mined. Fails with [`Error::Timeout`] after `timeout`.
    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ExecutionReceipt>;

    /// Best-effort revert reason, replaying `execute` at `block_number`.
    async fn revert_reason(&self, request: &SignedRequest, block_number: u64) -> Result<Option<String>>;

    /// Address that pays gas for relayed calls.
    fn relayer_address(&self) -> Address;

    /// Native balance of the relayer account.
    async fn relayer_balance(&self) -> Result<U256>;
}

/// Forwarder reached over Ethereum JSON-RPC.
pub struct RpcForwarder {
    rpc: JsonRpcClient,
    forwarder: Address,
    wallet: RelayerWallet,
    chain_id: u64,
    poll_interval: Duration,
    broadcast_timeout: Duration,
    /// Next relayer account nonce; `None` until seeded from the node.
    next_nonce: Mutex<Option<u64>>,
}

/// A relayer nonce taken from the local counter. Dropping it before
/// [`commit`](Self::commit) clears the counter so the next broadcast reseeds
/// from the node's pending count.
struct NonceReservation<'a> {
    slot: &'a Mutex<Option<u64>>,
    nonce: u64,
    committed: bool,
}

impl<'a> NonceReservation<'a> {
    fn new(slot: &'a Mutex<Option<u64>>, nonce: u64) -> Self {
        Self {
            slot,
            nonce,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for NonceReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
            debug!(relayer_nonce = self.nonce, "Relayer nonce released, will reseed");
        }
    }
}

impl RpcForwarder {
    /// Connect using `config`, discovering the chain id when it is not set.
    pub async fn connect(config: &Config) -> Result<Self> {
        let rpc = JsonRpcClient::new(
            config.rpc_url.clone(),
            config.rpc_timeout(),
            config.retry_policy(),
        )?;

        let chain_id = match config.chain_id {
            Some(id) => id,
            None => {
                let id = rpc.chain_id().await?;
                info!(chain_id = id, "Discovered chain id from RPC endpoint");
                id
            }
        };

        let wallet = RelayerWallet::from_private_key(&config.private_key)?.with_chain_id(chain_id);

        info!(
            relayer = %wallet.address(),
            forwarder = %config.forwarder_address,
            chain_id = chain_id,
            "Forwarder client ready"
        );

        Ok(Self {
            rpc,
            forwarder: config.forwarder_address,
            wallet,
            chain_id,
            poll_interval: config.receipt_poll_interval(),
            broadcast_timeout: config.rpc_timeout(),
            next_nonce: Mutex::new(None),
        })
    }

    /// Chain id transactions are signed for.
    pub fn signing_chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn forwarder_address(&self) -> Address {
        self.forwarder
    }

    /// Take the next relayer account nonce, seeding from the pending count.
    async fn allocate_nonce(&self) -> Result<u64> {
        if let Some(nonce) = self.take_local_nonce() {
            return Ok(nonce);
        }

        let seeded = self
            .rpc
            .transaction_count(self.wallet.address(), BlockTag::Pending)
            .await?;

        let mut next = self.next_nonce.lock().unwrap_or_else(PoisonError::into_inner);
        match *next {
            // Another task seeded while we were fetching.
            Some(nonce) => {
                *next = Some(nonce + 1);
                Ok(nonce)
            }
            None => {
                debug!(nonce = seeded, "Seeded relayer nonce");
                *next = Some(seeded + 1);
                Ok(seeded)
            }
        }
    }

    fn take_local_nonce(&self) -> Option<u64> {
        let mut next = self.next_nonce.lock().unwrap_or_else(PoisonError::into_inner);
        let nonce = (*next)?;
        *next = Some(nonce + 1);
        Some(nonce)
    }

    /// `eth_call` of `execute` at `block`; `Some(reason)` when the forwarded
    /// call fails, whether `execute` reverts or returns `(false, data)`.
    async fn replay_execute(&self, request: &SignedRequest, block: BlockTag) -> Result<Option<String>> {
        let data = encode_execute(request);
        match self
            .rpc
            .call(Some(self.wallet.address()), self.forwarder, &data, block)
            .await
        {
            Ok(output) => {
                let ret = abi::IForwarder::executeCall::abi_decode_returns(&output).map_err(|e| {
                    Error::Forwarder {
                        message: format!("Failed to decode execute result: {}", e),
                    }
                })?;
                Ok(inner_failure(ret._0, &ret._1))
            }
            Err(Error::Rpc { data, message, .. }) => {
                let from_data = data
                    .as_deref()
                    .and_then(|d| hex::decode(d.trim_start_matches("0x")).ok())
                    .and_then(|bytes| alloy_sol_types::decode_revert_reason(&bytes));
                Ok(from_data.or(Some(message)))
            }
            Err(e) => Err(e),
        }
    }

    #[allow(clippy::result_large_err)]
    fn sign_legacy(&self, tx: TxLegacy) -> Result<Vec<u8>> {
        use alloy_consensus::transaction::RlpEcdsaEncodableTx;
        use alloy_network::TxSignerSync;
        use alloy_primitives::bytes::BytesMut;

        let mut tx = tx;
        let sig = self
            .wallet
            .signer()
            .sign_transaction_sync(&mut tx)
            .map_err(|e| Error::Signing {
                message: format!("Failed to sign relayer transaction: {}", e),
            })?;

        let mut encoded = BytesMut::new();
        tx.rlp_encode_signed(&sig, &mut encoded);
        Ok(encoded.to_vec())
    }
}

#[async_trait]
impl Forwarder for RpcForwarder {
    async fn chain_id(&self) -> Result<u64> {
        self.rpc.chain_id().await
    }

    async fn nonce_of(&self, signer: Address) -> Result<U256> {
        let data: Bytes = abi::IForwarder::getNonceCall { from: signer }
            .abi_encode()
            .into();
        let output = self
            .rpc
            .call(None, self.forwarder, &data, BlockTag::Latest)
            .await?;

        abi::IForwarder::getNonceCall::abi_decode_returns(&output).map_err(|e| Error::Forwarder {
            message: format!("Failed to decode getNonce result: {}", e),
        })
    }

    async fn verify(&self, request: &SignedRequest) -> Result<bool> {
        let data: Bytes = abi::IForwarder::verifyCall {
            req: request.request().into(),
            signature: request.signature().clone(),
        }
        .abi_encode()
        .into();
        let output = self
            .rpc
            .call(None, self.forwarder, &data, BlockTag::Latest)
            .await?;

        abi::IForwarder::verifyCall::abi_decode_returns(&output).map_err(|e| Error::Forwarder {
            message: format!("Failed to decode verify result: {}", e),
        })
    }

    async fn estimate_execute_gas(&self, request: &SignedRequest) -> Result<u64> {
        self.rpc
            .estimate_gas(
                self.wallet.address(),
                self.forwarder,
                &encode_execute(request),
                request.request().value,
            )
            .await
    }

    async fn simulate_execute(&self, request: &SignedRequest) -> Result<Option<String>> {
        self.replay_execute(request, BlockTag::Latest).await
    }

    async fn submit_execute(&self, request: &SignedRequest, gas_limit: u64) -> Result<B256> {
        let gas_price = self.rpc.gas_price().await?;
        let reservation = NonceReservation::new(&self.next_nonce, self.allocate_nonce().await?);
        let nonce = reservation.nonce;

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(self.forwarder),
            value: request.request().value,
            input: encode_execute(request),
        };

        let raw = self.sign_legacy(tx)?;
        let local_hash = keccak256(&raw);

        let sent = tokio::time::timeout(self.broadcast_timeout, self.rpc.send_raw_transaction(&raw)).await;
        match sent {
            Ok(Ok(tx_hash)) => {
                reservation.commit();
                info!(
                    tx_hash = %tx_hash,
                    relayer_nonce = nonce,
                    gas_limit = gas_limit,
                    gas_price = gas_price,
                    "Relayer transaction broadcast"
                );
                Ok(tx_hash)
            }
            Ok(Err(Error::Rpc { ref message, .. })) if message.contains("already known") => {
                reservation.commit();
                warn!(tx_hash = %local_hash, "Transaction already known to the node");
                Ok(local_hash)
            }
            Ok(Err(Error::Http(e))) if e.is_timeout() => {
                warn!(tx_hash = %local_hash, relayer_nonce = nonce, "Broadcast timed out");
                Err(Error::BroadcastUnconfirmed {
                    tx_hash: local_hash,
                    message: format!("eth_sendRawTransaction timed out: {}", e),
                })
            }
            Ok(Err(e)) => {
                if e.is_nonce_error() {
                    warn!(relayer_nonce = nonce, error = %e, "Relayer nonce rejected, resetting");
                }
                Err(e)
            }
            Err(_) => {
                warn!(tx_hash = %local_hash, relayer_nonce = nonce, "Broadcast timed out");
                Err(Error::BroadcastUnconfirmed {
                    tx_hash: local_hash,
                    message: format!(
                        "eth_sendRawTransaction timed out after {}s",
                        self.broadcast_timeout.as_secs()
                    ),
                })
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ExecutionReceipt> {
        let poll = async {
            loop {
                if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                    return Ok::<_, Error>(ExecutionReceipt {
                        tx_hash,
                        block_number: receipt.block_number()?,
                        gas_used: receipt.gas_used()?,
                        success: receipt.succeeded(),
                    });
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| Error::Timeout {
                operation: "transaction receipt",
                secs: timeout.as_secs(),
            })?
    }

    async fn revert_reason(&self, request: &SignedRequest, block_number: u64) -> Result<Option<String>> {
        self.replay_execute(request, BlockTag::Number(block_number)).await
    }

    fn relayer_address(&self) -> Address {
        self.wallet.address()
    }

    async fn relayer_balance(&self) -> Result<U256> {
        self.rpc.balance(self.wallet.address()).await
    }
}

/// Reason for a failed inner call reported through `execute`'s return values.
fn inner_failure(success: bool, returndata: &[u8]) -> Option<String> {
    if success {
        return None;
    }
    Some(
        alloy_sol_types::decode_revert_reason(returndata)
            .unwrap_or_else(|| "forwarded call failed without a reason".to_string()),
    )
}

impl std::fmt::Debug for RpcForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcForwarder")
            .field("rpc", &self.rpc)
            .field("forwarder", &self.forwarder)
            .field("wallet", &self.wallet)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed() -> SignedRequest {
        SignedRequest::new(
            ForwardRequest {
                from: Address::repeat_byte(0xaa),
                to: Address::repeat_byte(0xbb),
                value: U256::ZERO,
                gas: U256::from(200_000u64),
                nonce: U256::from(3u64),
                data: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]),
                valid_until: U256::from(1_700_003_600u64),
            },
            Bytes::from(vec![0x11; 65]),
        )
    }

    #[test]
    fn test_forwarder_selectors() {
        // Guard against accidental signature drift in the interface.
        assert_eq!(
            abi::IForwarder::getNonceCall::SELECTOR,
            keccak256("getNonce(address)")[..4]
        );
        assert_eq!(
            abi::IForwarder::verifyCall::SIGNATURE,
            "verify((address,address,uint256,uint256,uint256,bytes,uint256),bytes)"
        );
        assert_eq!(
            abi::IForwarder::executeCall::SIGNATURE,
            "execute((address,address,uint256,uint256,uint256,bytes,uint256),bytes)"
        );
    }

    #[test]
    fn test_encode_execute_round_trips() {
        let request = signed();
        let data = encode_execute(&request);

        assert_eq!(&data[..4], abi::IForwarder::executeCall::SELECTOR.as_slice());
        let decoded = abi::IForwarder::executeCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.req.to, request.request().to);
        assert_eq!(decoded.req.nonce, request.nonce());
        assert_eq!(decoded.signature, *request.signature());
    }

    #[tokio::test]
    async fn test_connect_uses_configured_chain_id() {
        let config = Config::test_config();
        let forwarder = RpcForwarder::connect(&config).await.unwrap();

        assert_eq!(forwarder.signing_chain_id(), 31337);
        assert_eq!(forwarder.forwarder_address(), config.forwarder_address);
        assert_eq!(
            forwarder.relayer_address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_relayer_nonce_counter() {
        let forwarder = RpcForwarder::connect(&Config::test_config()).await.unwrap();
        *forwarder.next_nonce.lock().unwrap() = Some(7);

        assert_eq!(forwarder.allocate_nonce().await.unwrap(), 7);
        let committed = NonceReservation::new(&forwarder.next_nonce, 8);
        committed.commit();
        assert_eq!(forwarder.take_local_nonce(), Some(8));

        drop(NonceReservation::new(&forwarder.next_nonce, 9));
        assert!(forwarder.take_local_nonce().is_none());
    }

    /// JSON-RPC endpoint that prices gas but never answers a broadcast.
    async fn stalling_node() -> String {
        use axum::{routing::post, Json, Router};

        async fn handle(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            if body["method"] == "eth_sendRawTransaction" {
                std::future::pending::<()>().await;
            }
            Json(serde_json::json!({"jsonrpc": "2.0", "id": body["id"], "result": "0x3b9aca00"}))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", post(handle)))
                .await
                .unwrap();
        });
        url
    }

    async fn connect_to(rpc_url: String) -> RpcForwarder {
        let mut config = Config::test_config();
        config.rpc_url = rpc_url;
        config.rpc_timeout_secs = 1;
        RpcForwarder::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_stalled_broadcast_reports_hash_and_releases_nonce() {
        let forwarder = connect_to(stalling_node().await).await;
        *forwarder.next_nonce.lock().unwrap() = Some(7);

        let result = forwarder.submit_execute(&signed(), 100_000).await;

        match result {
            Err(Error::BroadcastUnconfirmed { tx_hash, .. }) => assert_ne!(tx_hash, B256::ZERO),
            other => panic!("expected unconfirmed broadcast, got {:?}", other),
        }
        // Nonce 7 may or may not have reached the node; reseed on the next send.
        assert!(forwarder.take_local_nonce().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_broadcast_releases_nonce() {
        let forwarder = connect_to(stalling_node().await).await;
        *forwarder.next_nonce.lock().unwrap() = Some(7);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(300),
            forwarder.submit_execute(&signed(), 100_000),
        )
        .await;

        assert!(abandoned.is_err());
        assert!(forwarder.take_local_nonce().is_none());
    }

    #[test]
    fn test_inner_failure_from_execute_return() {
        use alloy_sol_types::{Revert, SolError};

        let returndata = Revert {
            reason: "ERC20: transfer amount exceeds balance".to_string(),
        }
        .abi_encode();

        assert_eq!(inner_failure(true, &[]), None);
        assert_eq!(
            inner_failure(false, &returndata).as_deref(),
            Some("ERC20: transfer amount exceeds balance")
        );
        assert_eq!(
            inner_failure(false, &[]).as_deref(),
            Some("forwarded call failed without a reason")
        );
    }

    #[tokio::test]
    async fn test_sign_legacy_produces_rlp_list() {
        let forwarder = RpcForwarder::connect(&Config::test_config()).await.unwrap();
        let tx = TxLegacy {
            chain_id: Some(31337),
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: 100_000,
            to: TxKind::Call(forwarder.forwarder_address()),
            value: U256::ZERO,
            input: encode_execute(&signed()),
        };

        let raw = forwarder.sign_legacy(tx).unwrap();
        // Long RLP list prefix.
        assert!(raw[0] >= 0xf8);
    }
}
