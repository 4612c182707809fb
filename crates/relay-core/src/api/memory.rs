//! In-process forwarder for tests and local development.
//!
//! Behaves like the deployed contract: `execute` succeeds only for a valid
//! signature over the current nonce and consumes that nonce atomically.
//! Knobs let tests force reverts, failed inner calls, stalled receipts and
//! estimation failures.

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use super::forwarder::{ExecutionReceipt, Forwarder};
use crate::signing::{typed_data_hash, verify, DomainDescriptor, SignedRequest};
use crate::{Error, Result};

const DEFAULT_GAS_ESTIMATE: u64 = 90_000;

/// Forwarder state held in memory.
pub struct MemoryForwarder {
    domain: DomainDescriptor,
    relayer: Address,
    latency: Duration,
    nonces: DashMap<Address, U256>,
    receipts: DashMap<B256, ExecutionReceipt>,
    revert_reasons: DashMap<Address, String>,
    inner_failures: DashMap<Address, String>,
    block_number: AtomicU64,
    gas_estimate: AtomicU64,
    relayer_balance: RwLock<U256>,
    estimation_failure: RwLock<Option<String>>,
    stall_receipts: AtomicBool,
    reject_verify: AtomicBool,
    nonce_reads: AtomicUsize,
    verify_calls: AtomicUsize,
    submissions: AtomicUsize,
}

impl MemoryForwarder {
    pub fn new(domain: DomainDescriptor) -> Self {
        Self {
            domain,
            relayer: Address::repeat_byte(0x5e),
            latency: Duration::ZERO,
            nonces: DashMap::new(),
            receipts: DashMap::new(),
            revert_reasons: DashMap::new(),
            inner_failures: DashMap::new(),
            block_number: AtomicU64::new(1),
            gas_estimate: AtomicU64::new(DEFAULT_GAS_ESTIMATE),
            relayer_balance: RwLock::new(U256::from(10u128.pow(18))),
            estimation_failure: RwLock::new(None),
            stall_receipts: AtomicBool::new(false),
            reject_verify: AtomicBool::new(false),
            nonce_reads: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Delay applied to every chain read and to submission.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    pub fn nonce(&self, signer: Address) -> U256 {
        self.nonces.get(&signer).map(|n| *n).unwrap_or(U256::ZERO)
    }

    pub fn set_nonce(&self, signer: Address, nonce: U256) {
        self.nonces.insert(signer, nonce);
    }

    /// Make every mined `execute` targeting `target` revert with `reason`.
    /// Dry runs still pass, as when state changes between simulation and
    /// inclusion.
    pub fn revert_calls_to(&self, target: Address, reason: impl Into<String>) {
        self.revert_reasons.insert(target, reason.into());
    }

    /// Make calls to `target` fail inside `execute`, which still returns
    /// `(false, reason)` and consumes the nonce with a successful receipt.
    pub fn fail_inner_calls_to(&self, target: Address, reason: impl Into<String>) {
        self.inner_failures.insert(target, reason.into());
    }

    /// Never produce receipts; `wait_for_receipt` runs into its timeout.
    pub fn stall_receipts(&self, stall: bool) {
        self.stall_receipts.store(stall, Ordering::SeqCst);
    }

    /// Make the contract's `verify` answer `false` regardless of input.
    pub fn reject_verify(&self, reject: bool) {
        self.reject_verify.store(reject, Ordering::SeqCst);
    }

    pub fn fail_estimation(&self, reason: Option<String>) {
        *self
            .estimation_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = reason;
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.gas_estimate.store(gas, Ordering::SeqCst);
    }

    pub fn set_relayer_balance(&self, balance: U256) {
        *self
            .relayer_balance
            .write()
            .unwrap_or_else(PoisonError::into_inner) = balance;
    }

    pub fn nonce_reads(&self) -> usize {
        self.nonce_reads.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn signature_matches(&self, request: &SignedRequest) -> bool {
        let digest = typed_data_hash(self.domain.separator(), request.request().struct_hash());
        verify(&digest, request.signature(), &request.from())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Forwarder for MemoryForwarder {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.domain.chain_id)
    }

    async fn nonce_of(&self, signer: Address) -> Result<U256> {
        self.nonce_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Ok(self.nonce(signer))
    }

    async fn verify(&self, request: &SignedRequest) -> Result<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.reject_verify.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self.signature_matches(request) && self.nonce(request.from()) == request.nonce())
    }

    async fn estimate_execute_gas(&self, _request: &SignedRequest) -> Result<u64> {
        let failure = self
            .estimation_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(message) = failure {
            return Err(Error::Rpc {
                code: 3,
                message,
                data: None,
            });
        }
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    async fn simulate_execute(&self, request: &SignedRequest) -> Result<Option<String>> {
        self.simulate_latency().await;
        if !self.signature_matches(request) || self.nonce(request.from()) != request.nonce() {
            return Ok(Some("signature does not match request".to_string()));
        }
        Ok(self
            .inner_failures
            .get(&request.request().to)
            .map(|reason| reason.clone()))
    }

    async fn submit_execute(&self, request: &SignedRequest, gas_limit: u64) -> Result<B256> {
        let sequence = self.submissions.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst);
        let signature_ok = self.signature_matches(request);
        let target_reverts = self.revert_reasons.contains_key(&request.request().to);

        let success = {
            let mut current = self.nonces.entry(request.from()).or_insert(U256::ZERO);
            let ok = signature_ok && !target_reverts && *current == request.nonce();
            if ok {
                *current += U256::from(1u64);
            }
            ok
        };

        let tx_hash = keccak256(
            [
                request.from().as_slice(),
                &request.nonce().to_be_bytes::<32>(),
                &(sequence as u64).to_be_bytes(),
            ]
            .concat(),
        );

        self.receipts.insert(
            tx_hash,
            ExecutionReceipt {
                tx_hash,
                block_number,
                gas_used: self.gas_estimate.load(Ordering::SeqCst).min(gas_limit),
                success,
            },
        );

        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ExecutionReceipt> {
        if self.stall_receipts.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout {
                operation: "transaction receipt",
                secs: timeout.as_secs(),
            });
        }

        self.receipts
            .get(&tx_hash)
            .map(|r| r.clone())
            .ok_or_else(|| Error::Forwarder {
                message: format!("unknown transaction {}", tx_hash),
            })
    }

    async fn revert_reason(&self, request: &SignedRequest, _block_number: u64) -> Result<Option<String>> {
        if let Some(reason) = self.revert_reasons.get(&request.request().to) {
            return Ok(Some(reason.clone()));
        }
        if !self.signature_matches(request) {
            return Ok(Some("signature does not match request".to_string()));
        }
        Ok(None)
    }

    fn relayer_address(&self) -> Address {
        self.relayer
    }

    async fn relayer_balance(&self) -> Result<U256> {
        Ok(*self
            .relayer_balance
            .read()
            .unwrap_or_else(PoisonError::into_inner))
    }
}
