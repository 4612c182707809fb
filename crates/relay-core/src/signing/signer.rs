//! Forward request signing.
//!
//! Signs forward requests with EIP-712 typed data on behalf of the user who
//! wants a call relayed. The relayer itself never holds user keys; this is
//! used by clients, tooling and tests.

use alloy_primitives::{Address, Bytes, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

use super::domain::DomainDescriptor;
use super::forward_request::{digest, ForwardRequest, SignedRequest, DEFAULT_MAX_DATA_BYTES};

/// Default gas budget for an inner token call.
pub const DEFAULT_INNER_GAS: u64 = 200_000;

/// Default validity window of a signed request (one hour).
pub const DEFAULT_VALIDITY_SECS: u64 = 3600;

/// Forward request signer bound to one forwarder domain.
#[derive(Clone)]
pub struct ForwardRequestSigner {
    signer: PrivateKeySigner,
    domain: DomainDescriptor,
}

impl ForwardRequestSigner {
    pub fn new(signer: PrivateKeySigner, domain: DomainDescriptor) -> Self {
        Self { signer, domain }
    }

    /// Get the signer's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn domain(&self) -> &DomainDescriptor {
        &self.domain
    }

    /// Build a request from this signer with the default gas budget and a
    /// validity window starting at `now`.
    pub fn request(&self, to: Address, data: Bytes, nonce: U256, now: u64) -> ForwardRequest {
        ForwardRequest {
            from: self.address(),
            to,
            value: U256::ZERO,
            gas: U256::from(DEFAULT_INNER_GAS),
            nonce,
            data,
            valid_until: U256::from(now + DEFAULT_VALIDITY_SECS),
        }
    }

    /// Sign a request and return the immutable signed pair.
    pub async fn sign(&self, request: ForwardRequest) -> Result<SignedRequest> {
        let digest = digest(&self.domain, &request, DEFAULT_MAX_DATA_BYTES)
            .context("Failed to compute request digest")?;

        let signature = self
            .signer
            .sign_hash(&digest)
            .await
            .context("Failed to sign forward request")?;

        Ok(SignedRequest::new(
            request,
            Bytes::from(signature.as_bytes().to_vec()),
        ))
    }
}

impl std::fmt::Debug for ForwardRequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardRequestSigner")
            .field("address", &format!("{:?}", self.address()))
            .field("domain", &self.domain.name)
            .field("chain_id", &self.domain.chain_id)
            .finish()
    }
}
