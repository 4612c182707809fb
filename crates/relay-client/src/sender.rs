//! Build, sign and relay one token call.

use alloy_primitives::{Address, Bytes, U256};
use anyhow::Context;
use relay_core::api::{BlockTag, JsonRpcClient};
use relay_core::calls::{decode_decimals, TokenCall, DECIMALS_SELECTOR};
use relay_core::signing::{ForwardRequestSigner, SignedRequest};

use crate::client::{RelayClient, RelayReceipt};

/// Overrides for the request a [`TransferSender`] builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Gas for the inner call.
    pub gas: Option<u64>,
    /// Seconds the signature stays valid.
    pub valid_for_secs: Option<u64>,
}

/// Signs token calls for one user and relays them.
pub struct TransferSender {
    client: RelayClient,
    signer: ForwardRequestSigner,
}

impl TransferSender {
    pub fn new(client: RelayClient, signer: ForwardRequestSigner) -> Self {
        Self { client, signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign `call` on `token` with the signer's current forwarder nonce.
    pub async fn prepare(
        &self,
        token: Address,
        call: &TokenCall,
        options: RequestOptions,
    ) -> anyhow::Result<SignedRequest> {
        let nonce = self
            .client
            .nonce(self.address())
            .await
            .context("Failed to fetch forwarder nonce")?;

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let mut request = self.signer.request(token, call.encode(), nonce, now);
        if let Some(gas) = options.gas {
            request.gas = U256::from(gas);
        }
        if let Some(secs) = options.valid_for_secs {
            request.valid_until = U256::from(now.saturating_add(secs));
        }

        self.signer.sign(request).await
    }

    /// Prepare and relay `call`, returning the relayer transaction receipt.
    pub async fn send(
        &self,
        token: Address,
        call: &TokenCall,
        options: RequestOptions,
    ) -> anyhow::Result<RelayReceipt> {
        let signed = self.prepare(token, call, options).await?;
        tracing::info!(
            signer = %signed.from(),
            nonce = %signed.nonce(),
            token = %token,
            "Relaying signed request"
        );

        let receipt = self.client.relay(&signed).await?;
        tracing::info!(tx_hash = %receipt.tx_hash, block_number = receipt.block_number, "Relayed");
        Ok(receipt)
    }
}

/// Read an ERC-20 token's `decimals()`.
pub async fn token_decimals(rpc: &JsonRpcClient, token: Address) -> anyhow::Result<u8> {
    let output = rpc
        .call(None, token, &Bytes::from(DECIMALS_SELECTOR.to_vec()), BlockTag::Latest)
        .await
        .with_context(|| format!("decimals() call to {} failed", token))?;
    Ok(decode_decimals(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use alloy_signer_local::PrivateKeySigner;
    use api_server::{create_router, AppState};
    use relay_core::api::MemoryForwarder;
    use relay_core::signing::DomainDescriptor;
    use relay_engine::{RelayContext, RelayOrchestrator, RelaySettings};
    use std::sync::Arc;
    use std::time::Duration;

    const TOKEN: Address = Address::repeat_byte(0xbb);

    fn domain() -> DomainDescriptor {
        DomainDescriptor::new(31337, Address::repeat_byte(0xf0))
    }

    async fn spawn_relayer(forwarder: Arc<MemoryForwarder>) -> String {
        let settings = RelaySettings {
            gas_multiplier: 2,
            max_gas_limit: None,
            max_data_bytes: 1024,
            rpc_timeout: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(2),
        };
        let context = RelayContext::new(domain(), forwarder, settings);
        let state = AppState::new(Arc::new(RelayOrchestrator::new(context)), U256::ZERO);
        let router = create_router(Arc::new(state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{}", addr)
    }

    async fn sender(url: &str) -> TransferSender {
        let client = RelayClient::new(url, Duration::from_secs(5)).unwrap();
        let domain = client.domain().await.unwrap();
        TransferSender::new(client, ForwardRequestSigner::new(PrivateKeySigner::random(), domain))
    }

    fn transfer() -> TokenCall {
        TokenCall::Transfer {
            to: Address::repeat_byte(0x22),
            amount: U256::from(1_000_000u64),
        }
    }

    #[tokio::test]
    async fn test_send_transfer_executes() {
        let forwarder = Arc::new(MemoryForwarder::new(domain()));
        let url = spawn_relayer(forwarder.clone()).await;
        let sender = sender(&url).await;
        forwarder.set_nonce(sender.address(), U256::from(3u64));

        let receipt = sender
            .send(TOKEN, &transfer(), RequestOptions::default())
            .await
            .unwrap();

        assert!(receipt.success);
        assert!(receipt.tx_hash.starts_with("0x"));
        assert_eq!(forwarder.nonce(sender.address()), U256::from(4u64));
    }

    #[tokio::test]
    async fn test_replayed_request_is_nonce_mismatch() {
        let forwarder = Arc::new(MemoryForwarder::new(domain()));
        let url = spawn_relayer(forwarder).await;
        let sender = sender(&url).await;

        let signed = sender
            .prepare(TOKEN, &transfer(), RequestOptions::default())
            .await
            .unwrap();
        let client = RelayClient::new(&url, Duration::from_secs(5)).unwrap();
        client.relay(&signed).await.unwrap();

        let error = client.relay(&signed).await.unwrap_err();
        match error {
            ClientError::Relay { status, code, .. } => {
                assert_eq!(status, 409);
                assert_eq!(code, "NONCE_MISMATCH");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_zero_validity_is_expired() {
        let forwarder = Arc::new(MemoryForwarder::new(domain()));
        let url = spawn_relayer(forwarder.clone()).await;
        let sender = sender(&url).await;

        let options = RequestOptions {
            gas: Some(100_000),
            valid_for_secs: Some(0),
        };
        let error = sender.send(TOKEN, &transfer(), options).await.unwrap_err();

        let error = error.downcast::<ClientError>().unwrap();
        assert_eq!(error.code(), Some("EXPIRED"));
        assert_eq!(forwarder.submissions(), 0);
    }
}
