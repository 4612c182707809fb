//! HTTP client for a relayer's API.

use alloy_primitives::{Address, U256};
use relay_core::signing::{DomainDescriptor, ForwardRequestMessage, SignedRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relayer answered with an error body.
    #[error("relayer returned {status} {code}: {message}")]
    Relay {
        status: u16,
        code: String,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("unexpected relayer response: {message}")]
    Unexpected { message: String },
}

impl ClientError {
    /// Machine-readable relayer error code, if the relayer produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Relay { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Relayer answer for an executed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReceipt {
    pub success: bool,
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

#[derive(Serialize)]
struct RelayBody {
    message: ForwardRequestMessage,
    signature: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
    details: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct DomainBody {
    domain: DomainDescriptor,
}

#[derive(Deserialize)]
struct NonceBody {
    nonce: String,
}

/// Client for one relayer deployment.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Domain the relayer verifies signatures against.
    pub async fn domain(&self) -> Result<DomainDescriptor> {
        let url = format!("{}/api/domain", self.base_url);
        let body: DomainBody = self.read(self.http_client.get(url)).await?;
        Ok(body.domain)
    }

    /// Current forwarder nonce of `signer`.
    pub async fn nonce(&self, signer: Address) -> Result<U256> {
        let url = format!("{}/api/nonce/{}", self.base_url, signer);
        let body: NonceBody = self.read(self.http_client.get(url)).await?;
        U256::from_str_radix(&body.nonce, 10).map_err(|_| ClientError::Unexpected {
            message: format!("nonce {:?} is not a decimal integer", body.nonce),
        })
    }

    /// Submit a signed request and wait for the relayer's verdict.
    pub async fn relay(&self, signed: &SignedRequest) -> Result<RelayReceipt> {
        let url = format!("{}/api/relay", self.base_url);
        let body = RelayBody {
            message: ForwardRequestMessage::from(signed.request()),
            signature: signed.signature().to_string(),
        };

        tracing::debug!(
            signer = %signed.from(),
            nonce = %signed.nonce(),
            url = %url,
            "Submitting forward request"
        );

        self.read(self.http_client.post(url).json(&body)).await
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => ClientError::Relay {
                    status: status.as_u16(),
                    code: body.code,
                    message: body.error,
                    details: body.details,
                },
                Err(_) => ClientError::Relay {
                    status: status.as_u16(),
                    code: "HTTP_ERROR".to_string(),
                    message: String::from_utf8_lossy(&bytes).into_owned(),
                    details: None,
                },
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Unexpected {
            message: e.to_string(),
        })
    }
}
