//! Error types for the relay core.

use alloy_primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// Raw revert payload, when the node attached one.
        data: Option<String>,
    },

    #[error("RPC transport error: {message}")]
    Transport { message: String, status: Option<u16> },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    /// The raw transaction was signed and handed to the node, but the node's
    /// answer never arrived. It may still be mined under `tx_hash`.
    #[error("Broadcast of {tx_hash} unconfirmed: {message}")]
    BroadcastUnconfirmed { tx_hash: B256, message: String },

    #[error("Malformed request: {message}")]
    Malformed { message: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Forwarder error: {message}")]
    Forwarder { message: String },
}

impl Error {
    /// Whether a retry of the same read-only call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Transport { status, .. } => {
                matches!(status, Some(429) | None) || status.is_some_and(|s| s >= 500)
            }
            Error::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Whether the node rejected a raw transaction because of its account nonce.
    pub fn is_nonce_error(&self) -> bool {
        match self {
            Error::Rpc { message, .. } => {
                let message = message.to_lowercase();
                message.contains("nonce too low")
                    || message.contains("nonce too high")
                    || message.contains("replacement transaction underpriced")
                    || message.contains("already known")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
