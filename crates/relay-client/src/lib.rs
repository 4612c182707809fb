//! Relay client
//!
//! Signs token transfers as EIP-712 forward requests and hands them to a
//! relayer, so the signer never pays gas.

pub mod client;
pub mod sender;

pub use client::{ClientError, RelayClient, RelayReceipt};
pub use sender::{token_decimals, RequestOptions, TransferSender};
