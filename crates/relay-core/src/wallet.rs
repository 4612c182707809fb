//! Relayer account management.
//!
//! The relayer wallet pays gas for every forwarded call. It is loaded once
//! from configuration and only ever signs the relayer's own transactions.

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;

use crate::{Error, Result};

/// The gas-paying relayer account.
#[derive(Clone)]
pub struct RelayerWallet {
    signer: PrivateKeySigner,
    address: Address,
}

impl RelayerWallet {
    /// Create a wallet from a hex-encoded private key, optionally `0x`-prefixed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the key is not 32 bytes of hex.
    #[allow(clippy::result_large_err)]
    pub fn from_private_key(key: &str) -> Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");

        let signer = PrivateKeySigner::from_str(key_clean).map_err(|_| Error::Config {
            message: "relayer private key must be 64 hex characters".to_string(),
        })?;

        let address = signer.address();

        Ok(Self { signer, address })
    }

    /// The relayer's address (the `tx.origin` of every relayed call).
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Bind the signer to a chain so signatures carry EIP-155 replay protection.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.signer.set_chain_id(Some(chain_id));
        self
    }
}

impl std::fmt::Debug for RelayerWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private key in debug output
        f.debug_struct("RelayerWallet")
            .field("address", &format!("{}", self.address))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test private key (DO NOT USE IN PRODUCTION - this is a well-known test key)
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_from_private_key_with_and_without_prefix() {
        let prefixed = RelayerWallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let bare = RelayerWallet::from_private_key(&TEST_PRIVATE_KEY[2..]).unwrap();

        assert_eq!(prefixed.address(), TEST_ADDRESS.parse::<Address>().unwrap());
        assert_eq!(prefixed.address(), bare.address());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            RelayerWallet::from_private_key("not-a-key"),
            Err(Error::Config { .. })
        ));
        assert!(RelayerWallet::from_private_key("0x1234").is_err());
    }

    #[test]
    fn test_debug_does_not_expose_key() {
        let wallet = RelayerWallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let debug_str = format!("{:?}", wallet);

        assert!(debug_str.contains("RelayerWallet"));
        assert!(!debug_str.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
    }

    #[test]
    fn test_with_chain_id() {
        let wallet = RelayerWallet::from_private_key(TEST_PRIVATE_KEY)
            .unwrap()
            .with_chain_id(137);
        assert_eq!(wallet.signer().chain_id(), Some(137));
    }
}
