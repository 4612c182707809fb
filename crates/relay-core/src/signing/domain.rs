//! EIP-712 domain separator for the forwarder contract.
//!
//! The domain binds every request digest to one protocol name, version,
//! chain and verifying contract, so a signature for one deployment never
//! verifies against another.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::config::{Config, DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION};

/// EIP-712 domain type signature. Part of the wire contract.
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Domain descriptor of one forwarder deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDescriptor {
    /// Protocol name.
    pub name: String,
    /// Protocol version.
    pub version: String,
    /// Chain ID.
    pub chain_id: u64,
    /// Verifying (forwarder) contract address.
    pub verifying_contract: Address,
}

impl DomainDescriptor {
    /// Domain with the default forwarder name and version.
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self::custom(
            DEFAULT_DOMAIN_NAME,
            DEFAULT_DOMAIN_VERSION,
            chain_id,
            verifying_contract,
        )
    }

    /// Create domain with custom parameters.
    pub fn custom(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// Build the domain from configuration once the chain id is known.
    pub fn from_config(config: &Config, chain_id: u64) -> Self {
        Self::custom(
            config.domain_name.clone(),
            config.domain_version.clone(),
            chain_id,
            config.forwarder_address,
        )
    }

    /// Compute the EIP-712 domain separator hash.
    pub fn separator(&self) -> B256 {
        let domain_type_hash = keccak256(EIP712_DOMAIN_TYPE.as_bytes());

        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());

        // Addresses are left-padded from 20 bytes to 32 bytes.
        let contract_padded = B256::left_padding_from(self.verifying_contract.as_slice());

        let encoded = (
            domain_type_hash,
            name_hash,
            version_hash,
            U256::from(self.chain_id),
            contract_padded,
        )
            .abi_encode_packed();

        keccak256(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_domain() {
        let domain = DomainDescriptor::new(1, Address::repeat_byte(0x11));
        assert_eq!(domain.name, "GaslessForwarder");
        assert_eq!(domain.version, "1");
        assert_eq!(domain.chain_id, 1);
    }

    #[test]
    fn test_domain_separator_deterministic() {
        let domain1 = DomainDescriptor::new(137, Address::repeat_byte(0x11));
        let domain2 = DomainDescriptor::new(137, Address::repeat_byte(0x11));
        assert_eq!(domain1.separator(), domain2.separator());
    }

    #[test]
    fn test_separator_changes_with_each_field() {
        let base = DomainDescriptor::new(137, Address::repeat_byte(0x11));

        let other_chain = DomainDescriptor::new(1, Address::repeat_byte(0x11));
        let other_contract = DomainDescriptor::new(137, Address::repeat_byte(0x22));
        let other_name = DomainDescriptor::custom("Other", "1", 137, Address::repeat_byte(0x11));
        let other_version =
            DomainDescriptor::custom("GaslessForwarder", "2", 137, Address::repeat_byte(0x11));

        for other in [other_chain, other_contract, other_name, other_version] {
            assert_ne!(base.separator(), other.separator());
        }
    }

    #[test]
    fn test_separator_matches_alloy_domain() {
        let contract = Address::repeat_byte(0x42);
        let domain = DomainDescriptor::new(31337, contract);

        let reference = alloy_sol_types::eip712_domain! {
            name: "GaslessForwarder",
            version: "1",
            chain_id: 31337,
            verifying_contract: contract,
        };

        assert_eq!(domain.separator(), reference.separator());
    }

    #[test]
    fn test_domain_serializes_camel_case() {
        let domain = DomainDescriptor::new(10, Address::repeat_byte(0x11));
        let json = serde_json::to_string(&domain).unwrap();
        assert!(json.contains("chainId"));
        assert!(json.contains("verifyingContract"));
    }
}
