//! Forward request types for EIP-712 signing and relaying.
//!
//! Defines the signed intent, its canonical struct hash and the JSON wire
//! shape exchanged with wallets and the relay endpoint.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::domain::DomainDescriptor;
use crate::{Error, Result};

/// Struct type signature. Field order is part of the wire contract.
pub const FORWARD_REQUEST_TYPE: &str = "ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data,uint256 validUntil)";

/// Default upper bound on the inner call-data length.
pub const DEFAULT_MAX_DATA_BYTES: usize = 64 * 1024;

/// Raw forward request for EIP-712 signing.
///
/// This matches the struct verified by the forwarder contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    /// Signer address.
    pub from: Address,
    /// Target contract address.
    pub to: Address,
    /// Native value forwarded with the call, in wei.
    pub value: U256,
    /// Gas budget for the inner call.
    pub gas: U256,
    /// Signer nonce on the forwarder.
    pub nonce: U256,
    /// ABI-encoded inner call. Never interpreted here.
    pub data: Bytes,
    /// Expiry timestamp (unix seconds).
    pub valid_until: U256,
}

impl ForwardRequest {
    /// Compute the EIP-712 struct hash for this request.
    pub fn struct_hash(&self) -> B256 {
        let type_hash = keccak256(FORWARD_REQUEST_TYPE.as_bytes());

        // EIP-712 encodeData: all values must be padded to 32 bytes.
        // Addresses are left-padded from 20 bytes to 32 bytes.
        let from_padded = B256::left_padding_from(self.from.as_slice());
        let to_padded = B256::left_padding_from(self.to.as_slice());
        let data_hash = keccak256(&self.data);

        let encoded = (
            type_hash,
            from_padded,
            to_padded,
            self.value,
            self.gas,
            self.nonce,
            data_hash,
            self.valid_until,
        )
            .abi_encode_packed();

        keccak256(&encoded)
    }

    /// Whether `now` is at or past the request's expiry.
    pub fn is_expired_at(&self, now: u64) -> bool {
        U256::from(now) >= self.valid_until
    }
}

/// Compute the EIP-712 typed data hash: `keccak256("\x19\x01" ++ domainSeparator ++ structHash)`.
pub fn typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let prefix = [0x19u8, 0x01u8];
    let data = (prefix, domain_separator, struct_hash).abi_encode_packed();
    keccak256(&data)
}

/// Compute the binding digest of `request` under `domain`.
///
/// Fails only when `request.data` exceeds `max_data_bytes`.
#[allow(clippy::result_large_err)]
pub fn digest(
    domain: &DomainDescriptor,
    request: &ForwardRequest,
    max_data_bytes: usize,
) -> Result<B256> {
    if request.data.len() > max_data_bytes {
        return Err(Error::Malformed {
            message: format!(
                "data is {} bytes, limit is {}",
                request.data.len(),
                max_data_bytes
            ),
        });
    }

    Ok(typed_data_hash(domain.separator(), request.struct_hash()))
}

/// A forward request together with the signer's signature bytes.
///
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    request: ForwardRequest,
    signature: Bytes,
}

impl SignedRequest {
    pub fn new(request: ForwardRequest, signature: Bytes) -> Self {
        Self { request, signature }
    }

    pub fn request(&self) -> &ForwardRequest {
        &self.request
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn from(&self) -> Address {
        self.request.from
    }

    pub fn nonce(&self) -> U256 {
        self.request.nonce
    }
}

/// JSON form of a forward request, as produced by wallets.
///
/// Integers travel as decimal strings to avoid precision loss; JSON numbers
/// are tolerated for small values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequestMessage {
    pub from: String,
    pub to: String,
    pub value: IntegerField,
    #[serde(alias = "gasLimit")]
    pub gas: IntegerField,
    pub nonce: IntegerField,
    pub data: String,
    pub valid_until: IntegerField,
}

/// An integer carried either as a decimal string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntegerField {
    Text(String),
    Number(u64),
}

impl IntegerField {
    fn parse(&self, field: &str) -> Result<U256> {
        match self {
            IntegerField::Number(n) => Ok(U256::from(*n)),
            IntegerField::Text(s) => {
                let s = s.trim();
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::Malformed {
                        message: format!("{} must be a decimal integer string", field),
                    });
                }
                U256::from_str_radix(s, 10).map_err(|_| Error::Malformed {
                    message: format!("{} does not fit in uint256", field),
                })
            }
        }
    }
}

/// Serialize a `U256` as a decimal string, the wire form of every integer.
pub fn serialize_decimal<S>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(value)
}

impl From<U256> for IntegerField {
    fn from(value: U256) -> Self {
        IntegerField::Text(value.to_string())
    }
}

fn parse_address(value: &str, field: &str) -> Result<Address> {
    let trimmed = value.trim();
    if trimmed.len() != 42 || !trimmed.starts_with("0x") {
        return Err(Error::Malformed {
            message: format!("{} must be a 0x-prefixed 20-byte address", field),
        });
    }
    // Case-insensitive: checksums are not enforced, bytes are what gets signed.
    Address::from_str(trimmed).map_err(|_| Error::Malformed {
        message: format!("{} is not a valid address", field),
    })
}

/// Decode `0x`-prefixed (or bare) hex into bytes.
#[allow(clippy::result_large_err)]
pub fn parse_hex_bytes(value: &str, field: &str) -> Result<Bytes> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| Error::Malformed {
            message: format!("{} is not valid hex: {}", field, e),
        })
}

impl TryFrom<&ForwardRequestMessage> for ForwardRequest {
    type Error = Error;

    fn try_from(message: &ForwardRequestMessage) -> Result<Self> {
        let gas = message.gas.parse("gas")?;
        if gas.is_zero() {
            return Err(Error::Malformed {
                message: "gas must be positive".to_string(),
            });
        }

        Ok(Self {
            from: parse_address(&message.from, "from")?,
            to: parse_address(&message.to, "to")?,
            value: message.value.parse("value")?,
            gas,
            nonce: message.nonce.parse("nonce")?,
            data: parse_hex_bytes(&message.data, "data")?,
            valid_until: message.valid_until.parse("validUntil")?,
        })
    }
}

impl From<&ForwardRequest> for ForwardRequestMessage {
    fn from(request: &ForwardRequest) -> Self {
        Self {
            from: request.from.to_checksum(None),
            to: request.to.to_checksum(None),
            value: request.value.into(),
            gas: request.gas.into(),
            nonce: request.nonce.into(),
            data: format!("0x{}", hex::encode(&request.data)),
            valid_until: request.valid_until.into(),
        }
    }
}
