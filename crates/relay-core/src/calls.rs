//! Token call encoding for the inner `data` of a forward request.
//!
//! The relay never inspects `data`; these helpers exist for callers that
//! build transfers.

use alloy_primitives::{Address, Bytes, U256};
use rust_decimal::Decimal;

use crate::{Error, Result};

/// ERC-20 `transfer(address,uint256)` selector.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// ERC-721 / ERC-20 `transferFrom(address,address,uint256)` selector.
pub const TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

/// ERC-20 `decimals()` selector.
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// An inner token call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCall {
    /// ERC-20 transfer of `amount` base units to `to`.
    Transfer { to: Address, amount: U256 },
    /// ERC-721 transfer of `token_id` from `from` to `to`.
    TransferFrom {
        from: Address,
        to: Address,
        token_id: U256,
    },
}

impl TokenCall {
    /// ABI-encode the call.
    pub fn encode(&self) -> Bytes {
        match self {
            TokenCall::Transfer { to, amount } => {
                let mut data = Vec::with_capacity(68);
                data.extend_from_slice(&TRANSFER_SELECTOR);
                // address left-padded to 32 bytes
                data.extend_from_slice(&[0u8; 12]);
                data.extend_from_slice(to.as_slice());
                data.extend_from_slice(&amount.to_be_bytes::<32>());
                Bytes::from(data)
            }
            TokenCall::TransferFrom { from, to, token_id } => {
                let mut data = Vec::with_capacity(100);
                data.extend_from_slice(&TRANSFER_FROM_SELECTOR);
                data.extend_from_slice(&[0u8; 12]);
                data.extend_from_slice(from.as_slice());
                data.extend_from_slice(&[0u8; 12]);
                data.extend_from_slice(to.as_slice());
                data.extend_from_slice(&token_id.to_be_bytes::<32>());
                Bytes::from(data)
            }
        }
    }
}

/// Scale a human-readable token amount (e.g. `1.5`) to base units.
///
/// Rejects negative amounts, amounts with more fractional digits than
/// `decimals`, and results that do not fit in a uint256.
#[allow(clippy::result_large_err)]
pub fn scale_amount(amount: Decimal, decimals: u8) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::Malformed {
            message: "amount must not be negative".to_string(),
        });
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > decimals as u32 {
        return Err(Error::Malformed {
            message: format!(
                "amount has {} fractional digits, token supports {}",
                scale, decimals
            ),
        });
    }

    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    U256::from(10u64)
        .checked_pow(U256::from(decimals as u32 - scale))
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| Error::Malformed {
            message: format!("amount {} with {} decimals overflows uint256", amount, decimals),
        })
}

/// Decode the return value of `decimals()`.
#[allow(clippy::result_large_err)]
pub fn decode_decimals(output: &[u8]) -> Result<u8> {
    if output.len() != 32 {
        return Err(Error::Malformed {
            message: format!("decimals() returned {} bytes", output.len()),
        });
    }
    let value = U256::from_be_slice(output);
    u8::try_from(value).map_err(|_| Error::Malformed {
        message: format!("decimals() returned {}", value),
    })
}
