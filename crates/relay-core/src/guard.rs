//! Replay and expiry guard.
//!
//! Decides whether a signed request may proceed given the forwarder's
//! authoritative nonce for its signer and the current time. The guard is
//! pure; reading the nonce and the clock is the caller's job.

use alloy_primitives::U256;
use serde::Serialize;
use std::fmt;

use crate::signing::{serialize_decimal, ForwardRequest};

/// Why a relay was refused before (or instead of) submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The request could not be decoded or violates a size limit.
    MalformedRequest { message: String },
    /// The signature does not recover to `from`.
    InvalidSignature,
    /// `now >= validUntil`.
    Expired {
        #[serde(serialize_with = "serialize_decimal")]
        valid_until: U256,
        now: u64,
    },
    /// The signed nonce is not the forwarder's current nonce for the signer.
    NonceMismatch {
        #[serde(serialize_with = "serialize_decimal")]
        expected: U256,
        #[serde(serialize_with = "serialize_decimal")]
        got: U256,
    },
    /// Another relay for the same signer and nonce won.
    NonceRaceLost {
        #[serde(serialize_with = "serialize_decimal")]
        expected: U256,
        #[serde(serialize_with = "serialize_decimal")]
        got: U256,
    },
    /// The forwarder's own `verify` returned false.
    ForwarderRejected,
    /// The caller cancelled before submission.
    Cancelled,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MalformedRequest { .. } => "MALFORMED_REQUEST",
            RejectReason::InvalidSignature => "INVALID_SIGNATURE",
            RejectReason::Expired { .. } => "EXPIRED",
            RejectReason::NonceMismatch { .. } => "NONCE_MISMATCH",
            RejectReason::NonceRaceLost { .. } => "NONCE_RACE_LOST",
            RejectReason::ForwarderRejected => "FORWARDER_REJECTED",
            RejectReason::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MalformedRequest { message } => write!(f, "malformed request: {}", message),
            RejectReason::InvalidSignature => write!(f, "invalid signature"),
            RejectReason::Expired { valid_until, now } => {
                write!(f, "request expired at {} (now {})", valid_until, now)
            }
            RejectReason::NonceMismatch { expected, got } => {
                write!(f, "nonce mismatch: expected {}, got {}", expected, got)
            }
            RejectReason::NonceRaceLost { expected, got } => write!(
                f,
                "nonce {} was consumed by a concurrent relay (current {})",
                got, expected
            ),
            RejectReason::ForwarderRejected => write!(f, "forwarder rejected the request"),
            RejectReason::Cancelled => write!(f, "relay cancelled"),
        }
    }
}

/// Expiry half of the guard.
pub fn check_expiry(request: &ForwardRequest, now: u64) -> Result<(), RejectReason> {
    if request.is_expired_at(now) {
        return Err(RejectReason::Expired {
            valid_until: request.valid_until,
            now,
        });
    }
    Ok(())
}

/// Admit a request iff its nonce equals `authoritative_nonce` and it has not
/// expired at `now`. Expiry is reported first.
pub fn admit(
    request: &ForwardRequest,
    authoritative_nonce: U256,
    now: u64,
) -> Result<(), RejectReason> {
    check_expiry(request, now)?;

    if request.nonce != authoritative_nonce {
        return Err(RejectReason::NonceMismatch {
            expected: authoritative_nonce,
            got: request.nonce,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};

    fn request(nonce: u64, valid_until: u64) -> ForwardRequest {
        ForwardRequest {
            from: Address::repeat_byte(0xaa),
            to: Address::repeat_byte(0xbb),
            value: U256::ZERO,
            gas: U256::from(200_000u64),
            nonce: U256::from(nonce),
            data: Bytes::new(),
            valid_until: U256::from(valid_until),
        }
    }

    #[test]
    fn test_admits_current_nonce_before_expiry() {
        assert!(admit(&request(5, 1_000), U256::from(5u64), 999).is_ok());
    }

    #[test]
    fn test_rejects_at_exact_expiry() {
        let result = admit(&request(5, 1_000), U256::from(5u64), 1_000);
        assert_eq!(
            result,
            Err(RejectReason::Expired {
                valid_until: U256::from(1_000u64),
                now: 1_000
            })
        );
    }

    #[test]
    fn test_rejects_stale_and_future_nonces() {
        let stale = admit(&request(4, 1_000), U256::from(5u64), 10);
        let future = admit(&request(6, 1_000), U256::from(5u64), 10);

        assert_eq!(
            stale,
            Err(RejectReason::NonceMismatch {
                expected: U256::from(5u64),
                got: U256::from(4u64)
            })
        );
        assert!(matches!(future, Err(RejectReason::NonceMismatch { .. })));
    }

    #[test]
    fn test_expiry_reported_before_nonce() {
        let result = admit(&request(4, 1_000), U256::from(5u64), 2_000);
        assert!(matches!(result, Err(RejectReason::Expired { .. })));
    }

    #[test]
    fn test_reason_codes_and_serialization() {
        assert_eq!(RejectReason::InvalidSignature.code(), "INVALID_SIGNATURE");
        let json = serde_json::to_value(RejectReason::NonceMismatch {
            expected: U256::from(5u64),
            got: U256::from(4u64),
        })
        .unwrap();
        assert_eq!(json["reason"], "nonce_mismatch");
        assert_eq!(json["expected"], "5");
        assert_eq!(json["got"], "4");
    }
}
