//! Relay outcomes handed back to callers.

use alloy_primitives::{B256, U256};
use relay_core::api::ExecutionReceipt;
use relay_core::guard::RejectReason;
use relay_core::signing::serialize_decimal;
use serde::Serialize;
use std::fmt;

/// Chain-side failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The forwarded call failed: the relayer transaction was mined with a
    /// failed status, or the pre-broadcast dry run of `execute` reported a
    /// failed inner call.
    Reverted,
    /// No receipt within the configured window. The transaction may still land.
    Timeout,
    /// The node refused to estimate gas for `execute`.
    GasEstimation,
    /// Any other RPC or transport failure.
    Rpc,
}

impl FailureKind {
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::Reverted => "REVERTED",
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::GasEstimation => "GAS_ESTIMATION_FAILED",
            FailureKind::Rpc => "RPC_ERROR",
        }
    }
}

/// A failure after local validation passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// Set once the relayer transaction was broadcast.
    pub tx_hash: Option<B256>,
    /// The signer nonce the relay attempted to consume.
    #[serde(serialize_with = "serialize_decimal")]
    pub nonce: U256,
}

impl SubmissionFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>, nonce: U256) -> Self {
        Self {
            kind,
            reason: reason.into(),
            tx_hash: None,
            nonce,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.reason)?;
        if let Some(tx_hash) = self.tx_hash {
            write!(f, " (tx {})", tx_hash)?;
        }
        Ok(())
    }
}

/// Final state of one relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelayOutcome {
    Executed {
        receipt: ExecutionReceipt,
        #[serde(serialize_with = "serialize_decimal")]
        nonce: U256,
    },
    Rejected {
        reason: RejectReason,
    },
    SubmissionFailed {
        failure: SubmissionFailure,
    },
}

impl RelayOutcome {
    pub fn rejected(reason: RejectReason) -> Self {
        RelayOutcome::Rejected { reason }
    }

    pub fn failed(failure: SubmissionFailure) -> Self {
        RelayOutcome::SubmissionFailed { failure }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, RelayOutcome::Executed { .. })
    }

    /// Relayer transaction hash, when one was broadcast.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            RelayOutcome::Executed { receipt, .. } => Some(receipt.tx_hash),
            RelayOutcome::Rejected { .. } => None,
            RelayOutcome::SubmissionFailed { failure } => failure.tx_hash,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            RelayOutcome::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&SubmissionFailure> {
        match self {
            RelayOutcome::SubmissionFailed { failure } => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_only_when_broadcast() {
        let rejected = RelayOutcome::rejected(RejectReason::InvalidSignature);
        assert_eq!(rejected.tx_hash(), None);

        let hash = B256::repeat_byte(0x11);
        let timeout = RelayOutcome::failed(
            SubmissionFailure::new(FailureKind::Timeout, "no receipt", U256::from(5u64))
                .with_tx_hash(hash),
        );
        assert_eq!(timeout.tx_hash(), Some(hash));
        assert!(!timeout.is_executed());
    }

    #[test]
    fn test_failure_display() {
        let failure = SubmissionFailure::new(FailureKind::GasEstimation, "execution reverted", U256::ZERO);
        assert_eq!(failure.to_string(), "GAS_ESTIMATION_FAILED: execution reverted");
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = RelayOutcome::rejected(RejectReason::Cancelled);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"]["reason"], "cancelled");
    }
}
