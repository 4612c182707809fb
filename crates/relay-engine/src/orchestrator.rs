//! Relay orchestrator.
//!
//! Drives one signed request through
//! `Received -> LocallyValidated -> RemotelyVerified -> Submitted -> {Confirmed | Reverted}`,
//! leaving early with a rejection whenever a check fails. Nothing is written
//! to the chain before every local and remote check has passed.

use alloy_primitives::U256;
use relay_core::api::Forwarder;
use relay_core::clock::{Clock, SystemClock};
use relay_core::guard::{self, RejectReason};
use relay_core::signing::{self, DomainDescriptor, SignedRequest};
use relay_core::Config;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::claims::InFlightClaims;
use crate::outcome::{FailureKind, RelayOutcome, SubmissionFailure};
use crate::ticket::RelayTicket;

/// Tunables of the submission path.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Factor applied to the `execute` gas estimate.
    pub gas_multiplier: u64,
    /// Ceiling on the relayer transaction gas limit.
    pub max_gas_limit: Option<u64>,
    pub max_data_bytes: usize,
    /// Bound on each nonce read, verify, estimate and simulation. The
    /// forwarder bounds its own broadcast.
    pub rpc_timeout: Duration,
    pub receipt_timeout: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gas_multiplier: config.gas_multiplier,
            max_gas_limit: config.max_gas_limit,
            max_data_bytes: config.max_data_bytes,
            rpc_timeout: config.rpc_timeout(),
            receipt_timeout: config.receipt_timeout(),
        }
    }

    /// Gas limit for the relayer transaction given an estimate, or `None`
    /// when the estimate alone exceeds the ceiling.
    pub fn gas_limit_for(&self, estimate: u64) -> Option<u64> {
        let padded = estimate.saturating_mul(self.gas_multiplier).max(estimate);
        match self.max_gas_limit {
            Some(ceiling) if estimate > ceiling => None,
            Some(ceiling) => Some(padded.min(ceiling)),
            None => Some(padded),
        }
    }
}

/// Everything a relay needs, built once at startup.
#[derive(Clone)]
pub struct RelayContext {
    pub domain: DomainDescriptor,
    pub forwarder: Arc<dyn Forwarder>,
    pub clock: Arc<dyn Clock>,
    pub settings: RelaySettings,
}

impl RelayContext {
    pub fn new(domain: DomainDescriptor, forwarder: Arc<dyn Forwarder>, settings: RelaySettings) -> Self {
        Self {
            domain,
            forwarder,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Counters over all relays handled by one orchestrator.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    executed: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RelayStatsSnapshot {
    pub received: u64,
    pub executed: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl RelayStats {
    fn record(&self, outcome: &RelayOutcome) {
        let counter = match outcome {
            RelayOutcome::Executed { .. } => &self.executed,
            RelayOutcome::Rejected { .. } => &self.rejected,
            RelayOutcome::SubmissionFailed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Validate-then-submit engine shared by all relay tasks.
pub struct RelayOrchestrator {
    context: RelayContext,
    claims: InFlightClaims,
    stats: RelayStats,
}

/// Early exit from a relay step.
type Step<T> = std::result::Result<T, RelayOutcome>;

impl RelayOrchestrator {
    pub fn new(context: RelayContext) -> Self {
        Self {
            context,
            claims: InFlightClaims::new(),
            stats: RelayStats::default(),
        }
    }

    pub fn context(&self) -> &RelayContext {
        &self.context
    }

    pub fn domain(&self) -> &DomainDescriptor {
        &self.context.domain
    }

    pub fn forwarder(&self) -> &Arc<dyn Forwarder> {
        &self.context.forwarder
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Relay `signed` on its own task. The ticket cancels it before submission.
    pub fn spawn(self: &Arc<Self>, signed: SignedRequest) -> (RelayTicket, JoinHandle<RelayOutcome>) {
        let ticket = RelayTicket::new();
        let orchestrator = Arc::clone(self);
        let task_ticket = ticket.clone();
        let handle =
            tokio::spawn(async move { orchestrator.relay_with_ticket(signed, &task_ticket).await });
        (ticket, handle)
    }

    /// Relay `signed` to completion on the current task.
    pub async fn relay(&self, signed: SignedRequest) -> RelayOutcome {
        self.relay_with_ticket(signed, &RelayTicket::new()).await
    }

    /// Relay `signed`, observing `ticket` for cancellation.
    pub async fn relay_with_ticket(&self, signed: SignedRequest, ticket: &RelayTicket) -> RelayOutcome {
        let span = info_span!(
            "relay",
            signer = %signed.from(),
            nonce = %signed.nonce(),
            to = %signed.request().to,
        );

        async {
            self.stats.received.fetch_add(1, Ordering::Relaxed);

            let outcome = match self.run(&signed, ticket).await {
                Ok(outcome) | Err(outcome) => outcome,
            };
            ticket.finish();
            self.stats.record(&outcome);
            log_outcome(&outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, signed: &SignedRequest, ticket: &RelayTicket) -> Step<RelayOutcome> {
        let request = signed.request();
        let signer = request.from;
        let nonce = request.nonce;
        let forwarder = &self.context.forwarder;

        // Received -> LocallyValidated
        let digest = signing::digest(&self.context.domain, request, self.context.settings.max_data_bytes)
            .map_err(|e| {
                RelayOutcome::rejected(RejectReason::MalformedRequest {
                    message: e.to_string(),
                })
            })?;

        guard::check_expiry(request, self.context.clock.now()).map_err(RelayOutcome::rejected)?;

        if !signing::verify(&digest, signed.signature(), &signer) {
            return Err(RelayOutcome::rejected(RejectReason::InvalidSignature));
        }

        let authoritative = self
            .chain_read(ticket, nonce, "nonce lookup", forwarder.nonce_of(signer))
            .await?;
        guard::admit(request, authoritative, self.context.clock.now()).map_err(RelayOutcome::rejected)?;
        debug!("Request locally validated");

        // LocallyValidated -> RemotelyVerified
        let _claim = self.claims.try_claim(signer, nonce).ok_or_else(|| {
            RelayOutcome::rejected(RejectReason::NonceRaceLost {
                expected: authoritative,
                got: nonce,
            })
        })?;

        let current = self
            .chain_read(ticket, nonce, "nonce lookup", forwarder.nonce_of(signer))
            .await?;
        if current != nonce {
            return Err(RelayOutcome::rejected(RejectReason::NonceRaceLost {
                expected: current,
                got: nonce,
            }));
        }

        let accepted = self
            .chain_read(ticket, nonce, "forwarder verify", forwarder.verify(signed))
            .await?;
        if !accepted {
            error!(
                forwarder = %self.context.domain.verifying_contract,
                "Forwarder rejected a request that passed local validation"
            );
            return Err(RelayOutcome::rejected(RejectReason::ForwarderRejected));
        }
        debug!("Request remotely verified");

        // RemotelyVerified -> Submitted
        let estimate = self
            .cancellable(
                ticket,
                self.timed("gas estimation", forwarder.estimate_execute_gas(signed)),
            )
            .await?
            .map_err(|e| {
                RelayOutcome::failed(SubmissionFailure::new(FailureKind::GasEstimation, e, nonce))
            })?;
        let gas_limit = self.context.settings.gas_limit_for(estimate).ok_or_else(|| {
            RelayOutcome::failed(SubmissionFailure::new(
                FailureKind::GasEstimation,
                format!(
                    "gas estimate {} exceeds the relayer gas ceiling {}",
                    estimate,
                    self.context.settings.max_gas_limit.unwrap_or_default()
                ),
                nonce,
            ))
        })?;

        // execute() returns (false, data) on a failed inner call instead of reverting.
        let simulated = self
            .chain_read(ticket, nonce, "execute simulation", forwarder.simulate_execute(signed))
            .await?;
        if let Some(reason) = simulated {
            return Err(RelayOutcome::failed(SubmissionFailure::new(
                FailureKind::Reverted,
                reason,
                nonce,
            )));
        }

        if !ticket.begin_submission() {
            return Err(RelayOutcome::rejected(RejectReason::Cancelled));
        }

        let tx_hash = match forwarder.submit_execute(signed, gas_limit).await {
            Ok(tx_hash) => tx_hash,
            Err(relay_core::Error::BroadcastUnconfirmed { tx_hash, message }) => {
                return Err(RelayOutcome::failed(
                    SubmissionFailure::new(FailureKind::Timeout, message, nonce).with_tx_hash(tx_hash),
                ));
            }
            Err(e) => {
                return Err(RelayOutcome::failed(SubmissionFailure::new(
                    FailureKind::Rpc,
                    format!("broadcast failed: {}", e),
                    nonce,
                )));
            }
        };
        info!(tx_hash = %tx_hash, gas_estimate = estimate, gas_limit = gas_limit, "Relay submitted");

        // Submitted -> Confirmed | Reverted
        let receipt_timeout = self.context.settings.receipt_timeout;
        let receipt = match tokio::time::timeout(
            receipt_timeout + self.context.settings.rpc_timeout,
            forwarder.wait_for_receipt(tx_hash, receipt_timeout),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(relay_core::Error::Timeout { .. })) | Err(_) => {
                return Err(RelayOutcome::failed(
                    SubmissionFailure::new(
                        FailureKind::Timeout,
                        format!("no receipt after {}s", receipt_timeout.as_secs()),
                        nonce,
                    )
                    .with_tx_hash(tx_hash),
                ));
            }
            Ok(Err(e)) => {
                return Err(RelayOutcome::failed(
                    SubmissionFailure::new(FailureKind::Rpc, e.to_string(), nonce).with_tx_hash(tx_hash),
                ));
            }
        };

        if receipt.success {
            return Ok(RelayOutcome::Executed { receipt, nonce });
        }

        let reason = match self
            .timed("revert reason", forwarder.revert_reason(signed, receipt.block_number))
            .await
        {
            Ok(Some(reason)) => reason,
            Ok(None) => "execution reverted".to_string(),
            Err(e) => {
                debug!(error = %e, "Could not recover revert reason");
                "execution reverted".to_string()
            }
        };

        Err(RelayOutcome::failed(
            SubmissionFailure::new(FailureKind::Reverted, reason, nonce).with_tx_hash(receipt.tx_hash),
        ))
    }

    /// A pre-submission chain read: cancellable, time-bounded, RPC failure
    /// becomes `SubmissionFailed{Rpc}`.
    async fn chain_read<T>(
        &self,
        ticket: &RelayTicket,
        nonce: U256,
        operation: &'static str,
        read: impl Future<Output = relay_core::Result<T>>,
    ) -> Step<T> {
        self.cancellable(ticket, self.timed(operation, read))
            .await?
            .map_err(|e| RelayOutcome::failed(SubmissionFailure::new(FailureKind::Rpc, e, nonce)))
    }

    async fn cancellable<T>(&self, ticket: &RelayTicket, fut: impl Future<Output = T>) -> Step<T> {
        tokio::select! {
            biased;
            _ = ticket.cancelled() => Err(RelayOutcome::rejected(RejectReason::Cancelled)),
            out = fut => Ok(out),
        }
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = relay_core::Result<T>>,
    ) -> std::result::Result<T, String> {
        match tokio::time::timeout(self.context.settings.rpc_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{} failed: {}", operation, e)),
            Err(_) => Err(format!(
                "{} timed out after {}s",
                operation,
                self.context.settings.rpc_timeout.as_secs()
            )),
        }
    }
}

fn log_outcome(outcome: &RelayOutcome) {
    match outcome {
        RelayOutcome::Executed { receipt, .. } => info!(
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            "Relay executed"
        ),
        RelayOutcome::Rejected { reason } => {
            info!(code = reason.code(), reason = %reason, "Relay rejected")
        }
        RelayOutcome::SubmissionFailed { failure } => warn!(
            code = failure.kind.code(),
            reason = %failure.reason,
            tx_hash = ?failure.tx_hash,
            "Relay submission failed"
        ),
    }
}
