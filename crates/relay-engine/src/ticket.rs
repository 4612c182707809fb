//! Caller-side cancellation handle for a running relay.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const SUBMITTED: u8 = 2;
const FINISHED: u8 = 3;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// The relayer transaction has been broadcast and cannot be recalled.
    #[error("relay already submitted; too late to cancel")]
    TooLateToCancel,

    #[error("relay already finished")]
    AlreadyFinished,
}

/// Cancellation handle shared between the caller and the relay task.
///
/// Cancelling is possible until the relayer transaction is about to be
/// broadcast. Clones refer to the same relay.
#[derive(Debug, Clone)]
pub struct RelayTicket {
    stage: Arc<AtomicU8>,
    token: CancellationToken,
}

impl Default for RelayTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayTicket {
    pub fn new() -> Self {
        Self {
            stage: Arc::new(AtomicU8::new(PENDING)),
            token: CancellationToken::new(),
        }
    }

    /// Cancel the relay. Idempotent before submission.
    pub fn cancel(&self) -> Result<(), CancelError> {
        match self
            .stage
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) | Err(CANCELLED) => {
                self.token.cancel();
                Ok(())
            }
            Err(SUBMITTED) => Err(CancelError::TooLateToCancel),
            Err(_) => Err(CancelError::AlreadyFinished),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.stage.load(Ordering::SeqCst) == CANCELLED
    }

    pub fn is_submitted(&self) -> bool {
        self.stage.load(Ordering::SeqCst) == SUBMITTED
    }

    /// Resolves once the relay is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Cancel when the returned guard is dropped, unless already submitted.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            ticket: Some(self.clone()),
        }
    }

    /// Move to the submitted stage. Fails if the caller cancelled first.
    pub(crate) fn begin_submission(&self) -> bool {
        self.stage
            .compare_exchange(PENDING, SUBMITTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Mark the relay finished; later cancels report [`CancelError::AlreadyFinished`]
    /// unless the relay was submitted.
    pub(crate) fn finish(&self) {
        let _ = self
            .stage
            .compare_exchange(PENDING, FINISHED, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// Drop guard from [`RelayTicket::cancel_on_drop`].
#[derive(Debug)]
pub struct CancelOnDrop {
    ticket: Option<RelayTicket>,
}

impl CancelOnDrop {
    /// Keep the relay running after the guard is dropped.
    pub fn disarm(mut self) {
        self.ticket = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            match ticket.cancel() {
                Ok(()) => tracing::debug!("Caller went away, relay cancelled"),
                Err(CancelError::TooLateToCancel) => {
                    tracing::debug!("Caller went away after broadcast, relay continues")
                }
                Err(CancelError::AlreadyFinished) => {}
            }
        }
    }
}
