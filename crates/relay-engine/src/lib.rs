//! Relay Engine
//!
//! Validate-then-submit state machine that turns signed forward requests
//! into forwarder executions paid for by the relayer.

pub mod claims;
pub mod orchestrator;
pub mod outcome;
pub mod ticket;

pub use claims::{ClaimGuard, InFlightClaims};
pub use orchestrator::{RelayContext, RelayOrchestrator, RelaySettings, RelayStatsSnapshot};
pub use outcome::{FailureKind, RelayOutcome, SubmissionFailure};
pub use ticket::{CancelError, CancelOnDrop, RelayTicket};
