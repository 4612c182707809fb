//! Gasless Relay: meta-transaction relayer for gasless token transfers
//!
//! This is the root crate that provides benchmark and integration-test access
//! to the workspace crates. For actual functionality, use the individual
//! crates directly:
//!
//! - `relay-core`: EIP-712 codec, signature verification, replay guard,
//!   configuration, forwarder clients
//! - `relay-engine`: Validate-then-submit orchestrator, outcomes, cancellation
//! - `api-server`: HTTP relay endpoint
//! - `relay-client`: CLI that signs and relays token transfers

// Re-export for benchmarks
pub use relay_core as core;
pub use relay_engine as engine;
