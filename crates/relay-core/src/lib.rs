//! Relay core library.
//!
//! Shared building blocks of the gasless relayer: the EIP-712 forward
//! request codec, signature verification, the replay and expiry guard,
//! configuration, and the forwarder client.

pub mod api;
pub mod calls;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod signing;
pub mod wallet;

pub use config::Config;
pub use error::{Error, Result};
