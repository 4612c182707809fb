//! API request handlers.

pub mod health;
pub mod relay;
pub mod signing;
