//! In-flight (signer, nonce) claims.
//!
//! At most one relay per signer nonce may proceed past local validation in
//! this process. A claim is released when its guard is dropped.

use alloy_primitives::{Address, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

type SlotKey = (Address, U256);

/// Table of claimed signer nonces.
#[derive(Debug, Clone, Default)]
pub struct InFlightClaims {
    slots: Arc<DashMap<SlotKey, ()>>,
}

impl InFlightClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `(signer, nonce)`, or `None` if another relay holds it.
    pub fn try_claim(&self, signer: Address, nonce: U256) -> Option<ClaimGuard> {
        match self.slots.entry((signer, nonce)) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(ClaimGuard {
                    slots: Arc::clone(&self.slots),
                    key: (signer, nonce),
                })
            }
        }
    }

    pub fn is_claimed(&self, signer: Address, nonce: U256) -> bool {
        self.slots.contains_key(&(signer, nonce))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Releases its claim on drop.
#[derive(Debug)]
pub struct ClaimGuard {
    slots: Arc<DashMap<SlotKey, ()>>,
    key: SlotKey,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.slots.remove(&self.key);
    }
}
