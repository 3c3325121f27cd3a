// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::HashMap;

use core_types::{Slot, WalletId};
use parking_lot::Mutex;

/// Slots already won in this session and the wallet that won each one.
#[derive(Default)]
pub struct SlotReservationTable {
    claimed: Mutex<HashMap<Slot, WalletId>>,
}

impl SlotReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic test-and-set. Exactly one caller per slot sees `true`.
    pub fn claim_if_free(&self, slot: Slot, wallet: &str) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.contains_key(&slot) {
            return false;
        }
        claimed.insert(slot, wallet.to_string());
        true
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.claimed.lock().contains_key(&slot)
    }

    pub fn claimant(&self, slot: Slot) -> Option<WalletId> {
        self.claimed.lock().get(&slot).cloned()
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the table and returns how many slots were held.
    pub fn reset(&self) -> usize {
        let mut claimed = self.claimed.lock();
        let held = claimed.len();
        claimed.clear();
        held
    }
}
