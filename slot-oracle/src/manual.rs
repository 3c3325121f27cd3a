// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use core_types::Slot;

use crate::{OracleError, SlotOracle};

/// Operator- or test-driven slot source. The slot only moves when told to.
#[derive(Debug, Default)]
pub struct ManualSlotOracle {
    slot: AtomicU64,
    offline: AtomicBool,
    delay_ms: AtomicU64,
}

impl ManualSlotOracle {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot: AtomicU64::new(slot),
            ..Self::default()
        }
    }

    pub fn set_slot(&self, slot: Slot) {
        self.slot.store(slot, Ordering::SeqCst);
    }

    /// Moves the slot forward and returns the new value.
    pub fn advance(&self, by: Slot) -> Slot {
        self.slot.fetch_add(by, Ordering::SeqCst) + by
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Adds latency before every answer; uses the tokio timer so paused clocks apply.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl SlotOracle for ManualSlotOracle {
    async fn current_slot(&self) -> Result<Slot, OracleError> {
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("manual oracle offline".to_string()));
        }
        Ok(self.slot.load(Ordering::SeqCst))
    }

    fn describe(&self) -> String {
        "manual slot oracle".to_string()
    }
}
