// Copyright (c) James Kassemi, SC, US. All rights reserved.

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::{slot_table::SlotReservationTable, wallet_ledger::WalletLedger};

/// Mutable sale state that a reset wipes: the wallet ledger and the slot table.
///
/// Evaluations hold a read guard from [`SaleSession::enter`] for their whole run; a reset takes
/// the write side, so it waits for in-flight evaluations and none observe a half-cleared state.
#[derive(Default)]
pub struct SaleSession {
    gate: RwLock<()>,
    ledger: WalletLedger,
    slots: SlotReservationTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub wallets: usize,
    pub slots: usize,
}

pub struct SessionGuard<'a> {
    _gate: RwLockReadGuard<'a, ()>,
    session: &'a SaleSession,
}

impl<'a> SessionGuard<'a> {
    pub fn ledger(&self) -> &'a WalletLedger {
        &self.session.ledger
    }

    pub fn slots(&self) -> &'a SlotReservationTable {
        &self.session.slots
    }
}

impl SaleSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enter(&self) -> SessionGuard<'_> {
        SessionGuard {
            _gate: self.gate.read().await,
            session: self,
        }
    }

    pub async fn reset(&self) -> ResetSummary {
        let _gate = self.gate.write().await;
        ResetSummary {
            wallets: self.ledger.reset(),
            slots: self.slots.reset(),
        }
    }

    pub fn slots_claimed(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use core_types::SaleConfig;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn reset_waits_for_open_guards() {
        let session = Arc::new(SaleSession::new());
        let cfg = SaleConfig {
            max_per_wallet: 1,
            ..SaleConfig::default()
        };
        let now = DateTime::from_timestamp(0, 0).unwrap();

        let guard = session.enter().await;
        guard
            .ledger()
            .try_claim("A", now, &cfg)
            .await
            .unwrap()
            .commit(now, Some(5));
        assert!(guard.slots().claim_if_free(5, "A"));

        let resetter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.reset().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!resetter.is_finished());
        assert_eq!(session.slots_claimed(), 1);

        drop(guard);
        let summary = resetter.await.unwrap();
        assert_eq!(summary, ResetSummary { wallets: 1, slots: 1 });
        assert_eq!(session.slots_claimed(), 0);
    }
}
