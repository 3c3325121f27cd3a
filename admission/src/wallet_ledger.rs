// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use core_types::{RejectReason, SaleConfig, Slot, WalletId};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Purchase history for one wallet within the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletRecord {
    pub wallet: WalletId,
    pub purchase_count: u64,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub last_slot_claimed: Option<Slot>,
}

impl WalletRecord {
    fn new(wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            purchase_count: 0,
            last_purchase_at: None,
            last_slot_claimed: None,
        }
    }
}

type WalletCell = Arc<AsyncMutex<Option<WalletRecord>>>;
type Cells = Arc<Mutex<HashMap<WalletId, WalletCell>>>;

/// Per-wallet purchase state.
///
/// Each wallet owns an async lock. [`WalletLedger::try_claim`] takes it, checks the cap and
/// cooldown, and hands the held lock out as a [`ClaimToken`]. Attempts for the same wallet
/// therefore run one at a time from limit check to commit, while different wallets never
/// contend beyond the brief map lookup.
///
/// A wallet stays in the map only while it has a committed purchase or an attempt in flight.
#[derive(Default)]
pub struct WalletLedger {
    cells: Cells,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, wallet: &str) -> WalletCell {
        let mut cells = self.cells.lock();
        if let Some(cell) = cells.get(wallet) {
            return Arc::clone(cell);
        }
        let cell: WalletCell = Arc::new(AsyncMutex::new(None));
        cells.insert(wallet.to_string(), Arc::clone(&cell));
        cell
    }

    /// Waits for any earlier attempt by `wallet` to finish, then checks the per-wallet cap and
    /// cooldown against `now`. Nothing is mutated until the returned token is committed.
    pub async fn try_claim(
        &self,
        wallet: &str,
        now: DateTime<Utc>,
        config: &SaleConfig,
    ) -> Result<ClaimToken, RejectReason> {
        let cell = self.cell(wallet);
        let guard = Arc::clone(&cell).lock_owned().await;
        let token = ClaimToken {
            wallet: wallet.to_string(),
            cell,
            guard,
            cells: Arc::clone(&self.cells),
        };
        // A rejected token is dropped here, which forgets a wallet that never purchased.
        check_limits(token.guard.as_ref(), now, config)?;
        Ok(token)
    }

    /// Waits for an in-flight attempt by `wallet` to settle.
    pub async fn record(&self, wallet: &str) -> Option<WalletRecord> {
        let cell = self.cells.lock().get(wallet).cloned()?;
        let record = cell.lock().await.clone();
        if record.is_none() {
            forget_if_idle(&self.cells, wallet, &cell, 1);
        }
        record
    }

    /// Number of wallets currently held in the map, purchased or in flight.
    pub fn tracked_wallets(&self) -> usize {
        self.cells.lock().len()
    }

    pub async fn records(&self) -> Vec<WalletRecord> {
        let cells: Vec<WalletCell> = self.cells.lock().values().cloned().collect();
        let mut records = Vec::with_capacity(cells.len());
        for cell in cells {
            if let Some(record) = cell.lock().await.clone() {
                records.push(record);
            }
        }
        records
    }

    /// Forgets every wallet and returns how many had purchases. Callers must ensure no claim
    /// is outstanding.
    pub fn reset(&self) -> usize {
        let drained: Vec<WalletCell> = self.cells.lock().drain().map(|(_, cell)| cell).collect();
        drained
            .iter()
            .filter(|cell| cell.try_lock().map(|g| g.is_some()).unwrap_or(true))
            .count()
    }
}

/// Drops `wallet` from the map when `cell` is still its entry and nobody but the map and the
/// caller's `holders` references it. New references are only handed out under the map lock, so
/// the count cannot grow while it is checked.
fn forget_if_idle(
    cells: &Mutex<HashMap<WalletId, WalletCell>>,
    wallet: &str,
    cell: &WalletCell,
    holders: usize,
) {
    let mut cells = cells.lock();
    let idle = cells.get(wallet).is_some_and(|current| {
        Arc::ptr_eq(current, cell) && Arc::strong_count(cell) == holders + 1
    });
    if idle {
        cells.remove(wallet);
    }
}

fn check_limits(
    record: Option<&WalletRecord>,
    now: DateTime<Utc>,
    config: &SaleConfig,
) -> Result<(), RejectReason> {
    let purchase_count = record.map_or(0, |r| r.purchase_count);
    if purchase_count >= config.max_per_wallet {
        return Err(RejectReason::WalletLimitExceeded);
    }
    if let Some(last) = record.and_then(|r| r.last_purchase_at) {
        // A purchase stamped after `now` (clock skew) still counts as inside the cooldown.
        if now.signed_duration_since(last) < config.cooldown() {
            return Err(RejectReason::CooldownActive);
        }
    }
    Ok(())
}

/// Exclusive claim on one wallet's record. Dropping it without [`ClaimToken::commit`] leaves the
/// record untouched, which is also what happens when the owning future is cancelled.
pub struct ClaimToken {
    wallet: WalletId,
    cell: WalletCell,
    guard: OwnedMutexGuard<Option<WalletRecord>>,
    cells: Cells,
}

impl ClaimToken {
    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    /// Records an admitted purchase. `slot` is `None` when the slot could not be determined;
    /// the previously claimed slot is kept in that case.
    pub fn commit(mut self, now: DateTime<Utc>, slot: Option<Slot>) -> WalletRecord {
        let ClaimToken { wallet, guard, .. } = &mut self;
        let record = guard.get_or_insert_with(|| WalletRecord::new(wallet));
        record.purchase_count += 1;
        record.last_purchase_at = Some(now);
        if slot.is_some() {
            record.last_slot_claimed = slot;
        }
        record.clone()
    }

    /// Gives the claim up without recording anything.
    pub fn release(self) {}
}

impl Drop for ClaimToken {
    fn drop(&mut self) {
        if self.guard.is_none() {
            // Held by the map, this token's cell handle and the guard itself.
            forget_if_idle(&self.cells, &self.wallet, &self.cell, 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_per_wallet: u64, cooldown_sec: u64) -> SaleConfig {
        SaleConfig {
            token_mint: "M".to_string(),
            sale_start_iso: "2025-11-10T00:00:00Z".to_string(),
            duration_sec: 3600,
            max_per_wallet,
            cooldown_sec,
            ..SaleConfig::default()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn commit_updates_record() {
        let ledger = WalletLedger::new();
        let cfg = config(2, 0);

        let token = ledger.try_claim("A", at(10), &cfg).await.unwrap();
        let record = token.commit(at(10), Some(42));
        assert_eq!(record.purchase_count, 1);
        assert_eq!(record.last_slot_claimed, Some(42));

        let token = ledger.try_claim("A", at(11), &cfg).await.unwrap();
        token.commit(at(11), None);
        let record = ledger.record("A").await.unwrap();
        assert_eq!(record.purchase_count, 2);
        assert_eq!(record.last_purchase_at, Some(at(11)));
        assert_eq!(record.last_slot_claimed, Some(42));
    }

    #[tokio::test]
    async fn released_claim_leaves_no_trace() {
        let ledger = WalletLedger::new();
        let cfg = config(1, 0);

        ledger.try_claim("A", at(0), &cfg).await.unwrap().release();
        drop(ledger.try_claim("A", at(0), &cfg).await.unwrap());

        assert!(ledger.record("A").await.is_none());
        assert!(ledger.records().await.is_empty());
        assert!(ledger.try_claim("A", at(0), &cfg).await.is_ok());
    }

    #[tokio::test]
    async fn cap_is_checked_before_cooldown() {
        let ledger = WalletLedger::new();
        let cfg = config(1, 60);
        ledger.try_claim("A", at(0), &cfg).await.unwrap().commit(at(0), Some(1));

        let err = ledger.try_claim("A", at(1), &cfg).await.err();
        assert_eq!(err, Some(RejectReason::WalletLimitExceeded));
    }

    #[tokio::test]
    async fn cooldown_is_half_open() {
        let ledger = WalletLedger::new();
        let cfg = config(5, 5);
        ledger.try_claim("A", at(0), &cfg).await.unwrap().commit(at(0), Some(1));

        assert_eq!(
            ledger.try_claim("A", at(4), &cfg).await.err(),
            Some(RejectReason::CooldownActive)
        );
        assert!(ledger.try_claim("A", at(5), &cfg).await.is_ok());
    }

    #[tokio::test]
    async fn clock_skew_counts_as_cooldown() {
        let ledger = WalletLedger::new();
        let cfg = config(5, 0);
        ledger.try_claim("A", at(100), &cfg).await.unwrap().commit(at(100), Some(1));

        assert_eq!(
            ledger.try_claim("A", at(99), &cfg).await.err(),
            Some(RejectReason::CooldownActive)
        );
    }

    #[tokio::test]
    async fn zero_cap_admits_nothing() {
        let ledger = WalletLedger::new();
        assert_eq!(
            ledger.try_claim("A", at(0), &config(0, 0)).await.err(),
            Some(RejectReason::WalletLimitExceeded)
        );
    }

    #[tokio::test]
    async fn second_claim_waits_for_first() {
        let ledger = Arc::new(WalletLedger::new());
        let cfg = config(1, 0);

        let first = ledger.try_claim("A", at(0), &cfg).await.unwrap();
        let waiter = {
            let ledger = Arc::clone(&ledger);
            let cfg = cfg.clone();
            tokio::spawn(async move { ledger.try_claim("A", at(0), &cfg).await.err() })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        first.commit(at(0), Some(9));
        assert_eq!(waiter.await.unwrap(), Some(RejectReason::WalletLimitExceeded));
    }

    #[tokio::test]
    async fn rejected_and_released_wallets_are_forgotten() {
        let ledger = WalletLedger::new();
        for i in 0..10_000 {
            let wallet = format!("capped-{i}");
            assert!(ledger.try_claim(&wallet, at(0), &config(0, 0)).await.is_err());
        }
        for i in 0..5_000 {
            let wallet = format!("lost-{i}");
            let token = ledger.try_claim(&wallet, at(0), &config(1, 0)).await.unwrap();
            if i % 2 == 0 {
                token.release();
            } else {
                drop(token);
            }
        }
        assert_eq!(ledger.tracked_wallets(), 0);

        ledger.try_claim("A", at(0), &config(1, 0)).await.unwrap().commit(at(0), Some(1));
        assert_eq!(
            ledger.try_claim("A", at(1), &config(1, 0)).await.err(),
            Some(RejectReason::WalletLimitExceeded)
        );
        assert_eq!(ledger.tracked_wallets(), 1);
    }

    #[tokio::test]
    async fn queued_claim_survives_release_ahead_of_it() {
        let ledger = Arc::new(WalletLedger::new());
        let cfg = config(1, 0);

        let first = ledger.try_claim("A", at(0), &cfg).await.unwrap();
        let waiter = {
            let ledger = Arc::clone(&ledger);
            let cfg = cfg.clone();
            tokio::spawn(async move {
                let token = ledger.try_claim("A", at(0), &cfg).await.unwrap();
                token.commit(at(0), Some(7));
            })
        };
        tokio::task::yield_now().await;
        first.release();
        waiter.await.unwrap();

        assert_eq!(ledger.tracked_wallets(), 1);
        assert_eq!(ledger.record("A").await.unwrap().last_slot_claimed, Some(7));
        assert_eq!(
            ledger.try_claim("A", at(1), &cfg).await.err(),
            Some(RejectReason::WalletLimitExceeded)
        );
    }

    #[tokio::test]
    async fn reading_an_unknown_wallet_does_not_track_it() {
        let ledger = WalletLedger::new();
        assert!(ledger.record("ghost").await.is_none());
        assert_eq!(ledger.tracked_wallets(), 0);
    }

    #[tokio::test]
    async fn reset_counts_wallets_with_purchases() {
        let ledger = WalletLedger::new();
        let cfg = config(3, 0);
        ledger.try_claim("A", at(0), &cfg).await.unwrap().commit(at(0), Some(1));
        ledger.try_claim("B", at(0), &cfg).await.unwrap().commit(at(0), Some(2));
        ledger.try_claim("C", at(0), &cfg).await.unwrap().release();

        assert_eq!(ledger.reset(), 2);
        assert!(ledger.record("A").await.is_none());
    }
}
