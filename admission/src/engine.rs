// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use core_types::{
    Decision, RejectReason, SaleConfig, SaleEvent, ServiceStatusHandle, Slot, WalletId,
};
use event_sink::EventSink;
use log::{debug, info, warn};
use metrics::AdmissionMetrics;
use slot_oracle::{OracleError, SlotOracle};
use tokio::time::{Instant, timeout};

use crate::{
    config_store::SaleConfigStore,
    error::{ConfigStoreError, UpstreamUnavailable},
    publish,
    session::{ResetSummary, SaleSession},
    wallet_ledger::WalletRecord,
};

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub oracle_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }
}

/// One purchase attempt. `amount` is carried into the purchase event and never checked.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseAttempt {
    pub buyer: WalletId,
    pub amount: Option<f64>,
}

impl PurchaseAttempt {
    pub fn new(buyer: impl Into<WalletId>) -> Self {
        Self {
            buyer: buyer.into(),
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: Option<f64>) -> Self {
        self.amount = amount;
        self
    }
}

/// Decides whether purchase attempts are admitted.
///
/// Checks run in a fixed order: config present, sale window, whitelist, wallet cap, cooldown,
/// slot uniqueness. The first failure is the rejection reason. A slot oracle that errors or
/// exceeds `oracle_timeout` does not reject; the purchase is admitted without a slot claim and
/// flagged with a note.
pub struct AdmissionEngine {
    config: SaleConfigStore,
    session: SaleSession,
    oracle: Arc<dyn SlotOracle>,
    oracle_status: ServiceStatusHandle,
    events: Arc<dyn EventSink>,
    metrics: Arc<AdmissionMetrics>,
    settings: EngineSettings,
}

impl AdmissionEngine {
    pub fn new(
        oracle: Arc<dyn SlotOracle>,
        events: Arc<dyn EventSink>,
        metrics: Arc<AdmissionMetrics>,
        settings: EngineSettings,
    ) -> Self {
        info!(
            "[admission] engine using {} (timeout {:?})",
            oracle.describe(),
            settings.oracle_timeout
        );
        Self {
            config: SaleConfigStore::new(Arc::clone(&events), Arc::clone(&metrics)),
            session: SaleSession::new(),
            oracle,
            oracle_status: ServiceStatusHandle::new("slot-oracle"),
            events,
            metrics,
            settings,
        }
    }

    pub fn set_config(
        &self,
        config: SaleConfig,
        now: DateTime<Utc>,
    ) -> Result<Arc<SaleConfig>, ConfigStoreError> {
        self.config.set(config, now)
    }

    pub fn config(&self) -> Result<Arc<SaleConfig>, ConfigStoreError> {
        self.config.get()
    }

    pub fn oracle_status(&self) -> &ServiceStatusHandle {
        &self.oracle_status
    }

    pub fn metrics(&self) -> &Arc<AdmissionMetrics> {
        &self.metrics
    }

    pub fn slots_claimed(&self) -> usize {
        self.session.slots_claimed()
    }

    pub async fn wallet(&self, wallet: &str) -> Option<WalletRecord> {
        self.session.enter().await.ledger().record(wallet).await
    }

    /// Evaluates an attempt by `buyer` at `now`.
    pub async fn evaluate(&self, buyer: &str, now: DateTime<Utc>) -> Decision {
        self.evaluate_attempt(&PurchaseAttempt::new(buyer), now)
            .await
    }

    pub async fn evaluate_attempt(&self, attempt: &PurchaseAttempt, now: DateTime<Utc>) -> Decision {
        let decision = self.decide(attempt, now).await;
        self.metrics.record_decision(&decision);
        match &decision {
            Decision::Rejected(reason) => {
                debug!("[admission] {} rejected: {}", attempt.buyer, reason.label());
            }
            Decision::Accepted { slot, note } => {
                debug!(
                    "[admission] {} admitted at slot {:?}{}",
                    attempt.buyer,
                    slot,
                    note.map(|n| format!(" ({})", n.label())).unwrap_or_default()
                );
            }
        }
        decision
    }

    async fn decide(&self, attempt: &PurchaseAttempt, now: DateTime<Utc>) -> Decision {
        let session = self.session.enter().await;
        let Some(config) = self.config.snapshot() else {
            return RejectReason::NotConfigured.into();
        };
        if !config.is_live_at(now) {
            return RejectReason::SaleNotLive.into();
        }
        let buyer = attempt.buyer.as_str();
        if !config.admits_wallet(buyer) {
            return RejectReason::NotWhitelisted.into();
        }

        let claim = match session.ledger().try_claim(buyer, now, &config).await {
            Ok(claim) => claim,
            Err(reason) => return reason.into(),
        };

        match self.current_slot().await {
            Ok(slot) => {
                if !session.slots().claim_if_free(slot, buyer) {
                    claim.release();
                    self.emit(SaleEvent::purchase_rejected(
                        buyer,
                        RejectReason::SlotCollision,
                        Some(slot),
                        now,
                    ));
                    return RejectReason::SlotCollision.into();
                }
                claim.commit(now, Some(slot));
                self.emit(SaleEvent::purchase(buyer, attempt.amount, Some(slot), None, now));
                Decision::accepted(slot)
            }
            Err(err) => {
                warn!(
                    "[admission] admitting {} without slot check: {}",
                    buyer, err
                );
                claim.commit(now, None);
                let decision = Decision::degraded();
                self.emit(SaleEvent::purchase(
                    buyer,
                    attempt.amount,
                    None,
                    decision.note(),
                    now,
                ));
                decision
            }
        }
    }

    async fn current_slot(&self) -> Result<Slot, UpstreamUnavailable> {
        let started = Instant::now();
        let result = match timeout(self.settings.oracle_timeout, self.oracle.current_slot()).await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout {
                after: self.settings.oracle_timeout,
            }),
        };
        self.metrics
            .record_oracle_query(started.elapsed(), result.is_ok());
        match &result {
            Ok(_) => self.oracle_status.record_success(Utc::now()),
            Err(err) => self.oracle_status.record_failure(Utc::now(), err.to_string()),
        }
        result.map_err(UpstreamUnavailable::from)
    }

    /// Clears the wallet ledger and slot table. Waits for in-flight evaluations; the sale config
    /// is kept.
    pub async fn reset(&self, now: DateTime<Utc>) -> ResetSummary {
        let summary = self.session.reset().await;
        self.metrics.inc_session_resets();
        info!(
            "[admission] session reset: {} wallets, {} slots cleared",
            summary.wallets, summary.slots
        );
        self.emit(SaleEvent::dev_reset(now));
        summary
    }

    fn emit(&self, event: SaleEvent) {
        publish(self.events.as_ref(), &self.metrics, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AdmissionNote, EventKind};
    use event_sink::{EventHub, EventLog};
    use slot_oracle::ManualSlotOracle;

    struct Harness {
        engine: AdmissionEngine,
        oracle: Arc<ManualSlotOracle>,
        log: Arc<EventLog>,
    }

    fn harness() -> Harness {
        let oracle = Arc::new(ManualSlotOracle::new(1_000));
        let log = Arc::new(EventLog::new(50));
        let engine = AdmissionEngine::new(
            oracle.clone(),
            Arc::new(EventHub::new(Arc::clone(&log))),
            Arc::new(AdmissionMetrics::new().unwrap()),
            EngineSettings {
                oracle_timeout: Duration::from_millis(200),
            },
        );
        Harness {
            engine,
            oracle,
            log,
        }
    }

    fn start() -> DateTime<Utc> {
        "2025-11-10T00:00:00Z".parse().unwrap()
    }

    fn config() -> SaleConfig {
        SaleConfig {
            token_mint: "Mint111".to_string(),
            sale_start_iso: "2025-11-10T00:00:00Z".to_string(),
            duration_sec: 3600,
            min_per_wallet: 1,
            max_per_wallet: 2,
            cooldown_sec: 5,
            ..SaleConfig::default()
        }
    }

    #[tokio::test]
    async fn rejects_before_configuration() {
        let h = harness();
        assert_eq!(
            h.engine.evaluate("A", start()).await,
            Decision::Rejected(RejectReason::NotConfigured)
        );
    }

    #[tokio::test]
    async fn window_edges_are_inclusive() {
        let h = harness();
        h.engine.set_config(config(), start()).unwrap();
        let before = start() - chrono::TimeDelta::seconds(1);
        let end = start() + chrono::TimeDelta::seconds(3600);
        let after = end + chrono::TimeDelta::seconds(1);

        assert_eq!(
            h.engine.evaluate("A", before).await,
            Decision::Rejected(RejectReason::SaleNotLive)
        );
        assert!(h.engine.evaluate("A", start()).await.is_accepted());
        h.oracle.advance(1);
        assert!(h.engine.evaluate("B", end).await.is_accepted());
        assert_eq!(
            h.engine.evaluate("C", after).await,
            Decision::Rejected(RejectReason::SaleNotLive)
        );
    }

    #[tokio::test]
    async fn whitelist_checked_before_wallet_state() {
        let h = harness();
        h.engine
            .set_config(
                SaleConfig {
                    whitelist_enabled: true,
                    whitelist_addresses: ["A".to_string()].into_iter().collect(),
                    ..config()
                },
                start(),
            )
            .unwrap();

        assert_eq!(
            h.engine.evaluate("B", start()).await,
            Decision::Rejected(RejectReason::NotWhitelisted)
        );
        assert_eq!(h.engine.evaluate("A", start()).await, Decision::accepted(1_000));
        assert!(h.engine.wallet("B").await.is_none());
    }

    #[tokio::test]
    async fn slot_collision_emits_rejection_event() {
        let h = harness();
        h.engine.set_config(config(), start()).unwrap();

        assert_eq!(h.engine.evaluate("A", start()).await, Decision::accepted(1_000));
        assert_eq!(
            h.engine.evaluate("B", start()).await,
            Decision::Rejected(RejectReason::SlotCollision)
        );
        assert!(h.engine.wallet("B").await.is_none());

        let events = h.log.recent();
        assert_eq!(events[0].kind, EventKind::PurchaseRejected);
        assert_eq!(events[0].buyer.as_deref(), Some("B"));
        assert_eq!(events[0].slot, Some(1_000));
        assert_eq!(events[0].reason.as_deref(), Some("per_slot"));
        assert_eq!(events[1].kind, EventKind::Purchase);
    }

    #[tokio::test]
    async fn offline_oracle_admits_with_note() {
        let h = harness();
        h.engine.set_config(config(), start()).unwrap();
        h.oracle.set_offline(true);

        let decision = h
            .engine
            .evaluate_attempt(&PurchaseAttempt::new("A").with_amount(Some(2.5)), start())
            .await;
        assert_eq!(decision, Decision::degraded());
        assert_eq!(decision.note(), Some(AdmissionNote::SlotUnavailable));

        let record = h.engine.wallet("A").await.unwrap();
        assert_eq!(record.purchase_count, 1);
        assert_eq!(record.last_slot_claimed, None);
        assert_eq!(h.engine.slots_claimed(), 0);
        assert_eq!(h.engine.metrics().oracle_failures(), 1);
        assert_eq!(h.engine.oracle_status().snapshot().consecutive_failures, 1);

        let event = &h.log.recent()[0];
        assert_eq!(event.note.as_deref(), Some("slot_rpc_error"));
        assert_eq!(event.amount, Some(2.5));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_times_out_into_degraded_admit() {
        let h = harness();
        h.engine.set_config(config(), start()).unwrap();
        h.oracle.set_delay(Duration::from_secs(10));

        assert_eq!(h.engine.evaluate("A", start()).await, Decision::degraded());
        assert_eq!(h.engine.metrics().oracle_failures(), 1);
    }

    #[tokio::test]
    async fn reset_clears_state_and_keeps_config() {
        let h = harness();
        h.engine.set_config(config(), start()).unwrap();
        assert!(h.engine.evaluate("A", start()).await.is_accepted());

        let summary = h.engine.reset(start()).await;
        assert_eq!(summary, ResetSummary { wallets: 1, slots: 1 });
        assert_eq!(h.log.recent()[0].kind, EventKind::DevReset);

        assert_eq!(h.engine.evaluate("B", start()).await, Decision::accepted(1_000));
        assert_eq!(h.engine.config().unwrap().token_mint, "Mint111");
    }
}
