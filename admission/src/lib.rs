// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Purchase admission for a timed token sale.
//!
//! [`AdmissionEngine`] owns the active [`SaleConfigStore`] and a [`SaleSession`] (wallet ledger
//! plus slot reservation table) and turns each purchase attempt into a
//! [`core_types::Decision`]. Concurrent attempts are safe: a wallet never exceeds its cap or
//! cooldown and no slot is admitted twice.

mod config_store;
mod engine;
mod error;
mod session;
mod slot_table;
mod wallet_ledger;

use core_types::SaleEvent;
use event_sink::EventSink;
use log::warn;
use metrics::AdmissionMetrics;

pub use config_store::SaleConfigStore;
pub use engine::{AdmissionEngine, DEFAULT_ORACLE_TIMEOUT, EngineSettings, PurchaseAttempt};
pub use error::{ConfigStoreError, UpstreamUnavailable};
pub use session::{ResetSummary, SaleSession, SessionGuard};
pub use slot_table::SlotReservationTable;
pub use wallet_ledger::{ClaimToken, WalletLedger, WalletRecord};

/// Fire-and-forget: a sink failure is logged and counted, never surfaced to the caller.
pub(crate) fn publish(sink: &dyn EventSink, metrics: &AdmissionMetrics, event: SaleEvent) {
    let kind = event.kind;
    if let Err(err) = sink.record(event) {
        metrics.inc_event_sink_failures();
        warn!("[admission] {} dropped {:?} event: {}", sink.name(), kind, err);
    }
}
