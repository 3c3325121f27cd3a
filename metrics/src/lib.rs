// Copyright (c) James Kassemi, SC, US. All rights reserved.
//! Prometheus metrics for admission decisions and the slot oracle.

use std::time::Duration;

use core_types::{Decision, RejectReason};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

const OUTCOME_ACCEPTED: &str = "accepted";
const OUTCOME_DEGRADED: &str = "accepted_degraded";
const OUTCOME_REJECTED: &str = "rejected";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics text is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Owns its registry so several engines (and tests) can coexist in one process.
pub struct AdmissionMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    oracle_failures: IntCounter,
    oracle_latency: Histogram,
    config_updates: IntCounter,
    config_rejections: IntCounter,
    session_resets: IntCounter,
    event_sink_failures: IntCounter,
}

impl AdmissionMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let decisions = IntCounterVec::new(
            Opts::new(
                "sale_decisions_total",
                "Purchase admission decisions by outcome and rejection reason",
            ),
            &["outcome", "reason"],
        )?;
        let oracle_failures = IntCounter::new(
            "sale_slot_oracle_failures_total",
            "Slot oracle queries that failed or timed out",
        )?;
        let oracle_latency = Histogram::with_opts(
            HistogramOpts::new(
                "sale_slot_oracle_latency_seconds",
                "Latency of slot oracle queries, including failures",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        let config_updates = IntCounter::new(
            "sale_config_updates_total",
            "Sale configurations accepted",
        )?;
        let config_rejections = IntCounter::new(
            "sale_config_rejections_total",
            "Sale configurations refused as invalid",
        )?;
        let session_resets = IntCounter::new(
            "sale_session_resets_total",
            "Administrative resets of the wallet ledger and slot table",
        )?;
        let event_sink_failures = IntCounter::new(
            "sale_event_sink_failures_total",
            "Events the sink refused or dropped",
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(oracle_failures.clone()))?;
        registry.register(Box::new(oracle_latency.clone()))?;
        registry.register(Box::new(config_updates.clone()))?;
        registry.register(Box::new(config_rejections.clone()))?;
        registry.register(Box::new(session_resets.clone()))?;
        registry.register(Box::new(event_sink_failures.clone()))?;

        for reason in RejectReason::ALL {
            decisions.with_label_values(&[OUTCOME_REJECTED, reason.label()]);
        }
        decisions.with_label_values(&[OUTCOME_ACCEPTED, ""]);
        decisions.with_label_values(&[OUTCOME_DEGRADED, ""]);

        Ok(Self {
            registry,
            decisions,
            oracle_failures,
            oracle_latency,
            config_updates,
            config_rejections,
            session_resets,
            event_sink_failures,
        })
    }

    pub fn record_decision(&self, decision: &Decision) {
        let (outcome, reason) = decision_labels(decision);
        self.decisions.with_label_values(&[outcome, reason]).inc();
    }

    pub fn record_oracle_query(&self, elapsed: Duration, ok: bool) {
        self.oracle_latency.observe(elapsed.as_secs_f64());
        if !ok {
            self.oracle_failures.inc();
        }
    }

    pub fn inc_config_updates(&self) {
        self.config_updates.inc();
    }

    pub fn inc_config_rejections(&self) {
        self.config_rejections.inc();
    }

    pub fn inc_session_resets(&self) {
        self.session_resets.inc();
    }

    pub fn inc_event_sink_failures(&self) {
        self.event_sink_failures.inc();
    }

    /// Counter value for the outcome/reason bucket `decision` falls in.
    pub fn decisions(&self, decision: &Decision) -> u64 {
        let (outcome, reason) = decision_labels(decision);
        self.decisions.with_label_values(&[outcome, reason]).get()
    }

    pub fn oracle_failures(&self) -> u64 {
        self.oracle_failures.get()
    }

    pub fn session_resets(&self) -> u64 {
        self.session_resets.get()
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn decision_labels(decision: &Decision) -> (&'static str, &'static str) {
    match decision {
        Decision::Accepted { note: None, .. } => (OUTCOME_ACCEPTED, ""),
        Decision::Accepted { note: Some(_), .. } => (OUTCOME_DEGRADED, ""),
        Decision::Rejected(reason) => (OUTCOME_REJECTED, reason.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_decisions_by_outcome() {
        let metrics = AdmissionMetrics::new().unwrap();
        metrics.record_decision(&Decision::accepted(1));
        metrics.record_decision(&Decision::accepted(2));
        metrics.record_decision(&Decision::degraded());
        metrics.record_decision(&Decision::Rejected(RejectReason::SlotCollision));

        assert_eq!(metrics.decisions(&Decision::accepted(0)), 2);
        assert_eq!(metrics.decisions(&Decision::degraded()), 1);
        assert_eq!(
            metrics.decisions(&Decision::Rejected(RejectReason::SlotCollision)),
            1
        );
        assert_eq!(
            metrics.decisions(&Decision::Rejected(RejectReason::CooldownActive)),
            0
        );
    }

    #[test]
    fn render_exposes_registered_families() {
        let metrics = AdmissionMetrics::new().unwrap();
        metrics.record_oracle_query(Duration::from_millis(40), false);
        metrics.inc_session_resets();
        let text = metrics.render().unwrap();
        assert!(text.contains("sale_decisions_total"));
        assert!(text.contains("sale_slot_oracle_failures_total 1"));
        assert!(text.contains("sale_session_resets_total 1"));
        assert!(text.contains("reason=\"slot_collision\""));
    }

    #[test]
    fn independent_registries_do_not_collide() {
        let a = AdmissionMetrics::new().unwrap();
        let b = AdmissionMetrics::new().unwrap();
        a.inc_session_resets();
        assert_eq!(a.session_resets(), 1);
        assert_eq!(b.session_resets(), 0);
    }
}
