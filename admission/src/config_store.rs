// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_types::{SaleConfig, SaleEvent};
use event_sink::EventSink;
use log::{info, warn};
use metrics::AdmissionMetrics;
use parking_lot::RwLock;

use crate::{error::ConfigStoreError, publish};

/// Holds the single active sale configuration.
///
/// Readers get an `Arc` snapshot, so an evaluation keeps seeing the config it started with
/// even if an operator replaces it halfway through.
pub struct SaleConfigStore {
    current: RwLock<Option<Arc<SaleConfig>>>,
    events: Arc<dyn EventSink>,
    metrics: Arc<AdmissionMetrics>,
}

impl SaleConfigStore {
    pub fn new(events: Arc<dyn EventSink>, metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            current: RwLock::new(None),
            events,
            metrics,
        }
    }

    /// Validates and installs `config`, replacing any previous one. A refused config leaves the
    /// previous one active.
    pub fn set(
        &self,
        config: SaleConfig,
        now: DateTime<Utc>,
    ) -> Result<Arc<SaleConfig>, ConfigStoreError> {
        if let Err(err) = config.validate() {
            self.metrics.inc_config_rejections();
            warn!("[admission] refused sale config: {}", err);
            return Err(err.into());
        }

        let config = Arc::new(config);
        *self.current.write() = Some(Arc::clone(&config));
        self.metrics.inc_config_updates();
        info!(
            "[admission] sale config saved: mint={} start={} duration={}s max_per_wallet={} cooldown={}s whitelist={}",
            config.token_mint,
            config.sale_start_iso,
            config.duration_sec,
            config.max_per_wallet,
            config.cooldown_sec,
            if config.whitelist_enabled {
                config.whitelist_addresses.len().to_string()
            } else {
                "off".to_string()
            }
        );
        publish(
            self.events.as_ref(),
            &self.metrics,
            SaleEvent::config_saved(&config, now),
        );
        Ok(config)
    }

    pub fn get(&self) -> Result<Arc<SaleConfig>, ConfigStoreError> {
        self.snapshot().ok_or(ConfigStoreError::NotConfigured)
    }

    pub fn snapshot(&self) -> Option<Arc<SaleConfig>> {
        self.current.read().clone()
    }
}
