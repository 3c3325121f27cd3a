// Copyright (c) James Kassemi, SC, US. All rights reserved.

use core_types::SaleConfigError;
use slot_oracle::OracleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] SaleConfigError),
    #[error("sale not configured")]
    NotConfigured,
}

/// Slot oracle failure. Recovered inside the engine by admitting without slot enforcement.
#[derive(Debug, Error)]
#[error("upstream unavailable: {source}")]
pub struct UpstreamUnavailable {
    #[from]
    source: OracleError,
}

impl UpstreamUnavailable {
    pub fn oracle_error(&self) -> &OracleError {
        &self.source
    }
}
