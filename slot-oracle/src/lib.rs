// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Sources of the "current slot" used as the per-block uniqueness token.

mod manual;
mod rpc;

use std::time::Duration;

use async_trait::async_trait;
use core_types::Slot;
use thiserror::Error;

pub use manual::ManualSlotOracle;
pub use rpc::{DEFAULT_REQUEST_TIMEOUT, RpcSlotOracle};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("invalid rpc endpoint '{endpoint}': {detail}")]
    InvalidEndpoint { endpoint: String, detail: String },
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("rpc response carried neither result nor error")]
    MissingResult,
    #[error("slot oracle timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("slot oracle unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the externally sequenced slot number. May be slow or fail.
#[async_trait]
pub trait SlotOracle: Send + Sync + 'static {
    async fn current_slot(&self) -> Result<Slot, OracleError>;

    fn describe(&self) -> String {
        "slot oracle".to_string()
    }
}
