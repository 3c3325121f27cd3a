// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Issuer-supplied sale rules and the time arithmetic derived from them.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-supplied wallet identifier. Trusted as-is; never verified against a signature.
pub type WalletId = String;

/// Externally sequenced slot number (one per ledger block).
pub type Slot = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleConfigError {
    #[error("tokenMint is required")]
    MissingTokenMint,
    #[error("saleStartISO is required")]
    MissingSaleStart,
    #[error("saleStartISO '{value}' is not a valid timestamp")]
    InvalidSaleStart { value: String },
}

/// Active sale rules. Replaced wholesale on every issuer update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleConfig {
    #[serde(default)]
    pub token_mint: String,
    #[serde(default, rename = "saleStartISO")]
    pub sale_start_iso: String,
    #[serde(default)]
    pub duration_sec: u64,
    /// Stored and echoed back; admission does not enforce a minimum.
    #[serde(default)]
    pub min_per_wallet: u64,
    /// Hard cap on admitted purchases per wallet. Zero admits nothing.
    #[serde(default)]
    pub max_per_wallet: u64,
    #[serde(default)]
    pub cooldown_sec: u64,
    #[serde(default)]
    pub whitelist_enabled: bool,
    #[serde(default)]
    pub whitelist_addresses: BTreeSet<WalletId>,
}

impl SaleConfig {
    pub fn validate(&self) -> Result<(), SaleConfigError> {
        if self.token_mint.trim().is_empty() {
            return Err(SaleConfigError::MissingTokenMint);
        }
        if self.sale_start_iso.trim().is_empty() {
            return Err(SaleConfigError::MissingSaleStart);
        }
        self.sale_start()?;
        Ok(())
    }

    pub fn sale_start(&self) -> Result<DateTime<Utc>, SaleConfigError> {
        parse_timestamp(&self.sale_start_iso).ok_or_else(|| SaleConfigError::InvalidSaleStart {
            value: self.sale_start_iso.clone(),
        })
    }

    /// Inclusive purchase window, or `None` when the start cannot be parsed.
    pub fn window(&self) -> Option<SaleWindow> {
        let start = self.sale_start().ok()?;
        let end = start
            .checked_add_signed(seconds(self.duration_sec))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(SaleWindow { start, end })
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.window().is_some_and(|window| window.contains(now))
    }

    pub fn admits_wallet(&self, wallet: &str) -> bool {
        !self.whitelist_enabled || self.whitelist_addresses.contains(wallet)
    }

    pub fn cooldown(&self) -> TimeDelta {
        seconds(self.cooldown_sec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SaleWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

fn seconds(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Accepts RFC 3339, a zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC), or a bare date
/// (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
