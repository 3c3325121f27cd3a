// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sale::Slot;

/// Terminal reasons a purchase attempt is refused. Never retried by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotConfigured,
    SaleNotLive,
    NotWhitelisted,
    WalletLimitExceeded,
    CooldownActive,
    SlotCollision,
}

impl RejectReason {
    pub const ALL: [RejectReason; 6] = [
        RejectReason::NotConfigured,
        RejectReason::SaleNotLive,
        RejectReason::NotWhitelisted,
        RejectReason::WalletLimitExceeded,
        RejectReason::CooldownActive,
        RejectReason::SlotCollision,
    ];

    /// Stable snake_case label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::NotConfigured => "not_configured",
            RejectReason::SaleNotLive => "sale_not_live",
            RejectReason::NotWhitelisted => "not_whitelisted",
            RejectReason::WalletLimitExceeded => "wallet_limit_exceeded",
            RejectReason::CooldownActive => "cooldown_active",
            RejectReason::SlotCollision => "slot_collision",
        }
    }

    /// Client-facing error string.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::NotConfigured => "sale not configured",
            RejectReason::SaleNotLive => "sale not live",
            RejectReason::NotWhitelisted => "not whitelisted",
            RejectReason::WalletLimitExceeded => "max per wallet",
            RejectReason::CooldownActive => "cooldown",
            RejectReason::SlotCollision => "per_slot",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Flags an admission made with degraded enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionNote {
    /// The slot oracle failed or timed out; per-slot uniqueness was not enforced.
    #[serde(rename = "slot_rpc_error")]
    SlotUnavailable,
}

impl AdmissionNote {
    pub fn label(&self) -> &'static str {
        match self {
            AdmissionNote::SlotUnavailable => "slot_rpc_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted {
        slot: Option<Slot>,
        note: Option<AdmissionNote>,
    },
    Rejected(RejectReason),
}

impl Decision {
    pub fn accepted(slot: Slot) -> Self {
        Decision::Accepted {
            slot: Some(slot),
            note: None,
        }
    }

    pub fn degraded() -> Self {
        Decision::Accepted {
            slot: None,
            note: Some(AdmissionNote::SlotUnavailable),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Decision::Rejected(reason) => Some(*reason),
            Decision::Accepted { .. } => None,
        }
    }

    pub fn note(&self) -> Option<AdmissionNote> {
        match self {
            Decision::Accepted { note, .. } => *note,
            Decision::Rejected(_) => None,
        }
    }
}

impl From<RejectReason> for Decision {
    fn from(reason: RejectReason) -> Self {
        Decision::Rejected(reason)
    }
}
