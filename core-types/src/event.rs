// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Notable sale events published to the event log and durable sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    decision::{AdmissionNote, RejectReason},
    sale::{SaleConfig, Slot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConfigSaved,
    Purchase,
    PurchaseRejected,
    DevReset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    /// Assigned by the publishing hub; zero until stamped.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_mint: Option<String>,
}

impl SaleEvent {
    fn bare(kind: EventKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            kind,
            created_at,
            buyer: None,
            amount: None,
            slot: None,
            note: None,
            reason: None,
            token_mint: None,
        }
    }

    pub fn config_saved(config: &SaleConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            token_mint: Some(config.token_mint.clone()),
            ..Self::bare(EventKind::ConfigSaved, created_at)
        }
    }

    pub fn purchase(
        buyer: &str,
        amount: Option<f64>,
        slot: Option<Slot>,
        note: Option<AdmissionNote>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            buyer: Some(buyer.to_string()),
            amount,
            slot,
            note: note.map(|n| n.label().to_string()),
            ..Self::bare(EventKind::Purchase, created_at)
        }
    }

    pub fn purchase_rejected(
        buyer: &str,
        reason: RejectReason,
        slot: Option<Slot>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            buyer: Some(buyer.to_string()),
            slot,
            reason: Some(reason.message().to_string()),
            ..Self::bare(EventKind::PurchaseRejected, created_at)
        }
    }

    pub fn dev_reset(created_at: DateTime<Utc>) -> Self {
        Self::bare(EventKind::DevReset, created_at)
    }
}
