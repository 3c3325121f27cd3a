// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared sale rules, admission decisions, events, and service configuration.

pub mod config;
pub mod decision;
pub mod event;
pub mod sale;
pub mod status;

pub use config::AppConfig;
pub use decision::{AdmissionNote, Decision, RejectReason};
pub use event::{EventKind, SaleEvent};
pub use sale::{SaleConfig, SaleConfigError, SaleWindow, Slot, WalletId, parse_timestamp};
pub use status::{OverallStatus, ServiceStatusHandle, ServiceStatusSnapshot};
