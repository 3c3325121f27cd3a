// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const MAX_WARNINGS: usize = 16;

/// Discrete health level exposed by each collaborator the service depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Ok,
    #[default]
    Warn,
    Crit,
}

#[derive(Debug, Clone, Default)]
struct ServiceStatus {
    overall: OverallStatus,
    warnings: Vec<String>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    consecutive_failures: u64,
}

/// Immutable snapshot returned to the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusSnapshot {
    pub name: String,
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u64,
}

/// Shared handle so a component can publish its own health.
#[derive(Clone)]
pub struct ServiceStatusHandle {
    name: &'static str,
    inner: Arc<RwLock<ServiceStatus>>,
}

impl ServiceStatusHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(ServiceStatus::default())),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.name
    }

    fn update<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ServiceStatus),
    {
        let mut guard = self.inner.write();
        mutator(&mut guard);
    }

    pub fn record_success(&self, at: DateTime<Utc>) {
        self.update(|s| {
            s.overall = OverallStatus::Ok;
            s.last_success_at = Some(at);
            s.consecutive_failures = 0;
            s.warnings.clear();
        });
    }

    pub fn record_failure(&self, at: DateTime<Utc>, msg: impl Into<String>) {
        let msg = msg.into();
        self.update(|s| {
            s.overall = OverallStatus::Warn;
            s.last_failure_at = Some(at);
            s.consecutive_failures += 1;
            if s.warnings.len() == MAX_WARNINGS {
                s.warnings.remove(0);
            }
            s.warnings.push(msg);
        });
    }

    pub fn set_overall(&self, status: OverallStatus) {
        self.update(|s| s.overall = status);
    }

    pub fn overall(&self) -> OverallStatus {
        self.inner.read().overall
    }

    pub fn snapshot(&self) -> ServiceStatusSnapshot {
        let guard = self.inner.read();
        ServiceStatusSnapshot {
            name: self.name.to_string(),
            overall: guard.overall,
            warnings: guard.warnings.clone(),
            last_success_at: guard.last_success_at,
            last_failure_at: guard.last_failure_at,
            consecutive_failures: guard.consecutive_failures,
        }
    }
}
