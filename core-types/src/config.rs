// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "salegate";
pub const ENV_PREFIX: &str = "SALEGATE";

/// Service knobs. Sale rules are not configured here; issuers post them at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_rpc_commitment")]
    pub rpc_commitment: String,
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Append-only JSONL event file; disabled when unset.
    #[serde(default)]
    pub events_path: Option<PathBuf>,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_enable_dev_routes")]
    pub enable_dev_routes: bool,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5174))
}

fn default_rpc_url() -> String {
    "https://api.devnet.solana.com".to_string()
}

fn default_rpc_commitment() -> String {
    "confirmed".to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    3_000
}

fn default_event_log_capacity() -> usize {
    100
}

fn default_event_channel_capacity() -> usize {
    1_024
}

fn default_api_prefix() -> String {
    "/api/sale".to_string()
}

fn default_enable_dev_routes() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            rpc_url: default_rpc_url(),
            rpc_commitment: default_rpc_commitment(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            event_log_capacity: default_event_log_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
            events_path: None,
            api_prefix: default_api_prefix(),
            enable_dev_routes: default_enable_dev_routes(),
        }
    }
}

impl AppConfig {
    /// Optional `salegate.toml` in the working directory, overridden by `SALEGATE_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Message("rpc_url is required".to_string()));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "oracle_timeout_ms must be positive".to_string(),
            ));
        }
        if self.event_log_capacity == 0 || self.event_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "event capacities must be positive".to_string(),
            ));
        }
        if !self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/') {
            return Err(ConfigError::Message(format!(
                "api_prefix '{}' must start with '/' and not end with '/'",
                self.api_prefix
            )));
        }
        Ok(())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}
