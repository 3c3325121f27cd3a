// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{process, sync::Arc};

use admission::{AdmissionEngine, EngineSettings};
use config::ConfigError;
use core_types::AppConfig;
use event_sink::{EventDispatcher, EventHub, EventLog, EventSink, JsonlEventSink, SinkError};
use log::{error, info};
use metrics::{AdmissionMetrics, MetricsError};
use sale_api::{ApiError, ApiSettings, SaleApi};
use slot_oracle::{OracleError, RpcSlotOracle};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        error!("salegate failed: {err}");
        process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let shutdown = CancellationToken::new();

    let log = Arc::new(EventLog::new(config.event_log_capacity));
    let (hub, dispatcher) = build_event_hub(&config, Arc::clone(&log), shutdown.child_token())?;
    let oracle = RpcSlotOracle::with_timeout(
        &config.rpc_url,
        config.rpc_commitment.clone(),
        config.oracle_timeout(),
    )?;
    let engine = Arc::new(AdmissionEngine::new(
        Arc::new(oracle),
        Arc::new(hub),
        Arc::new(AdmissionMetrics::new()?),
        EngineSettings {
            oracle_timeout: config.oracle_timeout(),
        },
    ));
    let api = Arc::new(SaleApi::new(engine, log, ApiSettings::from_config(&config)));

    let listener = sale_api::bind(config.listen_addr).await?;
    info!(
        "salegate booted; sale routes under {} (dev routes {})",
        config.api_prefix,
        if config.enable_dev_routes { "on" } else { "off" }
    );
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));
    let served = sale_api::serve(api, listener, shutdown.clone()).await;
    shutdown.cancel();

    if let Some(dispatcher) = dispatcher {
        dispatcher.shutdown().await;
    }
    served?;
    info!("salegate stopped");
    Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received; stopping listener..."),
        Err(err) => {
            error!("failed to listen for shutdown signal: {err}");
            return;
        }
    }
    shutdown.cancel();
}

fn build_event_hub(
    config: &AppConfig,
    log: Arc<EventLog>,
    cancel: CancellationToken,
) -> Result<(EventHub, Option<EventDispatcher>), AppError> {
    let Some(path) = &config.events_path else {
        return Ok((EventHub::new(log), None));
    };
    let jsonl = JsonlEventSink::open(path)?;
    info!("Recording sale events to {}", jsonl.path().display());
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(jsonl)];
    let (hub, dispatcher) =
        EventHub::with_durable(log, sinks, config.event_channel_capacity, cancel);
    Ok((hub, Some(dispatcher)))
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Events(#[from] SinkError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
