// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use core_types::SaleEvent;
use log::{error, info, warn};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{EventLog, EventSink, SinkError};

type SinkSet = Arc<Vec<Arc<dyn EventSink>>>;

/// Publisher handed to the admission path. Never blocks the caller.
pub struct EventHub {
    log: Arc<EventLog>,
    durable: Option<mpsc::Sender<SaleEvent>>,
    next_id: AtomicU64,
}

impl EventHub {
    /// In-memory log only.
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            durable: None,
            next_id: AtomicU64::new(0),
        }
    }

    /// Also fans events out to `sinks` from a background task. Must be called inside a tokio
    /// runtime.
    pub fn with_durable(
        log: Arc<EventLog>,
        sinks: Vec<Arc<dyn EventSink>>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, EventDispatcher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dispatcher = EventDispatcher::spawn(rx, Arc::new(sinks), cancel);
        let hub = Self {
            log,
            durable: Some(tx),
            next_id: AtomicU64::new(0),
        };
        (hub, dispatcher)
    }

    pub fn log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }
}

impl EventSink for EventHub {
    fn record(&self, mut event: SaleEvent) -> Result<(), SinkError> {
        event.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        match &self.durable {
            Some(tx) => {
                self.log.record(event.clone())?;
                tx.try_send(event).map_err(|err| match err {
                    TrySendError::Full(_) => SinkError::ChannelFull,
                    TrySendError::Closed(_) => SinkError::Closed,
                })
            }
            None => self.log.record(event),
        }
    }

    fn name(&self) -> &'static str {
        "event_hub"
    }
}

/// Background drain of the durable channel.
pub struct EventDispatcher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl EventDispatcher {
    fn spawn(
        rx: mpsc::Receiver<SaleEvent>,
        sinks: SinkSet,
        cancel: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(run_dispatcher(rx, sinks, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stops accepting new events, flushes what is queued, then returns.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            error!("[event-sink] dispatcher task failed: {}", err);
        }
    }
}

async fn run_dispatcher(
    mut rx: mpsc::Receiver<SaleEvent>,
    sinks: SinkSet,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };
        deliver(&sinks, event).await;
    }

    rx.close();
    let mut flushed = 0usize;
    while let Ok(event) = rx.try_recv() {
        deliver(&sinks, event).await;
        flushed += 1;
    }
    info!("[event-sink] dispatcher stopped; flushed {} queued events", flushed);
}

async fn deliver(sinks: &SinkSet, event: SaleEvent) {
    let sinks = Arc::clone(sinks);
    let id = event.id;
    let outcome = tokio::task::spawn_blocking(move || {
        for sink in sinks.iter() {
            if let Err(err) = sink.record(event.clone()) {
                warn!(
                    "[event-sink] {} failed to record event {}: {}",
                    sink.name(),
                    event.id,
                    err
                );
            }
        }
    })
    .await;
    if let Err(err) = outcome {
        error!("[event-sink] delivery of event {} panicked: {}", id, err);
    }
}
