// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! One-way event notification from the admission path to logs and durable stores.
//!
//! The crate exposes:
//! - [`EventSink`]: the collaborator interface every destination implements.
//! - [`EventLog`]: bounded in-memory history, newest first, backing the events endpoint.
//! - [`JsonlEventSink`]: append-only JSON-lines file.
//! - [`EventHub`]: the publisher handed to the engine; stamps ids, feeds the log inline and
//!   durable sinks through a bounded channel drained by [`EventDispatcher`].

mod hub;
mod jsonl;
mod memory;

use core_types::SaleEvent;
use thiserror::Error;

pub use hub::{EventDispatcher, EventHub};
pub use jsonl::JsonlEventSink;
pub use memory::EventLog;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("event channel full; event dropped")]
    ChannelFull,
    #[error("event channel closed")]
    Closed,
}

/// Destination for sale events. Callers treat failures as non-fatal.
pub trait EventSink: Send + Sync + 'static {
    fn record(&self, event: SaleEvent) -> Result<(), SinkError>;

    fn name(&self) -> &'static str;
}
