// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! JSON-over-HTTP surface for the admission engine.

mod response;
mod router;
mod server;

use std::net::SocketAddr;

use thiserror::Error;

pub use response::{ApiResponse, reject_status};
pub use router::{ApiSettings, MAX_BODY_BYTES, METRICS_PATH, SaleApi};
pub use server::{bind, serve};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
