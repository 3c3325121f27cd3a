// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{convert::Infallible, io, net::SocketAddr, sync::Arc, time::Duration};

use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{ApiError, router::SaleApi};

/// Binds `addr`. Split from [`serve`] so callers can learn the bound port first.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ApiError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind { addr, source })
}

/// Accepts connections until `shutdown` fires. Connections already accepted keep running on
/// their own tasks. Accept errors are logged and never end the loop.
pub async fn serve(
    api: Arc<SaleApi>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let local = listener.local_addr()?;
    info!("[sale-api] listening on http://{}", local);
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (socket, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                error!("[sale-api] accept failed: {}", err);
                if let Some(delay) = accept_backoff(&err) {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                continue;
            }
        };
        let io = TokioIo::new(socket);
        let api = Arc::clone(&api);
        let service = service_fn(move |req| {
            let api = Arc::clone(&api);
            async move { Ok::<_, Infallible>(api.handle(req).await) }
        });
        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("[sale-api] error serving {}: {:?}", peer, err);
            }
        });
    }
    info!("[sale-api] stopped accepting on {}", local);
    Ok(())
}

/// Errors tied to a single connection are retried at once. Anything else (usually running out
/// of file descriptors) would fail again immediately, so the loop pauses first.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(Duration::from_secs(1)),
    }
}
