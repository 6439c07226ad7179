// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Listeners of the webhook and metrics routers.
//!
//! Both listeners share one [`Handle`], so a single shutdown signal drains
//! them together.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::info;

use crate::errors::ServerError;

/// Time in-flight admission requests get to finish after a shutdown signal.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Loads the serving certificate and key.
///
/// # Errors
///
/// Returns [`ServerError::MissingTlsFile`] if a file doesn't exist and
/// [`ServerError::Tls`] if the PEM data can't be loaded.
pub async fn load_tls_config(cert: &Path, key: &Path) -> Result<RustlsConfig, ServerError> {
    for path in [cert, key] {
        if !path.is_file() {
            return Err(ServerError::MissingTlsFile {
                path: path.to_path_buf(),
            });
        }
    }
    RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(|source| ServerError::Tls {
            cert: cert.to_path_buf(),
            source,
        })
}

/// Serves `router` on `address` until `handle` shuts down.
///
/// Plain HTTP is used when `tls` is `None`.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if binding or serving fails.
pub async fn serve(
    address: SocketAddr,
    router: Router,
    tls: Option<RustlsConfig>,
    handle: Handle,
) -> Result<(), ServerError> {
    let service = router.into_make_service();
    let result = match tls {
        Some(config) => {
            info!(address = %address, "Serving HTTPS");
            axum_server::bind_rustls(address, config)
                .handle(handle)
                .serve(service)
                .await
        }
        None => {
            info!(address = %address, "Serving HTTP");
            axum_server::bind(address).handle(handle).serve(service).await
        }
    };
    result.map_err(|source| ServerError::Serve { address, source })
}

/// Waits for SIGTERM or Ctrl-C, then starts a graceful shutdown of `handle`.
pub async fn shutdown_on_signal(handle: Handle) {
    wait_for_signal().await;
    info!(grace_period = ?SHUTDOWN_GRACE_PERIOD, "Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl-C only");
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
