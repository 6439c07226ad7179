// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use anyhow::Result;
use axum_server::Handle;
use clap::Parser;
use dynakube::{
    cluster::{ClusterClient, KubeClusterClient},
    config::WebhookConfig,
    webhook::{
        metrics_router,
        server::{load_tls_config, serve, shutdown_on_signal},
        startup::injection_settings,
        webhook_router, WebhookState,
    },
};
use kube::Client;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = WebhookConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("dynakube-webhook")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

/// Initializes logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or
/// compact text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: WebhookConfig) -> Result<()> {
    initialize_logging();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = %config.namespace,
        "Starting DynaKube webhook"
    );

    // axum-server is built without a default crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    debug!("Initializing Kubernetes client");
    let client: Arc<dyn ClusterClient> = Arc::new(KubeClusterClient::new(Client::try_default().await?));

    let settings = injection_settings(client.clone(), &config).await?;
    let state = Arc::new(WebhookState::new(client, settings));

    let tls = if config.insecure {
        warn!("Serving admission endpoints over plain HTTP");
        None
    } else {
        Some(load_tls_config(&config.cert_path(), &config.key_path()).await?)
    };

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    let webhook = serve(config.bind_address, webhook_router(state), tls, handle.clone());
    let metrics = serve(config.metrics_address, metrics_router(), None, handle.clone());

    // The first listener to stop ends the process
    let result = tokio::select! {
        result = webhook => result,
        result = metrics => result,
    };
    if let Err(e) = &result {
        error!(error = %e, "Listener failed, shutting down");
        handle.shutdown();
    }
    result?;

    info!("DynaKube webhook stopped");
    Ok(())
}
