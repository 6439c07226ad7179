// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP surface of the webhook server.
//!
//! Two routers are built here:
//!
//! - [`webhook_router`]: the HTTPS admission endpoints called by the API server
//!   (`/validate`, `/mutate`, `/convert`) plus the kubelet probes.
//! - [`metrics_router`]: `/metrics` in Prometheus text format on its own
//!   plain-HTTP listener.
//!
//! Handlers share one immutable [`WebhookState`]; every request works on its
//! own copy of the admitted object.

pub mod convert;
pub mod mutate;
pub mod server;
pub mod startup;
pub mod validate;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tracing::error;

use crate::cluster::ClusterClient;
use crate::metrics::gather_metrics;
use crate::mutation::{InjectionSettings, PodWebhook};
use crate::validation::Validator;

/// Shared state of the admission handlers.
pub struct WebhookState {
    pub validator: Validator,
    pub pods: PodWebhook,
}

impl WebhookState {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, settings: InjectionSettings) -> Self {
        Self {
            validator: Validator::new(client.clone(), settings.modules),
            pods: PodWebhook::new(client, settings),
        }
    }
}

/// Router of the admission endpoints and probes.
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate::validate_handler))
        .route("/mutate", post(mutate::mutate_handler))
        .route("/convert", post(convert::convert_handler))
        .route("/healthz", get(probe_handler))
        .route("/readyz", get(probe_handler))
        .with_state(state)
}

/// Router of the metrics listener.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn probe_handler() -> &'static str {
    "ok"
}

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
