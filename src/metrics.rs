// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the DynaKube webhooks.
//!
//! All metrics carry the namespace prefix `dynakube_dynatrace_com_`
//! (prometheus-safe version of "dynakube.dynatrace.com").
//!
//! # Metrics Categories
//!
//! - **Admission Metrics** - Requests and latency per webhook endpoint
//! - **Injection Metrics** - Pod injection outcomes per strategy
//! - **Conversion Metrics** - Objects converted between served versions
//!
//! # Example
//!
//! ```rust,no_run
//! use dynakube::metrics::{record_admission, WEBHOOK_VALIDATE, RESULT_ALLOWED};
//!
//! record_admission(WEBHOOK_VALIDATE, RESULT_ALLOWED, std::time::Duration::from_millis(3));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "dynakube_dynatrace_com";

/// `webhook` label of the validating endpoint
pub const WEBHOOK_VALIDATE: &str = "validate";

/// `webhook` label of the mutating endpoint
pub const WEBHOOK_MUTATE: &str = "mutate";

/// `webhook` label of the conversion endpoint
pub const WEBHOOK_CONVERT: &str = "convert";

/// `result` label: admitted without changes
pub const RESULT_ALLOWED: &str = "allowed";

/// `result` label: rejected
pub const RESULT_DENIED: &str = "denied";

/// `result` label: the request could not be processed
pub const RESULT_ERROR: &str = "error";

/// `result` label: admitted with a patch
pub const RESULT_PATCHED: &str = "patched";

/// `result` label: admitted without injection on purpose
pub const RESULT_SKIPPED: &str = "skipped";

/// `outcome` label: first injection into a pod
pub const OUTCOME_INJECTED: &str = "injected";

/// `outcome` label: reinvocation that updated new containers
pub const OUTCOME_REINVOKED: &str = "reinvoked";

/// `outcome` label: injection skipped with a reason annotation
pub const OUTCOME_SKIPPED: &str = "skipped";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Admission Metrics
// ============================================================================

/// Total number of admission requests by webhook and result
///
/// Labels:
/// - `webhook`: `validate`, `mutate` or `convert`
/// - `result`: `allowed`, `denied`, `error`, `patched` or `skipped`
pub static ADMISSION_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_admission_requests_total"),
        "Total number of admission requests by webhook and result",
    );
    let counter = CounterVec::new(opts, &["webhook", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of admission request handling in seconds
///
/// Labels:
/// - `webhook`: `validate`, `mutate` or `convert`
pub static ADMISSION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_admission_duration_seconds"),
        "Duration of admission request handling in seconds by webhook",
    )
    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["webhook"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Injection Metrics
// ============================================================================

/// Total number of pod injections by strategy and outcome
///
/// Labels:
/// - `strategy`: `v1` (init-container installer) or `v2` (bootstrapper)
/// - `outcome`: `injected`, `reinvoked` or `skipped`
pub static INJECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_injections_total"),
        "Total number of pod injections by strategy and outcome",
    );
    let counter = CounterVec::new(opts, &["strategy", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Conversion Metrics
// ============================================================================

/// Total number of converted objects
///
/// Labels:
/// - `from`: source API version
/// - `to`: desired API version
/// - `result`: `success` or `error`
pub static CONVERSIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_conversions_total"),
        "Total number of DynaKube objects converted between versions",
    );
    let counter = CounterVec::new(opts, &["from", "to", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a handled admission request
///
/// # Arguments
/// * `webhook` - Endpoint that handled the request (e.g., `validate`)
/// * `result` - Outcome (e.g., `allowed`, `denied`)
/// * `duration` - Time spent handling the request
pub fn record_admission(webhook: &str, result: &str, duration: Duration) {
    ADMISSION_REQUESTS_TOTAL
        .with_label_values(&[webhook, result])
        .inc();
    ADMISSION_DURATION_SECONDS
        .with_label_values(&[webhook])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of a pod injection
pub fn record_injection(strategy: &str, outcome: &str) {
    INJECTIONS_TOTAL
        .with_label_values(&[strategy, outcome])
        .inc();
}

/// Record a converted object
pub fn record_conversion(from: &str, to: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    CONVERSIONS_TOTAL
        .with_label_values(&[from, to, result])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_admission() {
        let before = ADMISSION_REQUESTS_TOTAL
            .with_label_values(&[WEBHOOK_VALIDATE, RESULT_DENIED])
            .get();

        record_admission(WEBHOOK_VALIDATE, RESULT_DENIED, Duration::from_millis(5));

        let after = ADMISSION_REQUESTS_TOTAL
            .with_label_values(&[WEBHOOK_VALIDATE, RESULT_DENIED])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_record_injection() {
        record_injection("v2", OUTCOME_REINVOKED);
        let count = INJECTIONS_TOTAL
            .with_label_values(&["v2", OUTCOME_REINVOKED])
            .get();
        assert!(count >= 1.0);
    }

    #[test]
    fn test_gather_metrics_contains_prefix() {
        record_conversion("dynatrace.com/v1beta4", "dynatrace.com/v1beta5", true);
        let text = gather_metrics().unwrap();
        assert!(text.contains("dynakube_dynatrace_com_conversions_total"));
    }
}
