// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `POST /mutate`: pod injection.
//!
//! The pod webhook works on a typed copy of the pod; the response carries the
//! JSON patch between the admitted pod and the mutated copy. Only transient
//! API errors deny the pod. Every other failure admits it unchanged so that
//! a broken `DynaKube` never blocks workloads.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use k8s_openapi::api::core::v1::Pod;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use tracing::{debug, error, warn};

use crate::errors::InjectionError;
use crate::metrics::{
    record_admission, OUTCOME_SKIPPED, RESULT_ALLOWED, RESULT_ERROR, RESULT_PATCHED,
    RESULT_SKIPPED, WEBHOOK_MUTATE,
};
use crate::mutation::{MutationResult, PodWebhook};
use crate::webhook::WebhookState;

/// Axum handler of the pod mutating webhook.
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let start = Instant::now();
    let request: AdmissionRequest<Pod> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Received malformed admission review");
            record_admission(WEBHOOK_MUTATE, RESULT_ERROR, start.elapsed());
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let (response, result) = mutate(&state.pods, &request).await;
    record_admission(WEBHOOK_MUTATE, result, start.elapsed());
    Json(response.into_review())
}

/// Mutates the pod of one admission request and returns the response with its metric label.
pub async fn mutate(
    pods: &PodWebhook,
    request: &AdmissionRequest<Pod>,
) -> (AdmissionResponse, &'static str) {
    let response = AdmissionResponse::from(request);
    if !matches!(request.operation, Operation::Create) {
        return (response, RESULT_ALLOWED);
    }
    let Some(pod) = request.object.as_ref() else {
        return (response, RESULT_ALLOWED);
    };

    let namespace = request
        .namespace
        .clone()
        .or_else(|| pod.metadata.namespace.clone())
        .unwrap_or_default();
    let pod_name = pod
        .metadata
        .name
        .clone()
        .or_else(|| pod.metadata.generate_name.clone())
        .unwrap_or_default();

    match pods.mutate(pod.clone(), &namespace).await {
        Ok(MutationResult::Unchanged { message }) => {
            debug!(namespace = %namespace, pod = %pod_name, "Pod admitted without changes");
            (with_message(response, message), RESULT_ALLOWED)
        }
        Ok(MutationResult::Mutated {
            pod: mutated,
            outcome,
            ..
        }) => {
            let label = if outcome == OUTCOME_SKIPPED {
                RESULT_SKIPPED
            } else {
                RESULT_PATCHED
            };
            match patch_response(response, pod, &mutated) {
                Ok(response) => (response, label),
                Err(e) => failure(AdmissionResponse::from(request), &namespace, &pod_name, &e),
            }
        }
        Err(e) => failure(response, &namespace, &pod_name, &e),
    }
}

/// Denies on transient errors, admits unchanged with an explanation otherwise.
fn failure(
    response: AdmissionResponse,
    namespace: &str,
    pod_name: &str,
    e: &InjectionError,
) -> (AdmissionResponse, &'static str) {
    if e.is_transient() {
        warn!(namespace = %namespace, pod = %pod_name, error = %e, "Denying pod after transient API error");
        return (
            response.deny(format!(
                "Failed to inject into pod: {pod_name} because {e}, please retry"
            )),
            RESULT_ERROR,
        );
    }
    error!(namespace = %namespace, pod = %pod_name, error = %e, "Admitting pod without injection");
    (
        with_message(
            response,
            Some(format!("Failed to inject into pod: {pod_name} because {e}")),
        ),
        RESULT_ERROR,
    )
}

/// Attaches the JSON patch from `original` to `mutated`.
///
/// # Errors
///
/// Returns [`InjectionError::Patch`] if either pod can't be serialized.
pub fn patch_response(
    response: AdmissionResponse,
    original: &Pod,
    mutated: &Pod,
) -> Result<AdmissionResponse, InjectionError> {
    let before = serde_json::to_value(original).map_err(|e| InjectionError::Patch(e.to_string()))?;
    let after = serde_json::to_value(mutated).map_err(|e| InjectionError::Patch(e.to_string()))?;
    let patch = json_patch::diff(&before, &after);
    if patch.0.is_empty() {
        return Ok(response);
    }
    response
        .with_patch(patch)
        .map_err(|e| InjectionError::Patch(e.to_string()))
}

fn with_message(mut response: AdmissionResponse, message: Option<String>) -> AdmissionResponse {
    if let Some(message) = message {
        response.result.message = message;
    }
    response
}

#[cfg(test)]
#[path = "mutate_tests.rs"]
mod mutate_tests;
