// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `POST /validate`: admission of `DynaKube` objects of any served version.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use tracing::{debug, warn};

use crate::api::conversion::to_hub;
use crate::metrics::{
    record_admission, RESULT_ALLOWED, RESULT_DENIED, RESULT_ERROR, WEBHOOK_VALIDATE,
};
use crate::validation::Validator;
use crate::webhook::WebhookState;

/// Axum handler of the validating webhook.
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let start = Instant::now();
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Received malformed admission review");
            record_admission(WEBHOOK_VALIDATE, RESULT_ERROR, start.elapsed());
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let (response, result) = validate(&state.validator, &request).await;
    record_admission(WEBHOOK_VALIDATE, result, start.elapsed());
    Json(response.into_review())
}

/// Validates one admission request and returns the response with its metric label.
///
/// Deletions and requests without an object are allowed. Transient API
/// errors deny the request so the API server retries.
pub async fn validate(
    validator: &Validator,
    request: &AdmissionRequest<DynamicObject>,
) -> (AdmissionResponse, &'static str) {
    let response = AdmissionResponse::from(request);
    if !matches!(request.operation, Operation::Create | Operation::Update) {
        return (response, RESULT_ALLOWED);
    }
    let Some(object) = request.object.as_ref() else {
        return (response, RESULT_ALLOWED);
    };

    let dk = match serde_json::to_value(object)
        .map_err(|e| e.to_string())
        .and_then(|value| to_hub(&value).map_err(|e| e.to_string()))
    {
        Ok(dk) => dk,
        Err(reason) => {
            debug!(uid = %request.uid, reason = %reason, "Rejecting undecodable DynaKube");
            return (
                response.deny(format!("DynaKube could not be decoded: {reason}")),
                RESULT_DENIED,
            );
        }
    };

    match validator.validate(&dk).await {
        Ok(outcome) => {
            let mut response = response;
            if !outcome.warnings.is_empty() {
                response.warnings = Some(outcome.warnings.clone());
            }
            match outcome.denial_message() {
                Some(message) => (response.deny(message), RESULT_DENIED),
                None => (response, RESULT_ALLOWED),
            }
        }
        Err(e) => {
            warn!(name = %dk.name(), namespace = %dk.namespace(), error = %e, "Validation interrupted by API error");
            (
                response.deny(format!(
                    "DynaKube could not be validated, please retry: {e}"
                )),
                RESULT_ERROR,
            )
        }
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod validate_tests;
