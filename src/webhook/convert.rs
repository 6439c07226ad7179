// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `POST /convert`: CRD conversion between the served `DynaKube` versions.

use std::time::Instant;

use axum::Json;
use kube::core::conversion::{ConversionRequest, ConversionResponse, ConversionReview};
use kube::core::Status;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::conversion::{convert_object, served_version};
use crate::errors::ConversionError;
use crate::metrics::{
    record_admission, record_conversion, RESULT_ALLOWED, RESULT_ERROR, WEBHOOK_CONVERT,
};

/// Axum handler of the conversion webhook.
pub async fn convert_handler(Json(review): Json<ConversionReview>) -> Json<ConversionReview> {
    let start = Instant::now();
    let request = match ConversionRequest::from_review(review) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Received malformed conversion review");
            record_admission(WEBHOOK_CONVERT, RESULT_ERROR, start.elapsed());
            return Json(
                ConversionResponse::invalid(Status::failure(&e.to_string(), "InvalidRequest"))
                    .into_review(),
            );
        }
    };

    let desired = request.desired_api_version.clone();
    let objects = request.objects.clone();
    let response = ConversionResponse::for_request(request);

    let response = match convert_all(&objects, &desired) {
        Ok(converted) => {
            debug!(count = converted.len(), to = %desired, "Converted DynaKubes");
            record_admission(WEBHOOK_CONVERT, RESULT_ALLOWED, start.elapsed());
            response.success(converted)
        }
        Err(e) => {
            warn!(to = %desired, error = %e, "DynaKube conversion failed");
            record_admission(WEBHOOK_CONVERT, RESULT_ERROR, start.elapsed());
            response.failure(Status::failure(&e.to_string(), "ConversionFailed"))
        }
    };
    Json(response.into_review())
}

/// Converts every object into `desired_api_version`, stopping at the first failure.
///
/// # Errors
///
/// Returns the [`ConversionError`] of the first object that can't be converted.
pub fn convert_all(
    objects: &[Value],
    desired_api_version: &str,
) -> Result<Vec<Value>, ConversionError> {
    let to = served_version(desired_api_version)?;
    objects
        .iter()
        .map(|object| {
            let from = object
                .get("apiVersion")
                .and_then(Value::as_str)
                .and_then(|api_version| served_version(api_version).ok())
                .unwrap_or("unknown");
            let converted = convert_object(object, desired_api_version);
            record_conversion(from, to, converted.is_ok());
            converted
        })
        .collect()
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod convert_tests;
