// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The multi-version `DynaKube` CustomResourceDefinition.
//!
//! Every served version derives its own single-version CRD; they are merged
//! with the hub as storage version and wired to the conversion webhook.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceConversion, CustomResourceDefinition, ServiceReference, WebhookClientConfig,
    WebhookConversion,
};
use kube::core::crd::{merge_crds, MergeError};
use kube::CustomResourceExt;

use crate::api::{latest, v1beta1, v1beta2, v1beta4};
use crate::constants::HUB_VERSION;

/// Name of the service in front of the webhook pods
pub const WEBHOOK_SERVICE_NAME: &str = "dynatrace-webhook";

/// Path of the conversion endpoint
pub const CONVERSION_PATH: &str = "/convert";

/// Builds the `DynaKube` CRD with all served versions.
///
/// The API server calls the conversion webhook through the
/// [`WEBHOOK_SERVICE_NAME`] service of `webhook_namespace`. The CA bundle is
/// left empty; it is injected at deploy time.
///
/// # Errors
///
/// Returns a [`MergeError`] if the per-version CRDs disagree on group, kind or scope.
pub fn dynakube_crd(webhook_namespace: &str) -> Result<CustomResourceDefinition, MergeError> {
    let mut crd = merge_crds(
        vec![
            v1beta1::DynaKube::crd(),
            v1beta2::DynaKube::crd(),
            v1beta4::DynaKube::crd(),
            latest::DynaKube::crd(),
        ],
        HUB_VERSION,
    )?;

    crd.spec.conversion = Some(CustomResourceConversion {
        strategy: "Webhook".to_string(),
        webhook: Some(WebhookConversion {
            client_config: Some(WebhookClientConfig {
                service: Some(ServiceReference {
                    name: WEBHOOK_SERVICE_NAME.to_string(),
                    namespace: webhook_namespace.to_string(),
                    path: Some(CONVERSION_PATH.to_string()),
                    port: Some(443),
                }),
                ..WebhookClientConfig::default()
            }),
            conversion_review_versions: vec!["v1".to_string()],
        }),
    });
    Ok(crd)
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
