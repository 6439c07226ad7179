// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster facts resolved once before the webhook starts serving.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use k8s_openapi::api::core::v1::Pod;
use tracing::{info, warn};

use crate::cluster::ClusterClient;
use crate::config::WebhookConfig;
use crate::constants::{KUBE_SYSTEM_NAMESPACE, LEGACY_ONEAGENT_APM_CRD, WEBHOOK_CONTAINER_NAME};
use crate::mutation::events::EventRecorder;
use crate::mutation::InjectionSettings;

/// Builds the [`InjectionSettings`] of this process.
///
/// The v1 init container image defaults to the image of the webhook's own
/// container. The cluster ID is the UID of the `kube-system` namespace. If
/// the legacy `OneAgentAPM` CRD is installed, a warning event is emitted on
/// the webhook pod and injection is disabled.
///
/// # Errors
///
/// Returns an error if the webhook image or the cluster ID can't be resolved.
pub async fn injection_settings(
    client: Arc<dyn ClusterClient>,
    config: &WebhookConfig,
) -> Result<InjectionSettings> {
    let own_pod = match config.pod_name.as_deref() {
        Some(name) => client
            .get_pod(&config.namespace, name)
            .await
            .with_context(|| format!("failed to read webhook pod {}/{name}", config.namespace))?,
        None => None,
    };

    let webhook_image = match config.webhook_image.clone() {
        Some(image) => image,
        None => own_pod
            .as_ref()
            .and_then(container_image)
            .ok_or_else(|| anyhow!("webhook image unknown: set --webhook-image or POD_NAME"))?,
    };

    let cluster_id = client
        .get_namespace(KUBE_SYSTEM_NAMESPACE)
        .await
        .context("failed to read kube-system namespace")?
        .and_then(|namespace| namespace.metadata.uid)
        .unwrap_or_default();
    if cluster_id.is_empty() {
        bail!("kube-system namespace has no UID, cluster ID can't be determined");
    }

    let incompatible_crd_present = match client.crd_exists(LEGACY_ONEAGENT_APM_CRD).await {
        Ok(present) => present,
        Err(e) => {
            warn!(crd = LEGACY_ONEAGENT_APM_CRD, error = %e, "Failed to look up legacy CRD, assuming absent");
            false
        }
    };
    if incompatible_crd_present {
        warn!(crd = LEGACY_ONEAGENT_APM_CRD, "Legacy CRD found, pod injection is disabled");
        if let Some(pod) = own_pod.as_ref() {
            EventRecorder::new(client.clone()).incompatible_crd(pod).await;
        }
    }

    info!(
        webhook_image = %webhook_image,
        cluster_id = %cluster_id,
        csi_driver = config.csi_driver,
        "Resolved injection settings"
    );
    Ok(InjectionSettings {
        webhook_image,
        cluster_id,
        operator_namespace: config.namespace.clone(),
        modules: config.modules(),
        incompatible_crd_present,
    })
}

/// Image of the webhook container, or of the first container if none is named so.
fn container_image(pod: &Pod) -> Option<String> {
    let containers = &pod.spec.as_ref()?.containers;
    containers
        .iter()
        .find(|container| container.name == WEBHOOK_CONTAINER_NAME)
        .or_else(|| containers.first())
        .and_then(|container| container.image.clone())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod startup_tests;
