// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes events emitted by the pod webhook.
//!
//! Events are best effort: a failed create is logged and never fails the
//! admission request.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::jiff::Timestamp;
use kube::Resource;
use tracing::{debug, warn};

use crate::api::latest::DynaKube;
use crate::cluster::ClusterClient;
use crate::constants::EVENT_REPORTING_COMPONENT;
use crate::labels::{
    EVENT_REASON_INCOMPATIBLE_CRD, EVENT_REASON_INJECT, EVENT_REASON_MISSING_DYNAKUBE,
    EVENT_REASON_UPDATE_POD,
};

/// Event type of informational events
pub const EVENT_TYPE_NORMAL: &str = "Normal";

/// Event type of warnings
pub const EVENT_TYPE_WARNING: &str = "Warning";

/// Name of the stub `DynaKube` that carries `MissingDynakube` events.
pub const PLACEHOLDER_DYNAKUBE_NAME: &str = "placeholder";

/// Writes webhook events through the [`ClusterClient`].
#[derive(Clone)]
pub struct EventRecorder {
    client: Arc<dyn ClusterClient>,
}

impl EventRecorder {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// A pod received the agent for the first time.
    pub async fn inject(&self, dk: &DynaKube, pod_name: &str, namespace: &str) {
        let message =
            format!("Injecting the necessary info into pod {pod_name} in namespace {namespace}");
        self.record(dynakube_reference(dk), EVENT_TYPE_NORMAL, EVENT_REASON_INJECT, &message)
            .await;
    }

    /// A reinvocation injected containers added by later webhooks.
    pub async fn update_pod(&self, dk: &DynaKube, pod_name: &str, namespace: &str) {
        let message =
            format!("Updating pod {pod_name} in namespace {namespace} with missing containers");
        self.record(
            dynakube_reference(dk),
            EVENT_TYPE_NORMAL,
            EVENT_REASON_UPDATE_POD,
            &message,
        )
        .await;
    }

    /// A namespace names a `DynaKube` that does not exist.
    ///
    /// The event is attached to a stub object in the operator namespace since
    /// there is no real object to attach it to.
    pub async fn missing_dynakube(&self, operator_namespace: &str, namespace: &str, dk_name: &str) {
        let message = missing_dynakube_message(namespace, dk_name);
        let stub = ObjectReference {
            api_version: Some(DynaKube::api_version(&()).to_string()),
            kind: Some(DynaKube::kind(&()).to_string()),
            name: Some(PLACEHOLDER_DYNAKUBE_NAME.to_string()),
            namespace: Some(operator_namespace.to_string()),
            ..ObjectReference::default()
        };
        self.record(stub, EVENT_TYPE_WARNING, EVENT_REASON_MISSING_DYNAKUBE, &message)
            .await;
    }

    /// The legacy `OneAgentAPM` CRD is installed next to the webhook.
    pub async fn incompatible_crd(&self, webhook_pod: &Pod) {
        let message = "OneAgentAPM object detected, the DynaKube webhook won't inject until the \
                       OneAgent Operator has been uninstalled";
        self.record(
            pod_reference(webhook_pod),
            EVENT_TYPE_WARNING,
            EVENT_REASON_INCOMPATIBLE_CRD,
            message,
        )
        .await;
    }

    async fn record(&self, involved: ObjectReference, event_type: &str, reason: &str, message: &str) {
        let namespace = involved.namespace.clone().unwrap_or_default();
        let name = involved.name.clone().unwrap_or_default();
        let now = Time(Timestamp::now());

        let event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{name}-")),
                namespace: Some(namespace.clone()),
                ..ObjectMeta::default()
            },
            involved_object: involved,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            type_: Some(event_type.to_string()),
            source: Some(EventSource {
                component: Some(EVENT_REPORTING_COMPONENT.to_string()),
                ..EventSource::default()
            }),
            first_timestamp: Some(now.clone()),
            last_timestamp: Some(now),
            count: Some(1),
            ..Event::default()
        };

        match self.client.create_event(&namespace, &event).await {
            Ok(()) => debug!(reason = %reason, name = %name, namespace = %namespace, "Recorded event"),
            Err(e) => warn!(reason = %reason, name = %name, error = %e, "Failed to create event"),
        }
    }
}

/// Message of the `MissingDynakube` event, also returned to the API server.
#[must_use]
pub fn missing_dynakube_message(namespace: &str, dk_name: &str) -> String {
    format!("namespace '{namespace}' is assigned to DynaKube instance '{dk_name}' but doesn't exist")
}

fn dynakube_reference(dk: &DynaKube) -> ObjectReference {
    ObjectReference {
        api_version: Some(DynaKube::api_version(&()).to_string()),
        kind: Some(DynaKube::kind(&()).to_string()),
        name: Some(dk.name().to_string()),
        namespace: Some(dk.namespace().to_string()),
        uid: dk.metadata.uid.clone(),
        ..ObjectReference::default()
    }
}

fn pod_reference(pod: &Pod) -> ObjectReference {
    ObjectReference {
        api_version: Some(Pod::api_version(&()).to_string()),
        kind: Some(Pod::kind(&()).to_string()),
        name: pod.metadata.name.clone(),
        namespace: pod.metadata.namespace.clone(),
        uid: pod.metadata.uid.clone(),
        ..ObjectReference::default()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
