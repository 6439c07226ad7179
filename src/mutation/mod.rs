// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod injection webhook.
//!
//! [`PodWebhook::mutate`] decides whether a pod belongs to a `DynaKube`,
//! picks an injection strategy and applies it:
//!
//! - [`v1::InitContainerInjector`]: an `install-oneagent` init container running
//!   the webhook image downloads or links the agent into shared volumes.
//! - [`v2::BootstrapperInjector`]: the code-modules image itself runs as the
//!   init container and copies the agent into an empty dir.
//!
//! The webhook only mutates an in-memory copy of the pod. Turning the result
//! into a JSON patch is left to the HTTP layer.

pub mod container;
pub mod events;
pub mod image;
pub mod init_secret;
pub mod v1;
pub mod v2;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Namespace, Pod, PodSpec};
use tracing::{debug, info, warn};

use crate::api::feature_flags::InjectionFailurePolicy;
use crate::api::latest::DynaKube;
use crate::cluster::ClusterClient;
use crate::config::Modules;
use crate::errors::InjectionError;
use crate::labels::{
    ANNOTATION_CONTAINER_INJECTION_PREFIX, ANNOTATION_DYNAKUBE_INJECTED,
    ANNOTATION_DYNATRACE_INJECT, ANNOTATION_FAILURE_POLICY, ANNOTATION_ONEAGENT_INJECT,
    ANNOTATION_ONEAGENT_INJECTED, ANNOTATION_ONEAGENT_REASON, INJECTION_INSTANCE_LABEL,
};
use crate::metrics::{record_injection, OUTCOME_INJECTED, OUTCOME_REINVOKED, OUTCOME_SKIPPED};
use crate::selector::label_selector_matches;
use events::{missing_dynakube_message, EventRecorder};

const TRUE: &str = "true";
const FALSE: &str = "false";

/// Message returned while the legacy `OneAgentAPM` CRD blocks injection.
pub const INCOMPATIBLE_CRD_MESSAGE: &str =
    "OneAgentAPM CRD is present, pod injection is disabled until it is removed";

/// Injection strategy applied to a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Init container running the webhook image
    V1,
    /// Init container running the code-modules (bootstrapper) image
    V2,
}

impl Strategy {
    /// Value of the `strategy` metric label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// Process-wide inputs of the pod webhook, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct InjectionSettings {
    /// Image of the v1 init container (the webhook's own image)
    pub webhook_image: String,
    /// UID of the `kube-system` namespace
    pub cluster_id: String,
    /// Namespace holding the `DynaKube`s and their secrets
    pub operator_namespace: String,
    pub modules: Modules,
    /// The legacy `OneAgentAPM` CRD was found at startup
    pub incompatible_crd_present: bool,
}

/// One pod admission, owned by a single request handler.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub pod: Pod,
    pub namespace: Namespace,
    pub dynakube: DynaKube,
}

impl MutationRequest {
    #[must_use]
    pub fn new(pod: Pod, namespace: Namespace, dynakube: DynaKube) -> Self {
        Self {
            pod,
            namespace,
            dynakube,
        }
    }

    #[must_use]
    pub fn namespace_name(&self) -> &str {
        self.namespace.metadata.name.as_deref().unwrap_or_default()
    }

    /// Name of the pod, or its `generateName` while the API server has not named it yet.
    #[must_use]
    pub fn pod_name(&self) -> &str {
        let metadata = &self.pod.metadata;
        metadata
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(metadata.generate_name.as_deref())
            .unwrap_or_default()
    }

    /// Pod name up to its last dash, which strips the replica suffix.
    #[must_use]
    pub fn base_pod_name(&self) -> &str {
        let metadata = &self.pod.metadata;
        let name = metadata
            .generate_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(metadata.name.as_deref())
            .unwrap_or_default();
        name.rfind('-').map_or(name, |index| &name[..index])
    }

    #[must_use]
    pub fn pod_annotation(&self, key: &str) -> Option<&str> {
        self.pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    pub fn set_pod_annotation(&mut self, key: &str, value: impl Into<String>) {
        self.pod
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
    }

    pub fn remove_pod_annotation(&mut self, key: &str) {
        if let Some(annotations) = self.pod.metadata.annotations.as_mut() {
            annotations.remove(key);
        }
    }

    /// Returns true if `container.inject.dynatrace.com/<name>` is `"false"`
    /// on the pod or, failing that, on the `DynaKube`.
    #[must_use]
    pub fn is_container_excluded(&self, container_name: &str) -> bool {
        let key = format!("{ANNOTATION_CONTAINER_INJECTION_PREFIX}{container_name}");
        let value = self.pod_annotation(&key).or_else(|| {
            self.dynakube
                .annotations()
                .and_then(|annotations| annotations.get(&key))
                .map(String::as_str)
        });
        value == Some(FALSE)
    }

    /// Pod annotation first, then the `DynaKube` feature flag.
    #[must_use]
    pub fn failure_policy(&self) -> InjectionFailurePolicy {
        match self.pod_annotation(ANNOTATION_FAILURE_POLICY) {
            Some(raw) => InjectionFailurePolicy::parse(raw),
            None => self.dynakube.feature_flags().injection_failure_policy(),
        }
    }

    #[must_use]
    pub fn containers(&self) -> &[Container] {
        self.pod
            .spec
            .as_ref()
            .map_or(&[], |spec| spec.containers.as_slice())
    }

    pub fn spec_mut(&mut self) -> &mut PodSpec {
        self.pod.spec.get_or_insert_with(PodSpec::default)
    }

    /// Indices of user containers that are not excluded and not yet injected.
    #[must_use]
    pub fn new_containers(&self, is_injected: impl Fn(&Container) -> bool) -> Vec<usize> {
        self.containers()
            .iter()
            .enumerate()
            .filter(|(_, container)| {
                !self.is_container_excluded(&container.name) && !is_injected(container)
            })
            .map(|(index, _)| index)
            .collect()
    }
}

/// An injection strategy.
#[async_trait]
pub trait Injector: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Returns true if the strategy applies to this pod and `DynaKube`.
    fn is_enabled(&self, request: &MutationRequest) -> bool;

    /// Returns true if the container already carries the agent.
    fn is_injected(&self, container: &Container) -> bool;

    /// Reasons why injection is impossible; empty when the pod can be injected.
    ///
    /// # Errors
    ///
    /// Returns an error if a required API call fails.
    async fn skip_reasons(&self, request: &MutationRequest)
        -> Result<Vec<&'static str>, InjectionError>;

    /// Injects into a pod seen for the first time.
    ///
    /// # Errors
    ///
    /// Returns an error if a required API call fails.
    async fn inject(&self, request: &mut MutationRequest) -> Result<(), InjectionError>;

    /// Injects containers added after the first invocation.
    ///
    /// Returns true if the pod changed.
    fn reinvoke(&self, request: &mut MutationRequest) -> bool;
}

/// Outcome of [`PodWebhook::mutate`].
#[derive(Debug, Clone)]
pub enum MutationResult {
    /// Admit the pod as is, with an optional explanation.
    Unchanged { message: Option<String> },
    /// Admit the changed pod.
    Mutated {
        pod: Box<Pod>,
        strategy: Strategy,
        /// One of the `OUTCOME_*` metric labels
        outcome: &'static str,
    },
}

impl MutationResult {
    fn unchanged() -> Self {
        Self::Unchanged { message: None }
    }

    fn unchanged_with(message: impl Into<String>) -> Self {
        Self::Unchanged {
            message: Some(message.into()),
        }
    }
}

/// The pod mutating webhook.
pub struct PodWebhook {
    client: Arc<dyn ClusterClient>,
    settings: Arc<InjectionSettings>,
    events: EventRecorder,
    v1: v1::InitContainerInjector,
    v2: v2::BootstrapperInjector,
}

impl PodWebhook {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, settings: InjectionSettings) -> Self {
        let settings = Arc::new(settings);
        Self {
            events: EventRecorder::new(client.clone()),
            v1: v1::InitContainerInjector::new(client.clone(), settings.clone()),
            v2: v2::BootstrapperInjector::new(client.clone(), settings.clone()),
            client,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &InjectionSettings {
        &self.settings
    }

    /// Mutates a pod that is being created in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or the `DynaKube` cannot be read, or
    /// if the selected strategy fails on an API call.
    pub async fn mutate(&self, pod: Pod, namespace: &str) -> Result<MutationResult, InjectionError> {
        if self.settings.incompatible_crd_present {
            return Ok(MutationResult::unchanged_with(INCOMPATIBLE_CRD_MESSAGE));
        }

        let ns = self
            .client
            .get_namespace(namespace)
            .await
            .map_err(|source| InjectionError::Namespace {
                namespace: namespace.to_string(),
                source,
            })?
            .ok_or_else(|| {
                InjectionError::InvalidInput(format!("namespace '{namespace}' does not exist"))
            })?;

        let Some(dk_name) = ns
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(INJECTION_INSTANCE_LABEL))
            .cloned()
        else {
            return Ok(MutationResult::unchanged_with(format!(
                "no DynaKube instance set for namespace: {namespace}"
            )));
        };

        let operator_namespace = &self.settings.operator_namespace;
        let dynakube = match self.client.get_dynakube(operator_namespace, &dk_name).await {
            Ok(Some(dk)) => dk,
            Ok(None) => {
                warn!(namespace = %namespace, dynakube = %dk_name, "Namespace references a missing DynaKube");
                self.events
                    .missing_dynakube(operator_namespace, namespace, &dk_name)
                    .await;
                return Ok(MutationResult::unchanged_with(missing_dynakube_message(
                    namespace, &dk_name,
                )));
            }
            Err(source) => {
                return Err(InjectionError::DynaKubeLookup {
                    name: dk_name,
                    namespace: operator_namespace.clone(),
                    source,
                })
            }
        };

        if dynakube.feature_flags().is_namespace_ignored(namespace) {
            debug!(namespace = %namespace, "Namespace is ignored by the DynaKube");
            return Ok(MutationResult::unchanged());
        }

        let mut request = MutationRequest::new(pod, ns, dynakube);
        if !is_injection_enabled(&request) {
            debug!(namespace = %namespace, pod = %request.pod_name(), "Injection disabled for pod");
            return Ok(MutationResult::unchanged());
        }

        let Some(injector) = self.select_injector(&request) else {
            return Ok(MutationResult::unchanged());
        };
        let strategy = injector.strategy();

        if request.pod_annotation(ANNOTATION_DYNAKUBE_INJECTED).is_some() {
            if !injector.reinvoke(&mut request) {
                return Ok(MutationResult::unchanged());
            }
            info!(namespace = %namespace, pod = %request.pod_name(), strategy = %strategy.as_str(), "Injected containers added after the first invocation");
            self.events
                .update_pod(&request.dynakube, request.pod_name(), namespace)
                .await;
            record_injection(strategy.as_str(), OUTCOME_REINVOKED);
            return Ok(mutated(request, strategy, OUTCOME_REINVOKED));
        }

        let reasons = injector.skip_reasons(&request).await?;
        if !reasons.is_empty() {
            let reason = reasons.join(", ");
            info!(namespace = %namespace, pod = %request.pod_name(), reason = %reason, "Skipping injection");
            request.set_pod_annotation(ANNOTATION_ONEAGENT_INJECTED, FALSE);
            request.set_pod_annotation(ANNOTATION_ONEAGENT_REASON, reason);
            record_injection(strategy.as_str(), OUTCOME_SKIPPED);
            return Ok(mutated(request, strategy, OUTCOME_SKIPPED));
        }

        injector.inject(&mut request).await?;
        request.set_pod_annotation(ANNOTATION_ONEAGENT_INJECTED, TRUE);
        request.remove_pod_annotation(ANNOTATION_ONEAGENT_REASON);
        request.set_pod_annotation(ANNOTATION_DYNAKUBE_INJECTED, TRUE);

        info!(namespace = %namespace, pod = %request.pod_name(), strategy = %strategy.as_str(), "Injected pod");
        self.events
            .inject(&request.dynakube, request.pod_name(), namespace)
            .await;
        record_injection(strategy.as_str(), OUTCOME_INJECTED);
        Ok(mutated(request, strategy, OUTCOME_INJECTED))
    }

    /// v2 when the `DynaKube` pulls images on the node and the pod does not
    /// insist on CSI, v1 otherwise.
    fn select_injector(&self, request: &MutationRequest) -> Option<&dyn Injector> {
        if self.v2.is_enabled(request) {
            Some(&self.v2)
        } else if self.v1.is_enabled(request) {
            Some(&self.v1)
        } else {
            None
        }
    }
}

fn mutated(request: MutationRequest, strategy: Strategy, outcome: &'static str) -> MutationResult {
    MutationResult::Mutated {
        pod: Box::new(request.pod),
        strategy,
        outcome,
    }
}

/// Returns true if the pod opted in and its namespace is selected by the `DynaKube`.
///
/// `dynatrace.com/inject: "false"` always opts out. Otherwise
/// `oneagent.dynatrace.com/inject` decides, defaulting to the
/// `automatic-injection` feature flag.
#[must_use]
pub fn is_injection_enabled(request: &MutationRequest) -> bool {
    if request.pod_annotation(ANNOTATION_DYNATRACE_INJECT) == Some(FALSE) {
        return false;
    }

    let dk = &request.dynakube;
    let opted_in = match request.pod_annotation(ANNOTATION_ONEAGENT_INJECT) {
        Some(value) => value != FALSE,
        None => dk.feature_flags().automatic_injection(),
    };
    if !opted_in {
        return false;
    }

    let Some(selector) = dk.one_agent().namespace_selector() else {
        return false;
    };
    let empty = BTreeMap::new();
    let labels = request.namespace.metadata.labels.as_ref().unwrap_or(&empty);
    label_selector_matches(selector, labels)
}
