// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ActiveGate section of the hub `DynaKube`.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::{
    EnvVar, PersistentVolumeClaimSpec, ResourceRequirements, Toleration,
    TopologySpreadConstraint,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::latest::status::ActiveGateStatus;
use crate::api::latest::to_image_tag;
use crate::api::shared::ValueSource;
use crate::constants::{
    ACTIVEGATE_AUTH_TOKEN_SECRET_SUFFIX, ACTIVEGATE_CONNECTION_INFO_SUFFIX,
    ACTIVEGATE_IMAGE_SUB_PATH, ACTIVEGATE_STATEFULSET_SUFFIX, ACTIVEGATE_TENANT_SECRET_SUFFIX,
    ACTIVEGATE_TLS_SECRET_SUFFIX, RAW_TAG,
};

/// ActiveGate configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGateSpec {
    /// Custom ActiveGate pod annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Name of a secret holding the ActiveGate TLS certificate (`server.p12`, `password`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_secret_name: String,

    /// DNS policy of the ActiveGate pods
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_policy: String,

    /// Priority class of the ActiveGate pods
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,

    /// Activated ActiveGate capabilities:
    /// `routing`, `kubernetes-monitoring`, `metrics-ingest`, `dynatrace-api`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    /// Persistent volume claim template of the ActiveGate statefulset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<PersistentVolumeClaimSpec>,

    /// Custom properties file content or secret reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<ValueSource>,

    /// Node selector controlling where ActiveGate pods are scheduled
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Custom ActiveGate pod labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Custom ActiveGate image. Defaults to the image of the tenant registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// ActiveGate group
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,

    /// Resource settings of the ActiveGate container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Additional environment variables of the ActiveGate pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,

    /// Amount of replicas. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 2_147_483_647))]
    pub replicas: Option<i32>,
}

/// Closed set of ActiveGate capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Routing,
    KubernetesMonitoring,
    MetricsIngest,
    DynatraceApi,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Routing,
        Capability::KubernetesMonitoring,
        Capability::MetricsIngest,
        Capability::DynatraceApi,
    ];

    /// Name used in the `DynaKube` spec.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::KubernetesMonitoring => "kubernetes-monitoring",
            Self::MetricsIngest => "metrics-ingest",
            Self::DynatraceApi => "dynatrace-api",
        }
    }

    /// Short name used for resource names.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::KubernetesMonitoring => "kubemon",
            Self::MetricsIngest => "metrics-ingest",
            Self::DynatraceApi => "dynatrace-api",
        }
    }

    /// Module name passed to the ActiveGate.
    #[must_use]
    pub fn argument_name(self) -> &'static str {
        match self {
            Self::Routing => "MSGrouter",
            Self::KubernetesMonitoring => "kubernetes_monitoring",
            Self::MetricsIngest => "metrics_ingest",
            Self::DynatraceApi => "restInterface",
        }
    }

    /// Parses a capability from its spec name.
    #[must_use]
    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.display_name() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Read-only view over the ActiveGate spec and status of one `DynaKube`.
#[derive(Clone, Debug)]
pub struct ActiveGate<'a> {
    spec: Option<&'a ActiveGateSpec>,
    status: Option<&'a ActiveGateStatus>,
    name: &'a str,
    api_url_host: String,
    implicitly_enabled: bool,
}

impl<'a> ActiveGate<'a> {
    /// `implicitly_enabled` is set when another feature (extensions, telemetry
    /// ingest) needs an ActiveGate even without capabilities.
    #[must_use]
    pub fn new(
        spec: Option<&'a ActiveGateSpec>,
        status: Option<&'a ActiveGateStatus>,
        name: &'a str,
        api_url_host: String,
        implicitly_enabled: bool,
    ) -> Self {
        Self {
            spec,
            status,
            name,
            api_url_host,
            implicitly_enabled,
        }
    }

    #[must_use]
    pub fn spec(&self) -> Option<&'a ActiveGateSpec> {
        self.spec
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.spec.is_some_and(|spec| !spec.capabilities.is_empty()) || self.implicitly_enabled
    }

    /// Capabilities of the spec that are part of the closed set.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.spec
            .map(|spec| {
                spec.capabilities
                    .iter()
                    .filter_map(|name| Capability::from_display_name(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_mode(&self, capability: Capability) -> bool {
        self.spec.is_some_and(|spec| {
            spec.capabilities
                .iter()
                .any(|name| name == capability.display_name())
        })
    }

    #[must_use]
    pub fn is_routing_enabled(&self) -> bool {
        self.is_mode(Capability::Routing)
    }

    #[must_use]
    pub fn is_kubernetes_monitoring_enabled(&self) -> bool {
        self.is_mode(Capability::KubernetesMonitoring)
    }

    #[must_use]
    pub fn is_metrics_ingest_enabled(&self) -> bool {
        self.is_mode(Capability::MetricsIngest)
    }

    #[must_use]
    pub fn is_api_enabled(&self) -> bool {
        self.is_mode(Capability::DynatraceApi)
    }

    /// Replica count, defaulting to one.
    #[must_use]
    pub fn replicas(&self) -> i32 {
        self.spec.and_then(|spec| spec.replicas).unwrap_or(1)
    }

    #[must_use]
    pub fn custom_image(&self) -> &'a str {
        self.spec.map_or("", |spec| spec.image.as_str())
    }

    /// Image of the tenant registry for the given version.
    #[must_use]
    pub fn default_image(&self, version: &str) -> String {
        if self.api_url_host.is_empty() {
            return String::new();
        }
        let mut tag = to_image_tag(version);
        if !tag.contains(RAW_TAG) {
            tag.push('-');
            tag.push_str(RAW_TAG);
        }
        format!("{}{ACTIVEGATE_IMAGE_SUB_PATH}:{tag}", self.api_url_host)
    }

    /// Returns true if the user supplied a TLS secret.
    #[must_use]
    pub fn has_custom_tls_certificate(&self) -> bool {
        self.spec.is_some_and(|spec| !spec.tls_secret_name.is_empty())
    }

    /// Name of the TLS secret, custom or generated.
    #[must_use]
    pub fn tls_secret_name(&self) -> String {
        match self.spec {
            Some(spec) if !spec.tls_secret_name.is_empty() => spec.tls_secret_name.clone(),
            _ => format!("{}{ACTIVEGATE_TLS_SECRET_SUFFIX}", self.name),
        }
    }

    #[must_use]
    pub fn tenant_secret(&self) -> String {
        format!("{}{ACTIVEGATE_TENANT_SECRET_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn auth_token_secret(&self) -> String {
        format!("{}{ACTIVEGATE_AUTH_TOKEN_SECRET_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn connection_info_config_map_name(&self) -> String {
        format!("{}{ACTIVEGATE_CONNECTION_INFO_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn statefulset_name(&self) -> String {
        format!("{}{ACTIVEGATE_STATEFULSET_SUFFIX}", self.name)
    }

    /// Returns true if a memory limit is configured for the ActiveGate container.
    #[must_use]
    pub fn has_memory_limit(&self) -> bool {
        self.spec
            .and_then(|spec| spec.resources.as_ref())
            .and_then(|resources| resources.limits.as_ref())
            .is_some_and(|limits| limits.contains_key("memory"))
    }

    /// Service IPs reported in the status.
    #[must_use]
    pub fn service_ips(&self) -> &'a [String] {
        self.status.map_or(&[], |status| status.service_ips.as_slice())
    }

    /// Version reported in the status.
    #[must_use]
    pub fn version(&self) -> &'a str {
        self.status.map_or("", |status| status.version.version.as_str())
    }
}

#[cfg(test)]
#[path = "activegate_tests.rs"]
mod activegate_tests;
