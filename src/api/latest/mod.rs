// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hub version (`v1beta5`) of the `DynaKube` custom resource.
//!
//! This is the storage version. Every other served version converts to and from
//! the types in this module, and the validator and the pod webhook only ever see
//! a hub `DynaKube`.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: dynatrace.com/v1beta5
//! kind: DynaKube
//! metadata:
//!   name: dynakube
//!   namespace: dynatrace
//! spec:
//!   apiUrl: https://ENVIRONMENTID.live.dynatrace.com/api
//!   oneAgent:
//!     cloudNativeFullStack: {}
//!   activeGate:
//!     capabilities:
//!       - routing
//!       - kubernetes-monitoring
//! ```

pub mod activegate;
pub mod extensions;
pub mod kspm;
pub mod logmonitoring;
pub mod oneagent;
pub mod status;
pub mod telemetryingest;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::feature_flags::{self, FeatureFlags};
use crate::api::shared::{is_default, is_false, ValueSource};
use crate::constants::{DEFAULT_API_REQUEST_THRESHOLD_MINUTES, PULL_SECRET_SUFFIX};
use crate::errors::ApiUrlError;

use self::activegate::{ActiveGate, ActiveGateSpec};
use self::extensions::{
    ExtensionExecutionControllerSpec, Extensions, ExtensionsSpec, OpenTelemetryCollectorSpec,
};
use self::kspm::{Kspm, KspmSpec, NodeConfigurationCollectorSpec};
use self::logmonitoring::{LogMonitoring, LogMonitoringSpec, LogMonitoringTemplateSpec};
use self::oneagent::{is_empty_selector, OneAgent, OneAgentSpec};
use self::status::DynaKubeStatus;
use self::telemetryingest::{TelemetryIngest, TelemetryIngestSpec};

/// `DynaKube` configures the Dynatrace observability stack of a cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dynatrace.com",
    version = "v1beta5",
    kind = "DynaKube",
    plural = "dynakubes",
    namespaced,
    shortname = "dk",
    shortname = "dks",
    category = "dynatrace",
    doc = "DynaKube is the Schema for the DynaKube API. It configures OneAgent, ActiveGate, code-module injection and the related Dynatrace workloads of a cluster.",
    printcolumn = r#"{"name":"ApiUrl","type":"string","jsonPath":".spec.apiUrl"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "DynaKubeStatus", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct DynaKubeSpec {
    /// Set custom proxy settings either directly or from a secret with the field `proxy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ValueSource>,

    /// Minimum minutes between Dynatrace API requests. Defaults to 15.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynatrace_api_request_threshold: Option<u16>,

    /// Dynatrace `apiUrl`, including the `/api` path at the end.
    ///
    /// For SaaS, set `ENVIRONMENTID` to your environment ID.
    /// For Managed, change the `apiUrl` address.
    pub api_url: String,

    /// Name of the secret holding the tokens used for connecting to Dynatrace.
    /// Defaults to the name of the `DynaKube`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tokens: String,

    /// Name of a configmap with the `certs` field holding trusted CA certificates.
    #[serde(default, rename = "trustedCAs", skip_serializing_if = "String::is_empty")]
    pub trusted_cas: String,

    /// Network zone for OneAgent and ActiveGate pods.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_zone: String,

    /// Name of a custom pull secret. Overrides the generated `<name>-pull-secret`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_pull_secret: String,

    /// Disable certificate checks for the connection between the cluster and Dynatrace.
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_cert_check: bool,

    /// Create istio service entries and virtual services for the Dynatrace endpoints.
    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_istio: bool,

    /// General configuration about OneAgent instances.
    #[serde(default, skip_serializing_if = "is_default")]
    pub one_agent: OneAgentSpec,

    /// General configuration about ActiveGate instances.
    #[serde(default, skip_serializing_if = "is_default")]
    pub active_gate: ActiveGateSpec,

    /// Configuration of metadata enrichment.
    #[serde(default, skip_serializing_if = "is_default")]
    pub metadata_enrichment: MetadataEnrichment,

    /// Configuration of the standalone log monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_monitoring: Option<LogMonitoringSpec>,

    /// Configuration of Kubernetes security posture management.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kspm: Option<KspmSpec>,

    /// Enables the extensions framework.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionsSpec>,

    /// Configuration of the telemetry ingest endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_ingest: Option<TelemetryIngestSpec>,

    /// Templates of the workloads deployed for the enabled features.
    #[serde(default, skip_serializing_if = "is_default")]
    pub templates: TemplatesSpec,
}

/// Metadata enrichment of injected pods.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnrichment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Namespaces whose pods are enriched.
    #[serde(default, skip_serializing_if = "is_empty_selector")]
    pub namespace_selector: LabelSelector,
}

impl MetadataEnrichment {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplatesSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_monitoring: Option<LogMonitoringTemplateSpec>,

    #[serde(default, skip_serializing_if = "is_default")]
    pub kspm_node_configuration_collector: NodeConfigurationCollectorSpec,

    #[serde(default, skip_serializing_if = "is_default")]
    pub open_telemetry_collector: OpenTelemetryCollectorSpec,

    #[serde(default, skip_serializing_if = "is_default")]
    pub extension_execution_controller: ExtensionExecutionControllerSpec,
}

/// Converts a version string into an image tag: the first three dotted components.
///
/// ```
/// use dynakube::api::latest::to_image_tag;
///
/// assert_eq!(to_image_tag("1.239.14.20220325-164521"), "1.239.14");
/// assert_eq!(to_image_tag("1.239.14-raw"), "1.239.14-raw");
/// ```
#[must_use]
pub fn to_image_tag(version: &str) -> String {
    version.splitn(4, '.').take(3).collect::<Vec<_>>().join(".")
}

/// Extracts the tenant from an API URL.
///
/// Managed URLs carry the tenant as path segment (`https://<host>/e/<tenant>/api`),
/// SaaS URLs as leftmost host label (`https://<tenant>.<domain>/api`).
///
/// # Errors
///
/// Returns an error embedding the URL if it can't be parsed or carries no tenant.
pub fn tenant_from_api_url(api_url: &str) -> Result<String, ApiUrlError> {
    let parsed = Url::parse(api_url).map_err(|e| ApiUrlError::Unparsable {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;

    let segments: Vec<&str> = parsed.path().split('/').collect();
    if segments.len() >= 3 && segments[1] == "e" && !segments[2].is_empty() {
        return Ok(segments[2].to_string());
    }

    parsed
        .host_str()
        .and_then(|host| host.split('.').find(|label| !label.is_empty()))
        .map(ToString::to_string)
        .ok_or_else(|| ApiUrlError::MissingTenant {
            url: api_url.to_string(),
        })
}

/// Host (and port, if any) of an API URL, empty if the URL doesn't parse.
#[must_use]
pub fn api_url_host(api_url: &str) -> String {
    let Ok(parsed) = Url::parse(api_url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

impl DynaKube {
    /// Name of the object, empty if unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace of the object, empty if unset.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.annotations.as_ref()
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.spec.api_url
    }

    #[must_use]
    pub fn api_url_host(&self) -> String {
        api_url_host(&self.spec.api_url)
    }

    /// Tenant of the configured API URL.
    ///
    /// # Errors
    ///
    /// Returns an error embedding the URL if no tenant can be derived.
    pub fn tenant(&self) -> Result<String, ApiUrlError> {
        tenant_from_api_url(&self.spec.api_url)
    }

    /// Name of the token secret, defaulting to the name of the `DynaKube`.
    #[must_use]
    pub fn tokens(&self) -> &str {
        if self.spec.tokens.is_empty() {
            self.name()
        } else {
            &self.spec.tokens
        }
    }

    /// Name of the pull secret, custom or generated.
    #[must_use]
    pub fn pull_secret_name(&self) -> String {
        if self.spec.custom_pull_secret.is_empty() {
            format!("{}{PULL_SECRET_SUFFIX}", self.name())
        } else {
            self.spec.custom_pull_secret.clone()
        }
    }

    /// Minutes between Dynatrace API requests.
    #[must_use]
    pub fn api_request_threshold(&self) -> u16 {
        self.spec
            .dynatrace_api_request_threshold
            .unwrap_or(DEFAULT_API_REQUEST_THRESHOLD_MINUTES)
    }

    #[must_use]
    pub fn has_proxy(&self) -> bool {
        self.spec.proxy.as_ref().is_some_and(|proxy| !proxy.is_empty())
    }

    #[must_use]
    pub fn feature_flags(&self) -> FeatureFlags<'_> {
        FeatureFlags::new(
            self.annotations(),
            self.name(),
            self.namespace(),
            self.spec.enable_istio,
        )
    }

    #[must_use]
    pub fn one_agent(&self) -> OneAgent<'_> {
        let status = self.status.as_ref();
        OneAgent::new(
            &self.spec.one_agent,
            status.map(|s| &s.one_agent),
            status.map(|s| &s.code_modules),
            self.name(),
            self.api_url_host(),
            self.feature_flags().node_image_pull(),
        )
    }

    #[must_use]
    pub fn active_gate(&self) -> ActiveGate<'_> {
        ActiveGate::new(
            Some(&self.spec.active_gate),
            self.status.as_ref().map(|s| &s.active_gate),
            self.name(),
            self.api_url_host(),
            self.extensions().is_enabled() || self.telemetry_ingest().is_enabled(),
        )
    }

    #[must_use]
    pub fn kspm(&self) -> Kspm<'_> {
        Kspm::new(self.spec.kspm.as_ref(), self.name())
    }

    #[must_use]
    pub fn log_monitoring(&self) -> LogMonitoring<'_> {
        LogMonitoring::new(
            self.spec.log_monitoring.as_ref(),
            self.name(),
            self.one_agent().is_daemonset_required(),
        )
    }

    #[must_use]
    pub fn extensions(&self) -> Extensions<'_> {
        Extensions::new(
            self.spec.extensions.as_ref(),
            &self.spec.templates.extension_execution_controller,
            self.name(),
        )
    }

    #[must_use]
    pub fn telemetry_ingest(&self) -> TelemetryIngest<'_> {
        TelemetryIngest::new(self.spec.telemetry_ingest.as_ref(), self.name())
    }

    #[must_use]
    pub fn metadata_enrichment_enabled(&self) -> bool {
        self.spec.metadata_enrichment.is_enabled()
    }

    /// Namespace selector of metadata enrichment.
    #[must_use]
    pub fn metadata_enrichment_namespace_selector(&self) -> &LabelSelector {
        &self.spec.metadata_enrichment.namespace_selector
    }

    /// Default code-modules image of the tenant registry for the given version.
    #[must_use]
    pub fn default_code_modules_image(&self, version: &str) -> String {
        let host = self.api_url_host();
        if host.is_empty() {
            return String::new();
        }
        format!(
            "{host}{}:{version}",
            crate::constants::CODEMODULES_IMAGE_SUB_PATH
        )
    }

    /// Feature-flag annotations that are deprecated or were moved into typed fields.
    #[must_use]
    pub fn deprecated_feature_flags(&self) -> Vec<&str> {
        let flags = self.feature_flags();
        feature_flags::DEPRECATED_FEATURE_FLAGS
            .iter()
            .chain(feature_flags::MOVED_FEATURE_FLAGS.iter())
            .copied()
            .filter(|key| flags.is_set(key))
            .collect()
    }
}
