// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `v1beta4` of the `DynaKube` custom resource.
//!
//! Differs from the hub only in a few places: host specs carry no image pull
//! policy or storage host path, the ActiveGate PVC is called
//! `persistentVolumeClaim`, and KSPM has no settings. Every other sub-spec and
//! the status share their shape with the hub and are reused from there.

pub mod convert;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    EnvVar, PersistentVolumeClaimSpec, ResourceRequirements, Toleration,
    TopologySpreadConstraint,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::latest::extensions::ExtensionsSpec;
use crate::api::latest::logmonitoring::LogMonitoringSpec;
use crate::api::latest::oneagent::is_empty_selector;
use crate::api::latest::status::DynaKubeStatus;
use crate::api::latest::telemetryingest::TelemetryIngestSpec;
use crate::api::latest::{MetadataEnrichment, TemplatesSpec};
use crate::api::shared::{is_default, is_false, ValueSource};

/// `DynaKube` configures the Dynatrace observability stack of a cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dynatrace.com",
    version = "v1beta4",
    kind = "DynaKube",
    plural = "dynakubes",
    namespaced,
    shortname = "dk",
    shortname = "dks",
    category = "dynatrace",
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
    pub api_url: String,

    /// Name of the secret holding the tokens used for connecting to Dynatrace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tokens: String,

    /// Name of a configmap with the `certs` field holding trusted CA certificates.
    #[serde(default, rename = "trustedCAs", skip_serializing_if = "String::is_empty")]
    pub trusted_cas: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_zone: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_pull_secret: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_cert_check: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_istio: bool,

    #[serde(default, skip_serializing_if = "is_default")]
    pub one_agent: OneAgentSpec,

    #[serde(default, skip_serializing_if = "is_default")]
    pub active_gate: ActiveGateSpec,

    #[serde(default, skip_serializing_if = "is_default")]
    pub metadata_enrichment: MetadataEnrichment,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_monitoring: Option<LogMonitoringSpec>,

    /// Enables Kubernetes security posture management.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kspm: Option<KspmSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionsSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_ingest: Option<TelemetryIngestSpec>,

    #[serde(default, skip_serializing_if = "is_default")]
    pub templates: TemplatesSpec,
}

/// KSPM carries no settings in this version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KspmSpec {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classic_full_stack: Option<HostInjectSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_native_full_stack: Option<CloudNativeFullStackSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_monitoring: Option<ApplicationMonitoringSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_monitoring: Option<HostInjectSpec>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_group: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostInjectSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_policy: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sec_comp_profile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_agent_resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppInjectionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_modules_image: String,

    #[serde(default, skip_serializing_if = "is_empty_selector")]
    pub namespace_selector: LabelSelector,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudNativeFullStackSpec {
    #[serde(flatten)]
    pub host: HostInjectSpec,

    #[serde(flatten)]
    pub app: AppInjectionSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMonitoringSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(flatten)]
    pub app: AppInjectionSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGateSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_secret_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_policy: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    /// Persistent volume claim of the ActiveGate statefulset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<ValueSource>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}
