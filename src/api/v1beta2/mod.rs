// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `v1beta2` of the `DynaKube` custom resource (deprecated).
//!
//! Extensions and their workload templates did not exist as typed fields yet.
//! Objects converted down from the hub carry them as JSON annotations instead.

pub mod convert;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, Toleration, TopologySpreadConstraint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::latest::oneagent::is_empty_selector;
use crate::api::latest::status::{ActiveGateStatus, DynatraceApiStatus, OneAgentStatus};
use crate::api::shared::{default_true, is_default, is_false, Condition, ValueSource, VersionStatus};
use crate::api::v1beta4::AppInjectionSpec;

/// `DynaKube` configures the Dynatrace observability stack of a cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dynatrace.com",
    version = "v1beta2",
    kind = "DynaKube",
    plural = "dynakubes",
    namespaced,
    shortname = "dk",
    shortname = "dks",
    category = "dynatrace",
    deprecated = "dynatrace.com/v1beta2 DynaKube is deprecated, use dynatrace.com/v1beta5",
    printcolumn = r#"{"name":"ApiUrl","type":"string","jsonPath":".spec.apiUrl"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "DynaKubeStatus", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct DynaKubeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ValueSource>,

    #[serde(default, skip_serializing_if = "is_default")]
    pub one_agent: OneAgentSpec,

    /// Dynatrace `apiUrl`, including the `/api` path at the end.
    pub api_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tokens: String,

    #[serde(default, rename = "trustedCAs", skip_serializing_if = "String::is_empty")]
    pub trusted_cas: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_zone: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_pull_secret: String,

    #[serde(default, skip_serializing_if = "is_default")]
    pub active_gate: ActiveGateSpec,

    #[serde(default, skip_serializing_if = "is_default")]
    pub metadata_enrichment: MetadataEnrichment,

    /// Minimum minutes between Dynatrace API requests. Zero means the default.
    #[serde(default, skip_serializing_if = "is_default")]
    pub dynatrace_api_request_threshold: i32,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_cert_check: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_istio: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnrichment {
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "is_empty_selector")]
    pub namespace_selector: LabelSelector,
}

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

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostInjectSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Automatically update the agent. Defaults to true.
    #[serde(default = "default_true")]
    pub auto_update: bool,

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

impl Default for HostInjectSpec {
    fn default() -> Self {
        Self {
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
            node_selector: BTreeMap::new(),
            auto_update: true,
            version: String::new(),
            image: String::new(),
            dns_policy: String::new(),
            priority_class_name: String::new(),
            sec_comp_profile: String::new(),
            one_agent_resources: None,
            tolerations: Vec::new(),
            env: Vec::new(),
            args: Vec::new(),
        }
    }
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

    /// Mount the code modules through the CSI driver
    #[serde(default, rename = "useCSIDriver", skip_serializing_if = "is_false")]
    pub use_csi_driver: bool,

    #[serde(flatten)]
    pub app: AppInjectionSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
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

    /// Number of ActiveGate pods. Defaults to 1.
    #[serde(default = "default_replicas")]
    pub replicas: i32,
}

impl Default for ActiveGateSpec {
    fn default() -> Self {
        Self {
            annotations: BTreeMap::new(),
            tls_secret_name: String::new(),
            dns_policy: String::new(),
            priority_class_name: String::new(),
            capabilities: Vec::new(),
            custom_properties: None,
            node_selector: BTreeMap::new(),
            labels: BTreeMap::new(),
            image: String::new(),
            group: String::new(),
            resources: None,
            tolerations: Vec::new(),
            env: Vec::new(),
            topology_spread_constraints: Vec::new(),
            replicas: default_replicas(),
        }
    }
}

/// Status of legacy versions. Lacks the KSPM, enrichment rule and cluster
/// identity fields of the hub.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynaKubeStatus {
    #[serde(default, skip_serializing_if = "is_default")]
    pub one_agent: OneAgentStatus,

    #[serde(default, skip_serializing_if = "is_default")]
    pub active_gate: ActiveGateStatus,

    #[serde(default, skip_serializing_if = "is_default")]
    pub code_modules: VersionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "is_default")]
    pub dynatrace_api: DynatraceApiStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,

    #[serde(default, rename = "kubeSystemUUID", skip_serializing_if = "String::is_empty")]
    pub kube_system_uuid: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

fn default_replicas() -> i32 {
    1
}
