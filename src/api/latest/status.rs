// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status subresource of the hub `DynaKube`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::shared::{
    CommunicationHostStatus, Condition, ConnectionInfo, HealthcheckStatus, VersionStatus,
};

/// Observed state of a `DynaKube`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynaKubeStatus {
    /// Observed state of OneAgent
    #[serde(default)]
    pub one_agent: OneAgentStatus,

    /// Observed state of ActiveGate
    #[serde(default)]
    pub active_gate: ActiveGateStatus,

    /// Observed state of code modules
    #[serde(default)]
    pub code_modules: VersionStatus,

    /// Observed state of metadata enrichment
    #[serde(default)]
    pub metadata_enrichment: MetadataEnrichmentStatus,

    /// Observed state of KSPM
    #[serde(default)]
    pub kspm: KspmStatus,

    /// Time of the last status update (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_timestamp: Option<String>,

    /// Observed state of the Dynatrace API
    #[serde(default)]
    pub dynatrace_api: DynatraceApiStatus,

    /// Defines the current state (Running, Updating, Error, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,

    /// UUID of the kube-system namespace
    #[serde(default, rename = "kubeSystemUUID", skip_serializing_if = "String::is_empty")]
    pub kube_system_uuid: String,

    /// Monitored entity ID of the cluster
    #[serde(
        default,
        rename = "kubernetesClusterMEID",
        skip_serializing_if = "String::is_empty"
    )]
    pub kubernetes_cluster_meid: String,

    /// Name of the cluster as known to the tenant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_cluster_name: String,

    /// Conditions includes status about the current state of the instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentStatus {
    #[serde(flatten)]
    pub version: VersionStatus,

    /// OneAgent pods keyed by node name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instances: BTreeMap<String, OneAgentInstance>,

    /// Time of the last instance status update (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_instance_status_update: Option<String>,

    /// Health check of the OneAgent image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthcheckStatus>,

    /// Connection information of the OneAgent
    #[serde(default)]
    pub connection_info_status: OneAgentConnectionInfoStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentInstance {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_name: String,

    #[serde(default, rename = "ipAddress", skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentConnectionInfoStatus {
    #[serde(flatten)]
    pub connection_info: ConnectionInfo,

    /// Communication hosts the OneAgent may use
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub communication_hosts: Vec<CommunicationHostStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGateStatus {
    #[serde(flatten)]
    pub version: VersionStatus,

    /// Connection information of the ActiveGate
    #[serde(default, rename = "connectionInfoStatus")]
    pub connection_info: ConnectionInfo,

    /// IP addresses of the ActiveGate service
    #[serde(default, rename = "serviceIPs", skip_serializing_if = "Vec::is_empty")]
    pub service_ips: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnrichmentStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<EnrichmentRule>,
}

/// Enrichment rule fetched from the tenant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KspmStatus {
    /// Hash of the KSPM token secret
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_secret_hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynatraceApiStatus {
    /// Time of the last token scope check (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_token_scope_request: Option<String>,
}

impl DynaKubeStatus {
    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}
