// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Extensions section of the hub `DynaKube` and the templates of its workloads.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaimSpec, ResourceRequirements, Toleration, TopologySpreadConstraint,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::shared::ImageRef;
use crate::constants::EXTENSIONS_COLLECTOR_SUFFIX;

/// Enables the extensions framework. Carries no settings yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtensionsSpec {}

/// Template of the OpenTelemetry collector statefulset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryCollectorSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Number of replicas. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default)]
    pub image_ref: ImageRef,

    /// Name of a secret holding the collector TLS certificate
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_ref_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,
}

/// Template of the extension execution controller (EEC) statefulset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionExecutionControllerSpec {
    /// Claim of the persistent runtime volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub image_ref: ImageRef,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_ref_name: String,

    /// Name of a configmap with a custom EEC configuration
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_config: String,

    /// Name of a secret with certificates for custom extensions
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_extension_certificates: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,

    /// Use an ephemeral volume instead of a persistent volume claim
    #[serde(default, skip_serializing_if = "crate::api::shared::is_false")]
    pub use_ephemeral_volume: bool,
}

/// Read-only view over the extensions spec of one `DynaKube`.
#[derive(Clone, Copy, Debug)]
pub struct Extensions<'a> {
    spec: Option<&'a ExtensionsSpec>,
    eec: &'a ExtensionExecutionControllerSpec,
    name: &'a str,
}

impl<'a> Extensions<'a> {
    #[must_use]
    pub fn new(
        spec: Option<&'a ExtensionsSpec>,
        eec: &'a ExtensionExecutionControllerSpec,
        name: &'a str,
    ) -> Self {
        Self { spec, eec, name }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.spec.is_some()
    }

    #[must_use]
    pub fn executor_statefulset_name(&self) -> String {
        format!("{}-extensions-controller", self.name)
    }

    #[must_use]
    pub fn collector_statefulset_name(&self) -> String {
        format!("{}{EXTENSIONS_COLLECTOR_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn token_secret_name(&self) -> String {
        format!("{}-extensions-token", self.name)
    }

    /// Returns true if the EEC image is fully specified.
    #[must_use]
    pub fn has_executor_image(&self) -> bool {
        !self.eec.image_ref.full().is_empty()
    }

    /// Returns true if both an ephemeral volume and a PVC are requested.
    #[must_use]
    pub fn has_conflicting_volume_config(&self) -> bool {
        self.eec.use_ephemeral_volume && self.eec.persistent_volume_claim.is_some()
    }
}
