// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes security posture management (KSPM) section of the hub `DynaKube`.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::DaemonSetUpdateStrategy;
use k8s_openapi::api::core::v1::{EnvVar, NodeAffinity, ResourceRequirements, Toleration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::shared::ImageRef;
use crate::constants::{KSPM_NODE_COLLECTOR_SUFFIX, KSPM_TOKEN_SECRET_KEY};

/// Host path mapped into the node collector when converting from versions without the field.
pub const DEFAULT_MAPPED_HOST_PATH: &str = "/";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KspmSpec {
    /// Host paths the node collector scans. `/` alone maps the whole root filesystem.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapped_host_paths: Vec<String>,
}

/// Template of the KSPM node configuration collector daemonset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigurationCollectorSpec {
    /// Update strategy of the daemonset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<DaemonSetUpdateStrategy>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Image of the node collector
    #[serde(default)]
    pub image_ref: ImageRef,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Read-only view over the KSPM spec of one `DynaKube`.
#[derive(Clone, Copy, Debug)]
pub struct Kspm<'a> {
    spec: Option<&'a KspmSpec>,
    name: &'a str,
}

impl<'a> Kspm<'a> {
    #[must_use]
    pub fn new(spec: Option<&'a KspmSpec>, name: &'a str) -> Self {
        Self { spec, name }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.spec.is_some()
    }

    #[must_use]
    pub fn mapped_host_paths(&self) -> &'a [String] {
        self.spec.map_or(&[], |spec| spec.mapped_host_paths.as_slice())
    }

    #[must_use]
    pub fn token_secret_name(&self) -> String {
        format!("{}-{KSPM_TOKEN_SECRET_KEY}", self.name)
    }

    #[must_use]
    pub fn node_collector_name(&self) -> String {
        format!("{}-{KSPM_NODE_COLLECTOR_SUFFIX}", self.name)
    }
}
