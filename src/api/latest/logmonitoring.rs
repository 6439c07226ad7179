// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Log monitoring section of the hub `DynaKube`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::shared::ImageRef;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogMonitoringSpec {
    /// Rules selecting which logs are ingested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingest_rule_matchers: Vec<IngestRuleMatchers>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestRuleMatchers {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attribute: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Template of the standalone log monitoring daemonset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogMonitoringTemplateSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<ImageRef>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_policy: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sec_comp_profile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Read-only view over the log monitoring spec of one `DynaKube`.
#[derive(Clone, Copy, Debug)]
pub struct LogMonitoring<'a> {
    spec: Option<&'a LogMonitoringSpec>,
    name: &'a str,
    oneagent_daemonset_required: bool,
}

impl<'a> LogMonitoring<'a> {
    #[must_use]
    pub fn new(
        spec: Option<&'a LogMonitoringSpec>,
        name: &'a str,
        oneagent_daemonset_required: bool,
    ) -> Self {
        Self {
            spec,
            name,
            oneagent_daemonset_required,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.spec.is_some()
    }

    /// Log monitoring runs its own daemonset when no OneAgent daemonset exists.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.is_enabled() && !self.oneagent_daemonset_required
    }

    #[must_use]
    pub fn daemonset_name(&self) -> String {
        format!("{}-logmonitoring", self.name)
    }

    #[must_use]
    pub fn ingest_rule_matchers(&self) -> &'a [IngestRuleMatchers] {
        self.spec
            .map_or(&[], |spec| spec.ingest_rule_matchers.as_slice())
    }
}
