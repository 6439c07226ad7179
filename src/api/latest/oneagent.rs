// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OneAgent section of the hub `DynaKube`.
//!
//! The wire shape keeps the four historical mode slots (`classicFullStack`,
//! `cloudNativeFullStack`, `applicationMonitoring`, `hostMonitoring`) so that the
//! validator can detect conflicting configurations. Callers consume the
//! configured mode through [`OneAgentSpec::mode`] and the [`OneAgent`] view.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::latest::status::OneAgentStatus;
use crate::api::latest::to_image_tag;
use crate::api::shared::VersionStatus;
use crate::constants::{
    ONEAGENT_CONNECTION_INFO_SUFFIX, ONEAGENT_DAEMONSET_SUFFIX, ONEAGENT_IMAGE_SUB_PATH,
    ONEAGENT_TENANT_SECRET_SUFFIX, RAW_TAG, STORAGE_VOLUME_DEFAULT_HOST_PATH,
};

/// Installer argument carrying the host group.
pub const HOST_GROUP_ARGUMENT: &str = "--set-host-group";

/// OneAgent configuration. At most one of the four mode slots may be set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentSpec {
    /// Has a single OneAgent per node via DaemonSet.
    /// Injection is performed via the same OneAgent DaemonSet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classic_full_stack: Option<HostInjectSpec>,

    /// Has a single OneAgent per node via DaemonSet.
    /// The webhook injects into application pods based on labeled namespaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_native_full_stack: Option<CloudNativeFullStackSpec>,

    /// The webhook injects into application pods based on labeled namespaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_monitoring: Option<ApplicationMonitoringSpec>,

    /// Has a single OneAgent per node via DaemonSet.
    /// Doesn't inject into application pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_monitoring: Option<HostInjectSpec>,

    /// Sets a host group for OneAgent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_group: String,
}

/// Settings of the host-level OneAgent daemonset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostInjectSpec {
    /// Custom OneAgent pod annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Custom OneAgent pod labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Node selector controlling where OneAgent is deployed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Specific OneAgent version. Defaults to the latest version of the tenant.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Custom OneAgent image. Defaults to the image of the tenant registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Image pull policy of the OneAgent image.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_pull_policy: String,

    /// DNS policy of the OneAgent pods.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_policy: String,

    /// Priority class of the OneAgent pods.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,

    /// Seccomp profile of the OneAgent container.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sec_comp_profile: String,

    /// Writable host directory for OneAgent configuration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_host_path: String,

    /// Resource settings of the OneAgent container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_agent_resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Additional environment variables of the OneAgent pods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Additional OneAgent installer arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Deprecated: use `version`/`image` to pin the agent instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,
}

/// Settings shared by the modes that inject into application pods.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppInjectionSpec {
    /// Resource requests and limits of the injected init container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_resources: Option<ResourceRequirements>,

    /// Custom code-modules image.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_modules_image: String,

    /// Image pull policy of the code-modules image.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_modules_image_pull_policy: String,

    /// Namespaces the webhook injects into.
    #[serde(default, skip_serializing_if = "is_empty_selector")]
    pub namespace_selector: LabelSelector,
}

/// Host agent plus application injection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudNativeFullStackSpec {
    #[serde(flatten)]
    pub host: HostInjectSpec,

    #[serde(flatten)]
    pub app: AppInjectionSpec,
}

/// Application injection without a host agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMonitoringSpec {
    /// Specific code-modules version. Defaults to the latest version of the tenant.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(flatten)]
    pub app: AppInjectionSpec,
}

/// Serde helper: an empty label selector is omitted.
pub(crate) fn is_empty_selector(selector: &LabelSelector) -> bool {
    selector.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
        && selector.match_expressions.as_ref().is_none_or(Vec::is_empty)
}

/// The configured OneAgent mode with its payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OneAgentMode<'a> {
    ClassicFullStack(&'a HostInjectSpec),
    CloudNativeFullStack(&'a CloudNativeFullStackSpec),
    ApplicationMonitoring(&'a ApplicationMonitoringSpec),
    HostMonitoring(&'a HostInjectSpec),
}

impl<'a> OneAgentMode<'a> {
    /// Field name of the mode on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClassicFullStack(_) => "classicFullStack",
            Self::CloudNativeFullStack(_) => "cloudNativeFullStack",
            Self::ApplicationMonitoring(_) => "applicationMonitoring",
            Self::HostMonitoring(_) => "hostMonitoring",
        }
    }

    /// Host-agent settings, absent for application monitoring.
    #[must_use]
    pub fn host_spec(&self) -> Option<&'a HostInjectSpec> {
        match *self {
            Self::ClassicFullStack(host) | Self::HostMonitoring(host) => Some(host),
            Self::CloudNativeFullStack(spec) => Some(&spec.host),
            Self::ApplicationMonitoring(_) => None,
        }
    }

    /// Application injection settings, absent for the host-only modes.
    #[must_use]
    pub fn app_spec(&self) -> Option<&'a AppInjectionSpec> {
        match *self {
            Self::CloudNativeFullStack(spec) => Some(&spec.app),
            Self::ApplicationMonitoring(spec) => Some(&spec.app),
            Self::ClassicFullStack(_) | Self::HostMonitoring(_) => None,
        }
    }
}

impl OneAgentSpec {
    /// The configured mode.
    ///
    /// When several slots are set (which the validator rejects) the first in
    /// the order classicFullStack, cloudNativeFullStack, applicationMonitoring,
    /// hostMonitoring wins.
    #[must_use]
    pub fn mode(&self) -> Option<OneAgentMode<'_>> {
        if let Some(spec) = &self.classic_full_stack {
            return Some(OneAgentMode::ClassicFullStack(spec));
        }
        if let Some(spec) = &self.cloud_native_full_stack {
            return Some(OneAgentMode::CloudNativeFullStack(spec));
        }
        if let Some(spec) = &self.application_monitoring {
            return Some(OneAgentMode::ApplicationMonitoring(spec));
        }
        self.host_monitoring
            .as_ref()
            .map(OneAgentMode::HostMonitoring)
    }

    /// Number of mode slots that are set.
    #[must_use]
    pub fn configured_modes(&self) -> usize {
        [
            self.classic_full_stack.is_some(),
            self.cloud_native_full_stack.is_some(),
            self.application_monitoring.is_some(),
            self.host_monitoring.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

/// Read-only view over the OneAgent spec and status of one `DynaKube`.
#[derive(Clone, Debug)]
pub struct OneAgent<'a> {
    spec: &'a OneAgentSpec,
    status: Option<&'a OneAgentStatus>,
    code_modules: Option<&'a VersionStatus>,
    name: &'a str,
    api_url_host: String,
    node_image_pull: bool,
}

impl<'a> OneAgent<'a> {
    #[must_use]
    pub fn new(
        spec: &'a OneAgentSpec,
        status: Option<&'a OneAgentStatus>,
        code_modules: Option<&'a VersionStatus>,
        name: &'a str,
        api_url_host: String,
        node_image_pull: bool,
    ) -> Self {
        Self {
            spec,
            status,
            code_modules,
            name,
            api_url_host,
            node_image_pull,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Option<OneAgentMode<'a>> {
        self.spec.mode()
    }

    #[must_use]
    pub fn is_classic_full_stack_mode(&self) -> bool {
        self.spec.classic_full_stack.is_some()
    }

    #[must_use]
    pub fn is_cloud_native_full_stack_mode(&self) -> bool {
        self.spec.cloud_native_full_stack.is_some()
    }

    #[must_use]
    pub fn is_application_monitoring_mode(&self) -> bool {
        self.spec.application_monitoring.is_some()
    }

    #[must_use]
    pub fn is_host_monitoring_mode(&self) -> bool {
        self.spec.host_monitoring.is_some()
    }

    /// Returns true if any mode that runs the host agent is configured.
    #[must_use]
    pub fn is_daemonset_required(&self) -> bool {
        self.is_classic_full_stack_mode()
            || self.is_cloud_native_full_stack_mode()
            || self.is_host_monitoring_mode()
    }

    /// Returns true if the webhook has to inject into application pods.
    #[must_use]
    pub fn is_app_injection_needed(&self) -> bool {
        self.is_cloud_native_full_stack_mode() || self.is_application_monitoring_mode()
    }

    /// Returns true if the configured mode supports a read-only host filesystem.
    #[must_use]
    pub fn is_read_only_fs_supported(&self) -> bool {
        self.is_cloud_native_full_stack_mode() || self.is_host_monitoring_mode()
    }

    /// Returns true if the configured mode needs the CSI driver to provide binaries.
    #[must_use]
    pub fn is_csi_required(&self) -> bool {
        self.is_cloud_native_full_stack_mode()
            || (self.is_host_monitoring_mode() && !self.node_image_pull)
    }

    #[must_use]
    pub fn daemonset_name(&self) -> String {
        format!("{}{ONEAGENT_DAEMONSET_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn tenant_secret(&self) -> String {
        format!("{}{ONEAGENT_TENANT_SECRET_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn connection_info_config_map_name(&self) -> String {
        format!("{}{ONEAGENT_CONNECTION_INFO_SUFFIX}", self.name)
    }

    /// Auto-update is on when the host agent is pinned neither by version nor image.
    #[must_use]
    pub fn is_auto_update_enabled(&self) -> bool {
        self.mode()
            .and_then(|mode| mode.host_spec())
            .is_some_and(|host| host.version.is_empty() && host.image.is_empty())
    }

    #[must_use]
    pub fn init_resources(&self) -> Option<&'a ResourceRequirements> {
        self.mode()
            .and_then(|mode| mode.app_spec())
            .and_then(|app| app.init_resources.as_ref())
    }

    /// Namespace selector of the app-injection mode, `None` for host-only modes.
    #[must_use]
    pub fn namespace_selector(&self) -> Option<&'a LabelSelector> {
        self.mode()
            .and_then(|mode| mode.app_spec())
            .map(|app| &app.namespace_selector)
    }

    #[must_use]
    pub fn sec_comp_profile(&self) -> &'a str {
        self.mode()
            .and_then(|mode| mode.host_spec())
            .map_or("", |host| host.sec_comp_profile.as_str())
    }

    /// Node selector of the host agent, or `fallback` for application monitoring.
    #[must_use]
    pub fn node_selector(
        &self,
        fallback: &'a BTreeMap<String, String>,
    ) -> &'a BTreeMap<String, String> {
        self.mode()
            .and_then(|mode| mode.host_spec())
            .map_or(fallback, |host| &host.node_selector)
    }

    #[must_use]
    pub fn custom_version(&self) -> &'a str {
        match self.mode() {
            Some(OneAgentMode::ApplicationMonitoring(spec)) => &spec.version,
            Some(mode) => mode.host_spec().map_or("", |host| host.version.as_str()),
            None => "",
        }
    }

    #[must_use]
    pub fn custom_image(&self) -> &'a str {
        self.mode()
            .and_then(|mode| mode.host_spec())
            .map_or("", |host| host.image.as_str())
    }

    /// Image of the tenant registry for the given version.
    ///
    /// The version is truncated to three components and tagged `-raw` once.
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
        format!("{}{ONEAGENT_IMAGE_SUB_PATH}:{tag}", self.api_url_host)
    }

    /// Image reported in the status.
    #[must_use]
    pub fn image(&self) -> &'a str {
        self.status.map_or("", |status| status.version.image_id.as_str())
    }

    /// Version reported in the status.
    #[must_use]
    pub fn version(&self) -> &'a str {
        self.status.map_or("", |status| status.version.version.as_str())
    }

    /// Host group from the dedicated field, else from the installer arguments.
    #[must_use]
    pub fn host_group(&self) -> &'a str {
        if !self.spec.host_group.is_empty() {
            return &self.spec.host_group;
        }
        self.host_group_as_param()
    }

    /// Host group given as `--set-host-group=<value>` installer argument.
    #[must_use]
    pub fn host_group_as_param(&self) -> &'a str {
        self.arguments()
            .iter()
            .map(|arg| split_arg(arg))
            .find(|(key, _)| *key == HOST_GROUP_ARGUMENT)
            .map_or("", |(_, value)| value)
    }

    /// Installer arguments of the host agent.
    #[must_use]
    pub fn arguments(&self) -> &'a [String] {
        self.mode()
            .and_then(|mode| mode.host_spec())
            .map_or(&[], |host| host.args.as_slice())
    }

    /// Installer arguments grouped by key, preserving value order.
    #[must_use]
    pub fn arguments_map(&self) -> BTreeMap<&'a str, Vec<&'a str>> {
        let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for arg in self.arguments() {
            let (key, value) = split_arg(arg);
            map.entry(key).or_default().push(value);
        }
        map
    }

    /// Environment of the host agent.
    #[must_use]
    pub fn environment(&self) -> &'a [EnvVar] {
        self.mode()
            .and_then(|mode| mode.host_spec())
            .map_or(&[], |host| host.env.as_slice())
    }

    /// Code-modules image configured by the user.
    ///
    /// Application monitoring only honors it when binaries are delivered by
    /// the CSI driver or the bootstrapper.
    #[must_use]
    pub fn custom_code_modules_image(&self, csi_available: bool) -> &'a str {
        match self.mode() {
            Some(OneAgentMode::CloudNativeFullStack(spec)) => &spec.app.code_modules_image,
            Some(OneAgentMode::ApplicationMonitoring(spec))
                if csi_available || self.node_image_pull =>
            {
                &spec.app.code_modules_image
            }
            _ => "",
        }
    }

    /// Code-modules version reported in the status.
    #[must_use]
    pub fn code_modules_version(&self) -> &'a str {
        self.code_modules.map_or("", |status| status.version.as_str())
    }

    /// Code-modules image reported in the status.
    #[must_use]
    pub fn code_modules_image(&self) -> &'a str {
        self.code_modules.map_or("", |status| status.image_id.as_str())
    }

    /// Host directory holding the agent state of the given tenant.
    #[must_use]
    pub fn host_path(&self, tenant: &str) -> String {
        let host = match self.mode() {
            Some(OneAgentMode::CloudNativeFullStack(spec)) => &spec.host,
            Some(OneAgentMode::HostMonitoring(host)) => host,
            _ => return String::new(),
        };
        let base = if host.storage_host_path.is_empty() {
            STORAGE_VOLUME_DEFAULT_HOST_PATH
        } else {
            host.storage_host_path.trim_end_matches('/')
        };
        format!("{base}/{tenant}")
    }

    /// Communication endpoints reported in the status.
    #[must_use]
    pub fn endpoints(&self) -> &'a str {
        self.status
            .map_or("", |status| status.connection_info_status.connection_info.endpoints.as_str())
    }

    /// Returns true if the status carries at least one communication host.
    #[must_use]
    pub fn has_communication_hosts(&self) -> bool {
        self.status
            .is_some_and(|status| !status.connection_info_status.communication_hosts.is_empty())
    }

    /// Tenant UUID reported in the status.
    #[must_use]
    pub fn tenant_uuid(&self) -> &'a str {
        self.status
            .map_or("", |status| status.connection_info_status.connection_info.tenant_uuid.as_str())
    }
}

pub(crate) fn split_arg(arg: &str) -> (&str, &str) {
    arg.split_once('=').unwrap_or((arg, ""))
}

#[cfg(test)]
#[path = "oneagent_tests.rs"]
mod oneagent_tests;
