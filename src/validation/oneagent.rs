// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OneAgent rules: modes, CSI usage, installer arguments and selector conflicts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use super::ValidationContext;
use crate::api::latest::DynaKube;
use crate::selector::{label_selector_matches, node_selectors_overlap, validate_label_selector};

pub const ERROR_CONFLICTING_ONEAGENT_MODE: &str =
    "The DynaKube specification attempts to use multiple OneAgent modes simultaneously, which is not supported.";

pub const ERROR_CSI_REQUIRED: &str = "The DynaKube's specification requires the CSI driver to work, but the dynatrace-oneagent-csi-driver daemonset was not found.
Make sure you deployed the correct manifests.";

pub const ERROR_READ_ONLY_CSI_VOLUME_WITHOUT_CSI: &str = "The DynaKube specification enables the read-only CSI volume feature flag, but no configured OneAgent mode uses the CSI driver.";

pub const ERROR_IMAGE_FIELD_SET_WITHOUT_CSI_FLAG: &str = "The DynaKube specification attempts to enable ApplicationMonitoring/CloudNativeFullstack mode and retrieve the respective codeModules image, but the CSI driver and/or node image pull is not enabled.";

pub const ERROR_IMAGE_PULL_REQUIRES_CODE_MODULES_IMAGE: &str =
    "The DynaKube specification enables node image pull, but the code modules image is not set.";

pub const ERROR_VOLUME_STORAGE_READ_ONLY_MODE_CONFLICT: &str = "The DynaKube specification specifies a read-only host file system while OneAgent has volume storage enabled.";

pub const ERROR_HOST_ID_SOURCE_ARGUMENT_IN_CLOUD_NATIVE: &str =
    "Setting --set-host-id-source in CloudNativeFullStack mode is not allowed.";

pub const ERROR_INVALID_ONEAGENT_VERSION: &str = "The OneAgent's version is only valid in the format 'major.minor.patch.timestamp', e.g. 1.0.0.20240101-000000";

pub const ERROR_CONFLICTING_NAMESPACE_SELECTOR: &str = "The DynaKube's specification tries to inject into namespaces where another Dynakube already injects into, which is not supported.
Make sure the namespaceSelector doesn't conflict with other Dynakubes namespaceSelector";

pub const WARNING_ONEAGENT_INSTALLER_ENV_VARS: &str = "The environment variables ONEAGENT_INSTALLER_SCRIPT_URL and ONEAGENT_INSTALLER_TOKEN are only relevant for an unsupported image type. Please ensure you are using a supported image.";

pub const WARNING_HOST_GROUP_CONFLICT: &str = "The DynaKube specification sets the host group using the --set-host-group parameter. Instead, specify the new spec.oneagent.hostGroup field. If both settings are used, the new field takes precedence over the parameter.";

pub const WARNING_DEPRECATED_AUTO_UPDATE: &str = "AutoUpdate field is deprecated. The feature is still available by configuring the Dynatrace tenant. Please visit our documentation for more details.";

const ENV_ENABLE_VOLUME_STORAGE: &str = "ONEAGENT_ENABLE_VOLUME_STORAGE";
const ENV_INSTALLER_SCRIPT_URL: &str = "ONEAGENT_INSTALLER_SCRIPT_URL";
const ENV_INSTALLER_TOKEN: &str = "ONEAGENT_INSTALLER_TOKEN";

const ARG_SET_HOST_PROPERTY: &str = "--set-host-property";
const ARG_SET_HOST_TAG: &str = "--set-host-tag";
const ARG_SET_HOST_ID_SOURCE: &str = "--set-host-id-source";

static ONEAGENT_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+\.\d{8}-\d{6}$").expect("OneAgent version regex is valid")
});

pub fn conflicting_modes(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    if dk.spec.one_agent.configured_modes() > 1 {
        info!(name = %dk.name(), namespace = %dk.namespace(), "DynaKube has conflicting OneAgent modes");
        return Some(ERROR_CONFLICTING_ONEAGENT_MODE.to_string());
    }
    None
}

pub fn missing_csi_daemonset(ctx: &ValidationContext<'_>) -> Option<String> {
    (ctx.modules.csi_driver
        && ctx.dynakube.one_agent().is_csi_required()
        && !ctx.csi_daemonset_present)
        .then(|| ERROR_CSI_REQUIRED.to_string())
}

/// Application monitoring mounts the CSI volume whenever the driver is deployed.
fn uses_csi_volume(ctx: &ValidationContext<'_>) -> bool {
    let one_agent = ctx.dynakube.one_agent();
    ctx.modules.csi_driver
        && (one_agent.is_csi_required() || one_agent.is_application_monitoring_mode())
}

pub fn readonly_csi_volume_without_csi(ctx: &ValidationContext<'_>) -> Option<String> {
    (ctx.dynakube.feature_flags().readonly_csi_volume() && !uses_csi_volume(ctx))
        .then(|| ERROR_READ_ONLY_CSI_VOLUME_WITHOUT_CSI.to_string())
}

pub fn image_field_set_without_csi_flag(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    if ctx.modules.csi_driver || dk.feature_flags().node_image_pull() {
        return None;
    }

    let one_agent = &dk.spec.one_agent;
    let app_image_set = one_agent
        .application_monitoring
        .as_ref()
        .is_some_and(|spec| !spec.app.code_modules_image.is_empty());
    let cloud_native_image_set = one_agent
        .cloud_native_full_stack
        .as_ref()
        .is_some_and(|spec| !spec.app.code_modules_image.is_empty());

    (app_image_set || cloud_native_image_set)
        .then(|| ERROR_IMAGE_FIELD_SET_WITHOUT_CSI_FLAG.to_string())
}

pub fn missing_code_modules_image(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    let one_agent = dk.one_agent();
    (one_agent.is_app_injection_needed()
        && dk.feature_flags().node_image_pull()
        && one_agent.custom_code_modules_image(ctx.modules.csi_driver).is_empty())
    .then(|| ERROR_IMAGE_PULL_REQUIRES_CODE_MODULES_IMAGE.to_string())
}

fn env_value<'a>(dk: &'a DynaKube, name: &str) -> Option<&'a str> {
    dk.one_agent()
        .environment()
        .iter()
        .find(|env| env.name == name)
        .map(|env| env.value.as_deref().unwrap_or_default())
}

pub fn conflicting_volume_storage_settings(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    let volume_storage_disabled =
        env_value(dk, ENV_ENABLE_VOLUME_STORAGE).is_some_and(|value| value != "true");

    (dk.one_agent().is_read_only_fs_supported() && volume_storage_disabled)
        .then(|| ERROR_VOLUME_STORAGE_READ_ONLY_MODE_CONFLICT.to_string())
}

/// Only `--set-host-property` and `--set-host-tag` may repeat; a tag may not
/// repeat with the same value.
pub fn duplicate_arguments(ctx: &ValidationContext<'_>) -> Option<String> {
    let arguments = ctx.dynakube.one_agent().arguments_map();

    for (key, values) in &arguments {
        if *key == ARG_SET_HOST_TAG {
            let duplicates = find_duplicates(values);
            if !duplicates.is_empty() {
                return Some(format!(
                    "Providing the same tag(s) ({}) multiple times with --set-host-tag is not allowed.",
                    duplicates.join(", ")
                ));
            }
        } else if *key != ARG_SET_HOST_PROPERTY && values.len() > 1 {
            return Some(format!(
                "{key} has been provided multiple times. Only --set-host-property and --set-host-tag arguments may be provided multiple times."
            ));
        }
    }
    None
}

fn find_duplicates<'a>(values: &[&'a str]) -> Vec<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut duplicates = Vec::new();
    for &value in values {
        let count = counts.entry(value).or_default();
        *count += 1;
        if *count == 2 {
            duplicates.push(value);
        }
    }
    duplicates
}

pub fn forbidden_host_id_source_argument(ctx: &ValidationContext<'_>) -> Option<String> {
    let one_agent = ctx.dynakube.one_agent();
    (one_agent.is_cloud_native_full_stack_mode()
        && one_agent.arguments_map().contains_key(ARG_SET_HOST_ID_SOURCE))
    .then(|| ERROR_HOST_ID_SOURCE_ARGUMENT_IN_CLOUD_NATIVE.to_string())
}

pub fn invalid_version(ctx: &ValidationContext<'_>) -> Option<String> {
    let version = ctx.dynakube.one_agent().custom_version();
    (!version.is_empty() && !ONEAGENT_VERSION_REGEX.is_match(version))
        .then(|| ERROR_INVALID_ONEAGENT_VERSION.to_string())
}

fn node_selector(dk: &DynaKube) -> &BTreeMap<String, String> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    let fallback = dk
        .spec
        .templates
        .log_monitoring
        .as_ref()
        .map_or(&EMPTY, |template| &template.node_selector);
    dk.one_agent().node_selector(fallback)
}

/// Returns true if `dk` and `other` would both run a node-level agent on the same node.
fn runs_agent_on_same_nodes(dk: &DynaKube, other: &DynaKube) -> bool {
    let same_api_url = dk.api_url() == other.api_url();
    let other_daemonset = other.one_agent().is_daemonset_required();
    let other_standalone_logs = other.log_monitoring().is_standalone();

    let one_agent_conflict = dk.one_agent().is_daemonset_required()
        && (other_daemonset || (other_standalone_logs && same_api_url));
    let log_monitoring_conflict = dk.log_monitoring().is_standalone()
        && same_api_url
        && (other_daemonset || other_standalone_logs);

    (one_agent_conflict || log_monitoring_conflict)
        && node_selectors_overlap(node_selector(dk), node_selector(other))
}

/// Only one node-level agent per node is supported unless both objects opt
/// into multiple OS agents per node.
pub fn conflicting_node_selector(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    if !dk.one_agent().is_daemonset_required() && !dk.log_monitoring().is_standalone() {
        return None;
    }
    let multi_tenant = dk.feature_flags().multiple_osagents_on_node();

    let conflicting: BTreeSet<&str> = ctx
        .siblings
        .iter()
        .filter(|other| other.name() != dk.name())
        .filter(|other| !(multi_tenant && other.feature_flags().multiple_osagents_on_node()))
        .filter(|other| runs_agent_on_same_nodes(dk, other))
        .map(DynaKube::name)
        .collect();

    if conflicting.is_empty() {
        return None;
    }
    info!(name = %dk.name(), namespace = %dk.namespace(), "DynaKube has conflicting OneAgent nodeSelector");
    Some(format!(
        "The Dynakube specification conflicts with another Dynakube's OneAgent or Standalone-LogMonitoring. Only one Agent per node is supported.
Use a nodeSelector to avoid this conflict. Conflicting DynaKubes: {}",
        conflicting.into_iter().collect::<Vec<_>>().join(", ")
    ))
}

/// No namespace may be selected for app injection by two `DynaKube`s.
pub fn conflicting_namespace_selector(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    let selector = dk.one_agent().namespace_selector()?;
    let flags = dk.feature_flags();

    let other_selectors: Vec<_> = ctx
        .siblings
        .iter()
        .filter(|other| other.name() != dk.name())
        .filter_map(|other| other.one_agent().namespace_selector())
        .collect();
    if other_selectors.is_empty() {
        return None;
    }

    let conflict = ctx.namespaces.iter().any(|namespace| {
        let name = namespace.metadata.name.as_deref().unwrap_or_default();
        let labels = namespace.metadata.labels.clone().unwrap_or_default();
        !flags.is_namespace_ignored(name)
            && label_selector_matches(selector, &labels)
            && other_selectors
                .iter()
                .any(|other| label_selector_matches(other, &labels))
    });

    conflict.then(|| ERROR_CONFLICTING_NAMESPACE_SELECTOR.to_string())
}

pub fn namespace_selector_violates_label_spec(ctx: &ValidationContext<'_>) -> Option<String> {
    let selector = ctx.dynakube.one_agent().namespace_selector()?;
    let violations = validate_label_selector(selector);
    if violations.is_empty() {
        return None;
    }
    Some(format!(
        "The DynaKube's namespaceSelector contains invalid label keys, values or operators: {}",
        violations.join("; ")
    ))
}

pub fn installer_env_vars(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    (env_value(dk, ENV_INSTALLER_SCRIPT_URL).is_some() || env_value(dk, ENV_INSTALLER_TOKEN).is_some())
        .then(|| WARNING_ONEAGENT_INSTALLER_ENV_VARS.to_string())
}

pub fn host_group_as_argument(ctx: &ValidationContext<'_>) -> Option<String> {
    (!ctx.dynakube.one_agent().host_group_as_param().is_empty())
        .then(|| WARNING_HOST_GROUP_CONFLICT.to_string())
}

pub fn deprecated_auto_update(ctx: &ValidationContext<'_>) -> Option<String> {
    ctx.dynakube
        .one_agent()
        .mode()
        .and_then(|mode| mode.host_spec())
        .is_some_and(|host| host.auto_update.is_some())
        .then(|| WARNING_DEPRECATED_AUTO_UPDATE.to_string())
}

#[cfg(test)]
#[path = "oneagent_tests.rs"]
mod oneagent_tests;
