// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rules of the optional modules: KSPM, extensions and telemetry ingest.

use std::collections::BTreeSet;

use super::ValidationContext;
use crate::api::latest::kspm::DEFAULT_MAPPED_HOST_PATH;
use crate::api::latest::telemetryingest::KNOWN_PROTOCOLS;

pub const ERROR_TOO_MANY_AG_REPLICAS: &str = "The Dynakube's specification specifies KSPM, but has more than one ActiveGate replica. Only one ActiveGate replica is allowed in combination with KSPM.";

pub const ERROR_KSPM_MISSING_KUBEMON: &str = "The Dynakube's specification specifies KSPM, but \"kubernetes-monitoring\" is not enabled on the ActiveGate.";

pub const ERROR_KSPM_MISSING_IMAGE: &str = "The Dynakube's specification specifies KSPM, but no image repository/tag is configured for the node configuration collector.";

pub const ERROR_KSPM_ROOT_HOST_PATH: &str = "The Dynakube's specification specifies KSPM, and mappedHostPaths contains '/' next to other paths. Either map the root path alone or list the individual paths.";

pub const ERROR_KSPM_RELATIVE_HOST_PATH: &str =
    "The Dynakube's specification specifies KSPM, but mappedHostPaths contains relative paths. Only absolute paths are allowed.";

pub const ERROR_EXTENSION_EXECUTION_CONTROLLER_IMAGE_NOT_SPECIFIED: &str = "The Dynakube's specification enables extensions, but the image repository/tag of the extension execution controller is not set.";

pub const ERROR_EXTENSION_EXECUTION_CONTROLLER_INVALID_PVC_CONFIGURATION: &str = "The Dynakube's specification specifies both an ephemeral volume and a PersistentVolumeClaim for the extension execution controller. Only one of them may be set.";

pub const WARNING_KSPM_NO_MAPPED_HOST_PATHS: &str = "The Dynakube's specification enables KSPM without mappedHostPaths. The node configuration collector will not be able to scan any files.";

pub fn kspm_too_many_activegate_replicas(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    (dk.kspm().is_enabled() && dk.active_gate().replicas() > 1)
        .then(|| ERROR_TOO_MANY_AG_REPLICAS.to_string())
}

pub fn kspm_missing_kubernetes_monitoring(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    (dk.kspm().is_enabled() && !dk.active_gate().is_kubernetes_monitoring_enabled())
        .then(|| ERROR_KSPM_MISSING_KUBEMON.to_string())
}

pub fn kspm_missing_image(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    let image = &dk.spec.templates.kspm_node_configuration_collector.image_ref;
    (dk.kspm().is_enabled() && (image.repository.is_empty() || image.tag.is_empty()))
        .then(|| ERROR_KSPM_MISSING_IMAGE.to_string())
}

pub fn kspm_root_host_path_mixed(ctx: &ValidationContext<'_>) -> Option<String> {
    let paths = ctx.dynakube.kspm().mapped_host_paths();
    (paths.len() > 1 && paths.iter().any(|path| path == DEFAULT_MAPPED_HOST_PATH))
        .then(|| ERROR_KSPM_ROOT_HOST_PATH.to_string())
}

pub fn kspm_relative_host_path(ctx: &ValidationContext<'_>) -> Option<String> {
    ctx.dynakube
        .kspm()
        .mapped_host_paths()
        .iter()
        .any(|path| !path.starts_with('/'))
        .then(|| ERROR_KSPM_RELATIVE_HOST_PATH.to_string())
}

pub fn extensions_missing_executor_image(ctx: &ValidationContext<'_>) -> Option<String> {
    let extensions = ctx.dynakube.extensions();
    (extensions.is_enabled() && !extensions.has_executor_image())
        .then(|| ERROR_EXTENSION_EXECUTION_CONTROLLER_IMAGE_NOT_SPECIFIED.to_string())
}

pub fn extensions_conflicting_volume_config(ctx: &ValidationContext<'_>) -> Option<String> {
    let extensions = ctx.dynakube.extensions();
    (extensions.is_enabled() && extensions.has_conflicting_volume_config())
        .then(|| ERROR_EXTENSION_EXECUTION_CONTROLLER_INVALID_PVC_CONFIGURATION.to_string())
}

pub fn telemetry_ingest_invalid_protocol(ctx: &ValidationContext<'_>) -> Option<String> {
    let invalid: Vec<&str> = ctx
        .dynakube
        .telemetry_ingest()
        .protocols()
        .into_iter()
        .filter(|protocol| !KNOWN_PROTOCOLS.contains(protocol))
        .collect();
    if invalid.is_empty() {
        return None;
    }
    Some(format!(
        "The DynaKube's specification contains unknown telemetry ingest protocols: {}. Supported protocols are: {}.",
        invalid.join(", "),
        KNOWN_PROTOCOLS.join(", ")
    ))
}

pub fn telemetry_ingest_duplicate_protocol(ctx: &ValidationContext<'_>) -> Option<String> {
    let mut seen = BTreeSet::new();
    let duplicates: BTreeSet<&str> = ctx
        .dynakube
        .telemetry_ingest()
        .protocols()
        .into_iter()
        .filter(|protocol| !seen.insert(*protocol))
        .collect();
    if duplicates.is_empty() {
        return None;
    }
    Some(format!(
        "The DynaKube's specification contains duplicate telemetry ingest protocols: {}.",
        duplicates.into_iter().collect::<Vec<_>>().join(", ")
    ))
}

pub fn kspm_no_mapped_host_paths(ctx: &ValidationContext<'_>) -> Option<String> {
    let kspm = ctx.dynakube.kspm();
    (kspm.is_enabled() && kspm.mapped_host_paths().is_empty())
        .then(|| WARNING_KSPM_NO_MAPPED_HOST_PATHS.to_string())
}

#[cfg(test)]
#[path = "modules_tests.rs"]
mod modules_tests;
