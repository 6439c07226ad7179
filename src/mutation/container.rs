// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container, env and volume helpers shared by both injection strategies.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, EnvVar, EnvVarSource, Namespace, ObjectFieldSelector, PodSpec,
    ResourceRequirements, SeccompProfile, SecurityContext, Volume, VolumeMount,
};

use crate::api::latest::DynaKube;
use crate::constants::{
    DEFAULT_GROUP, DEFAULT_RELEASE_PRODUCT_FIELD_PATH, DEFAULT_RELEASE_VERSION_FIELD_PATH,
    DEFAULT_USER, DEPLOYMENT_ORCHESTRATION_TECH, DEPLOYMENT_TYPE_APP_MONITORING,
    DEPLOYMENT_TYPE_CLOUD_NATIVE, ENV_DEPLOYMENT_METADATA, ENV_LD_PRELOAD, ENV_NETWORK_ZONE,
    ENV_RELEASE_BUILD_VERSION, ENV_RELEASE_PRODUCT, ENV_RELEASE_STAGE, ENV_RELEASE_VERSION,
};
use crate::labels::{
    MAPPING_RELEASE_BUILD_VERSION, MAPPING_RELEASE_PRODUCT, MAPPING_RELEASE_STAGE,
    MAPPING_RELEASE_VERSION,
};

/// User and group id of root
const ROOT_ID: i64 = 0;

/// Seccomp profile type applied when the feature flag asks for one
const SECCOMP_RUNTIME_DEFAULT: &str = "RuntimeDefault";

/// Version-detection env vars, their namespace mapping annotation and default field path.
const RELEASE_ENV_MAPPINGS: [(&str, &str, Option<&str>); 4] = [
    (
        ENV_RELEASE_VERSION,
        MAPPING_RELEASE_VERSION,
        Some(DEFAULT_RELEASE_VERSION_FIELD_PATH),
    ),
    (
        ENV_RELEASE_PRODUCT,
        MAPPING_RELEASE_PRODUCT,
        Some(DEFAULT_RELEASE_PRODUCT_FIELD_PATH),
    ),
    (ENV_RELEASE_STAGE, MAPPING_RELEASE_STAGE, None),
    (ENV_RELEASE_BUILD_VERSION, MAPPING_RELEASE_BUILD_VERSION, None),
];

// ============================================================================
// Env vars
// ============================================================================

#[must_use]
pub fn value_env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// Env var filled from a field of the pod (downward API).
#[must_use]
pub fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                api_version: None,
            }),
            ..EnvVarSource::default()
        }),
    }
}

#[must_use]
pub fn find_env<'a>(container: &'a Container, name: &str) -> Option<&'a EnvVar> {
    container.env.as_ref()?.iter().find(|env| env.name == name)
}

#[must_use]
pub fn has_env(container: &Container, name: &str) -> bool {
    find_env(container, name).is_some()
}

/// Appends `env` unless the container already defines a variable of that name.
pub fn add_env_if_missing(container: &mut Container, env: EnvVar) {
    if !has_env(container, &env.name) {
        container.env.get_or_insert_with(Vec::new).push(env);
    }
}

/// Sets `env`, replacing a variable of the same name.
pub fn set_env(container: &mut Container, env: EnvVar) {
    let envs = container.env.get_or_insert_with(Vec::new);
    match envs.iter_mut().find(|existing| existing.name == env.name) {
        Some(existing) => *existing = env,
        None => envs.push(env),
    }
}

/// Appends `library` to an existing preload list.
///
/// The list keeps its separator: space if the existing value contains one,
/// colon otherwise. A library that is already listed is not added again.
///
/// # Examples
///
/// ```rust
/// use dynakube::mutation::container::concat_preload;
///
/// assert_eq!(concat_preload("", "/a.so"), "/a.so");
/// assert_eq!(concat_preload("/x.so", "/a.so"), "/x.so:/a.so");
/// assert_eq!(concat_preload("/x.so /y.so", "/a.so"), "/x.so /y.so /a.so");
/// assert_eq!(concat_preload("/x.so:/a.so", "/a.so"), "/x.so:/a.so");
/// ```
#[must_use]
pub fn concat_preload(existing: &str, library: &str) -> String {
    if existing.is_empty() {
        return library.to_string();
    }
    let separator = if existing.contains(' ') { ' ' } else { ':' };
    if existing
        .split([' ', ':'])
        .any(|entry| entry == library)
    {
        return existing.to_string();
    }
    format!("{existing}{separator}{library}")
}

/// Adds `library` to the container's `LD_PRELOAD`, creating the variable if needed.
pub fn add_preload(container: &mut Container, library: &str) {
    let envs = container.env.get_or_insert_with(Vec::new);
    match envs.iter_mut().find(|env| env.name == ENV_LD_PRELOAD) {
        Some(env) if env.value_from.is_none() => {
            let existing = env.value.as_deref().unwrap_or_default();
            env.value = Some(concat_preload(existing, library));
        }
        // a preload sourced from elsewhere cannot be extended
        Some(_) => {}
        None => envs.push(value_env(ENV_LD_PRELOAD, library)),
    }
}

/// Deployment metadata reported by the agent.
#[must_use]
pub fn deployment_metadata(dk: &DynaKube, cluster_id: &str) -> String {
    let deployment_type = if dk.one_agent().is_cloud_native_full_stack_mode() {
        DEPLOYMENT_TYPE_CLOUD_NATIVE
    } else {
        DEPLOYMENT_TYPE_APP_MONITORING
    };
    format!(
        "orchestration_tech={DEPLOYMENT_ORCHESTRATION_TECH}-{deployment_type};script_version={};orchestrator_id={cluster_id}",
        env!("CARGO_PKG_VERSION")
    )
}

/// Adds the deployment metadata and network zone of the `DynaKube`.
pub fn add_dynakube_envs(container: &mut Container, dk: &DynaKube, cluster_id: &str) {
    add_env_if_missing(
        container,
        value_env(ENV_DEPLOYMENT_METADATA, deployment_metadata(dk, cluster_id)),
    );
    if !dk.spec.network_zone.is_empty() {
        add_env_if_missing(
            container,
            value_env(ENV_NETWORK_ZONE, dk.spec.network_zone.clone()),
        );
    }
}

/// Release env vars derived from pod labels.
///
/// The pod namespace can remap each variable to another field path through a
/// `mapping.release.dynatrace.com/*` annotation. Stage and build version have
/// no default and are only set when mapped.
#[must_use]
pub fn version_detection_envs(namespace: &Namespace) -> Vec<EnvVar> {
    let empty = BTreeMap::new();
    let annotations = namespace.metadata.annotations.as_ref().unwrap_or(&empty);

    RELEASE_ENV_MAPPINGS
        .iter()
        .filter_map(|(env_name, mapping, default_path)| {
            annotations
                .get(*mapping)
                .map(String::as_str)
                .or(*default_path)
                .map(|path| field_env(env_name, path))
        })
        .collect()
}

/// Adds the release env vars without touching those the user already set.
pub fn add_version_detection_envs(container: &mut Container, namespace: &Namespace) {
    for env in version_detection_envs(namespace) {
        add_env_if_missing(container, env);
    }
}

// ============================================================================
// Volumes
// ============================================================================

#[must_use]
pub fn has_volume_mount(container: &Container, volume_name: &str) -> bool {
    container
        .volume_mounts
        .iter()
        .flatten()
        .any(|mount| mount.name == volume_name)
}

#[must_use]
pub fn has_mount_path(container: &Container, mount_path: &str) -> bool {
    container
        .volume_mounts
        .iter()
        .flatten()
        .any(|mount| mount.mount_path == mount_path)
}

pub fn add_volume_mount(container: &mut Container, mount: VolumeMount) {
    if !has_mount_path(container, &mount.mount_path) {
        container.volume_mounts.get_or_insert_with(Vec::new).push(mount);
    }
}

#[must_use]
pub fn mount(volume_name: &str, mount_path: &str, sub_path: Option<String>) -> VolumeMount {
    VolumeMount {
        name: volume_name.to_string(),
        mount_path: mount_path.to_string(),
        sub_path,
        ..VolumeMount::default()
    }
}

/// Adds `volume` to the pod unless a volume of that name exists.
pub fn add_volume(spec: &mut PodSpec, volume: Volume) {
    let volumes = spec.volumes.get_or_insert_with(Vec::new);
    if !volumes.iter().any(|existing| existing.name == volume.name) {
        volumes.push(volume);
    }
}

// ============================================================================
// Init container
// ============================================================================

/// Security context of the injected init container.
///
/// User and group are taken field by field from the first user container's
/// security context, then the pod security context, else
/// [`DEFAULT_USER`]/[`DEFAULT_GROUP`]. The container runs as non-root unless
/// the target explicitly runs as root.
#[must_use]
pub fn init_security_context(spec: &PodSpec, dk: &DynaKube) -> SecurityContext {
    let container_context = spec
        .containers
        .first()
        .and_then(|container| container.security_context.as_ref());
    let pod_context = spec.security_context.as_ref();
    let user = container_context
        .and_then(|ctx| ctx.run_as_user)
        .or_else(|| pod_context.and_then(|ctx| ctx.run_as_user))
        .unwrap_or(DEFAULT_USER);
    let group = container_context
        .and_then(|ctx| ctx.run_as_group)
        .or_else(|| pod_context.and_then(|ctx| ctx.run_as_group))
        .unwrap_or(DEFAULT_GROUP);

    let seccomp_profile = dk
        .feature_flags()
        .init_container_seccomp()
        .then(|| SeccompProfile {
            type_: SECCOMP_RUNTIME_DEFAULT.to_string(),
            localhost_profile: None,
        });

    SecurityContext {
        allow_privilege_escalation: Some(false),
        privileged: Some(false),
        read_only_root_filesystem: Some(true),
        run_as_non_root: Some(user != ROOT_ID && group != ROOT_ID),
        run_as_user: Some(user),
        run_as_group: Some(group),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            add: None,
        }),
        seccomp_profile,
        ..SecurityContext::default()
    }
}

/// Resources of the init container as configured in the `DynaKube`.
#[must_use]
pub fn init_resources(dk: &DynaKube) -> Option<ResourceRequirements> {
    dk.one_agent().init_resources().cloned()
}

/// Position of the injected init container.
#[must_use]
pub fn find_init_container(spec: &PodSpec, name: &str) -> Option<usize> {
    spec.init_containers
        .as_ref()?
        .iter()
        .position(|container| container.name == name)
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod container_tests;
