// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! v1 injection: `install-oneagent` init container running the webhook image.
//!
//! The init container provisions the agent into the `oneagent-bin` volume
//! (CSI-backed or an empty dir filled by the installer) and writes the
//! per-container configuration into `oneagent-share`. User containers get the
//! preload library, both volumes and the deployment metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    CSIVolumeSource, Container, EmptyDirVolumeSource, PodSpec, SecretVolumeSource, Volume,
};
use tracing::debug;

use crate::api::duration::format_go_duration;
use crate::cluster::ClusterClient;
use crate::constants::{
    AGENT_INIT_SECRET_NAME, CONTAINER_CONF_PATH, CSI_APP_MONITORING_MODE, CSI_DRIVER_NAME,
    CSI_VOLUME_ATTRIBUTE_DYNAKUBE, CSI_VOLUME_ATTRIBUTE_MODE, CSI_VOLUME_ATTRIBUTE_RETRY_TIMEOUT,
    CURL_OPTIONS_PATH, CURL_OPTIONS_SUB_PATH, CUSTOM_CERTS_PATH, CUSTOM_CERTS_SUB_PATH,
    DEFAULT_INSTALL_PATH, DEFAULT_TECHNOLOGIES, ENV_BASE_POD_NAME, ENV_CONTAINERS_COUNT,
    ENV_DEPLOYMENT_METADATA, ENV_FAILURE_POLICY, ENV_INSTALLER_FLAVOR, ENV_INSTALLER_TECH,
    ENV_INSTALLER_URL, ENV_INSTALLER_VERSION, ENV_INSTALL_PATH, ENV_LD_PRELOAD, ENV_MODE,
    ENV_NAMESPACE, ENV_NODE_NAME, ENV_ONEAGENT_INJECTED, ENV_POD_NAME, ENV_POD_UID,
    FIELD_PATH_NAMESPACE, FIELD_PATH_NODE_NAME, FIELD_PATH_POD_NAME, FIELD_PATH_POD_UID,
    INJECTION_CONFIG_MOUNT_PATH, INJECTION_CONFIG_VOLUME_NAME, INSTALLER_FLAVOR,
    INSTALLER_MODE_INSTALLER, INSTALLER_MODE_PROVISIONED, INSTALL_CONTAINER_NAME, LD_PRELOAD_PATH,
    LD_PRELOAD_SUB_PATH, LIB_AGENT_PROC_PATH, ONEAGENT_BIN_MOUNT_PATH, ONEAGENT_BIN_VOLUME_NAME,
    ONEAGENT_SHARE_MOUNT_PATH, ONEAGENT_SHARE_VOLUME_NAME,
};
use crate::errors::InjectionError;
use crate::labels::{
    ANNOTATION_INSTALLER_URL, ANNOTATION_INSTALL_PATH, ANNOTATION_TECHNOLOGIES,
    ANNOTATION_VOLUME_TYPE, REASON_EMPTY_CONNECTION_INFO, REASON_EMPTY_TENANT_UUID,
    REASON_UNKNOWN_CODE_MODULE, VOLUME_TYPE_EPHEMERAL,
};
use crate::mutation::container::{
    add_dynakube_envs, add_preload, add_version_detection_envs, add_volume, add_volume_mount,
    field_env, find_init_container, has_env, has_volume_mount, init_resources,
    init_security_context, mount, set_env, value_env,
};
use crate::mutation::init_secret::{ensure_init_secret, has_activegate_tls};
use crate::mutation::{InjectionSettings, Injector, MutationRequest, Strategy};

/// Per-pod values shared by the init container and the user containers.
struct InstallSettings {
    install_path: String,
    activegate_tls: bool,
    curl_options: bool,
    version_detection: bool,
}

impl InstallSettings {
    fn from_request(request: &MutationRequest) -> Self {
        let flags = request.dynakube.feature_flags();
        Self {
            install_path: request
                .pod_annotation(ANNOTATION_INSTALL_PATH)
                .unwrap_or(DEFAULT_INSTALL_PATH)
                .to_string(),
            activegate_tls: has_activegate_tls(&request.dynakube),
            curl_options: flags.oneagent_initial_connect_retry() > -1,
            version_detection: flags.label_version_detection(),
        }
    }

    fn preload_library(&self) -> String {
        format!("{}/{LIB_AGENT_PROC_PATH}", self.install_path)
    }
}

/// Injector for the init-container installer strategy.
pub struct InitContainerInjector {
    client: Arc<dyn ClusterClient>,
    settings: Arc<InjectionSettings>,
}

impl InitContainerInjector {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, settings: Arc<InjectionSettings>) -> Self {
        Self { client, settings }
    }

    /// Returns true if the agent binaries come from the CSI driver.
    fn uses_csi(&self, request: &MutationRequest) -> bool {
        self.settings.modules.csi_driver
            && request.pod_annotation(ANNOTATION_VOLUME_TYPE) != Some(VOLUME_TYPE_EPHEMERAL)
            && request.dynakube.one_agent().is_app_injection_needed()
    }

    fn bin_volume(&self, request: &MutationRequest, csi: bool) -> Volume {
        if !csi {
            return empty_dir_volume(ONEAGENT_BIN_VOLUME_NAME);
        }
        let dk = &request.dynakube;
        let flags = dk.feature_flags();
        Volume {
            name: ONEAGENT_BIN_VOLUME_NAME.to_string(),
            csi: Some(CSIVolumeSource {
                driver: CSI_DRIVER_NAME.to_string(),
                read_only: Some(flags.readonly_csi_volume()),
                volume_attributes: Some(BTreeMap::from([
                    (
                        CSI_VOLUME_ATTRIBUTE_MODE.to_string(),
                        CSI_APP_MONITORING_MODE.to_string(),
                    ),
                    (CSI_VOLUME_ATTRIBUTE_DYNAKUBE.to_string(), dk.name().to_string()),
                    (
                        CSI_VOLUME_ATTRIBUTE_RETRY_TIMEOUT.to_string(),
                        format_go_duration(flags.max_csi_mount_timeout()),
                    ),
                ])),
                ..CSIVolumeSource::default()
            }),
            ..Volume::default()
        }
    }

    fn init_container(&self, request: &MutationRequest, install: &InstallSettings, csi: bool) -> Container {
        let dk = &request.dynakube;
        let mode = if csi {
            INSTALLER_MODE_PROVISIONED
        } else {
            INSTALLER_MODE_INSTALLER
        };
        let env = vec![
            value_env(ENV_FAILURE_POLICY, request.failure_policy().as_str()),
            field_env(ENV_POD_NAME, FIELD_PATH_POD_NAME),
            field_env(ENV_POD_UID, FIELD_PATH_POD_UID),
            value_env(ENV_BASE_POD_NAME, request.base_pod_name()),
            field_env(ENV_NAMESPACE, FIELD_PATH_NAMESPACE),
            field_env(ENV_NODE_NAME, FIELD_PATH_NODE_NAME),
            value_env(ENV_INSTALLER_FLAVOR, INSTALLER_FLAVOR),
            value_env(
                ENV_INSTALLER_TECH,
                request
                    .pod_annotation(ANNOTATION_TECHNOLOGIES)
                    .unwrap_or(DEFAULT_TECHNOLOGIES),
            ),
            value_env(ENV_INSTALL_PATH, install.install_path.clone()),
            value_env(
                ENV_INSTALLER_URL,
                request
                    .pod_annotation(ANNOTATION_INSTALLER_URL)
                    .unwrap_or_default(),
            ),
            value_env(ENV_INSTALLER_VERSION, dk.one_agent().code_modules_version()),
            value_env(ENV_MODE, mode),
            value_env(ENV_ONEAGENT_INJECTED, "true"),
            value_env(ENV_CONTAINERS_COUNT, "0"),
        ];

        let default_spec = PodSpec::default();
        let spec = request.pod.spec.as_ref().unwrap_or(&default_spec);
        Container {
            name: INSTALL_CONTAINER_NAME.to_string(),
            image: Some(self.settings.webhook_image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            args: Some(vec!["init".to_string()]),
            env: Some(env),
            resources: init_resources(dk),
            security_context: Some(init_security_context(spec, dk)),
            volume_mounts: Some(vec![
                mount(INJECTION_CONFIG_VOLUME_NAME, INJECTION_CONFIG_MOUNT_PATH, None),
                mount(ONEAGENT_BIN_VOLUME_NAME, ONEAGENT_BIN_MOUNT_PATH, None),
                mount(ONEAGENT_SHARE_VOLUME_NAME, ONEAGENT_SHARE_MOUNT_PATH, None),
            ]),
            ..Container::default()
        }
    }

    /// Injects the user containers at `indices` and lists them on the init container.
    fn inject_containers(&self, request: &mut MutationRequest, indices: &[usize], install: &InstallSettings) {
        let dk = request.dynakube.clone();
        let namespace = request.namespace.clone();
        let cluster_id = self.settings.cluster_id.clone();
        let spec = request.spec_mut();

        let Some(init_index) = find_init_container(spec, INSTALL_CONTAINER_NAME) else {
            return;
        };
        let mut count = spec
            .init_containers
            .as_ref()
            .and_then(|containers| containers.get(init_index))
            .map_or(0, container_count);

        for &index in indices {
            let Some(container) = spec.containers.get_mut(index) else {
                continue;
            };
            update_container(container, install);
            add_dynakube_envs(container, &dk, &cluster_id);
            if install.version_detection {
                add_version_detection_envs(container, &namespace);
            }

            count += 1;
            let name = container.name.clone();
            let image = container.image.clone().unwrap_or_default();
            if let Some(init) = spec
                .init_containers
                .as_mut()
                .and_then(|containers| containers.get_mut(init_index))
            {
                set_env(init, value_env(&format!("CONTAINER_{count}_NAME"), name));
                set_env(init, value_env(&format!("CONTAINER_{count}_IMAGE"), image));
                set_env(init, value_env(ENV_CONTAINERS_COUNT, count.to_string()));
            }
        }
    }
}

#[async_trait]
impl Injector for InitContainerInjector {
    fn strategy(&self) -> Strategy {
        Strategy::V1
    }

    fn is_enabled(&self, request: &MutationRequest) -> bool {
        request.dynakube.one_agent().is_app_injection_needed()
    }

    fn is_injected(&self, container: &Container) -> bool {
        has_env(container, ENV_LD_PRELOAD)
            && has_env(container, ENV_DEPLOYMENT_METADATA)
            && has_volume_mount(container, ONEAGENT_BIN_VOLUME_NAME)
            && has_volume_mount(container, ONEAGENT_SHARE_VOLUME_NAME)
    }

    async fn skip_reasons(
        &self,
        request: &MutationRequest,
    ) -> Result<Vec<&'static str>, InjectionError> {
        let one_agent = request.dynakube.one_agent();
        let mut reasons = Vec::new();
        if one_agent.tenant_uuid().is_empty() {
            reasons.push(REASON_EMPTY_TENANT_UUID);
        }
        if !one_agent.has_communication_hosts() {
            reasons.push(REASON_EMPTY_CONNECTION_INFO);
        }
        if one_agent.code_modules_version().is_empty() && one_agent.code_modules_image().is_empty() {
            reasons.push(REASON_UNKNOWN_CODE_MODULE);
        }
        Ok(reasons)
    }

    async fn inject(&self, request: &mut MutationRequest) -> Result<(), InjectionError> {
        let csi = self.uses_csi(request);
        let namespace = request.namespace_name().to_string();
        ensure_init_secret(self.client.as_ref(), &request.dynakube, &namespace, csi).await?;

        let install = InstallSettings::from_request(request);
        let bin_volume = self.bin_volume(request, csi);
        let init_container = self.init_container(request, &install, csi);
        let indices = request.new_containers(|container| self.is_injected(container));

        let spec = request.spec_mut();
        add_volume(spec, config_volume());
        add_volume(spec, bin_volume);
        add_volume(spec, empty_dir_volume(ONEAGENT_SHARE_VOLUME_NAME));
        spec.init_containers
            .get_or_insert_with(Vec::new)
            .push(init_container);

        debug!(namespace = %namespace, containers = indices.len(), csi = csi, "Injecting containers with init-container installer");
        self.inject_containers(request, &indices, &install);
        Ok(())
    }

    fn reinvoke(&self, request: &mut MutationRequest) -> bool {
        let has_init = request
            .pod
            .spec
            .as_ref()
            .and_then(|spec| find_init_container(spec, INSTALL_CONTAINER_NAME))
            .is_some();
        if !has_init {
            return false;
        }

        let indices = request.new_containers(|container| self.is_injected(container));
        if indices.is_empty() {
            return false;
        }

        let install = InstallSettings::from_request(request);
        self.inject_containers(request, &indices, &install);
        true
    }
}

/// Adds the agent volumes, preload library and config files to a user container.
fn update_container(container: &mut Container, install: &InstallSettings) {
    add_volume_mount(
        container,
        mount(
            ONEAGENT_SHARE_VOLUME_NAME,
            LD_PRELOAD_PATH,
            Some(LD_PRELOAD_SUB_PATH.to_string()),
        ),
    );
    add_volume_mount(
        container,
        mount(ONEAGENT_BIN_VOLUME_NAME, &install.install_path, None),
    );
    add_volume_mount(
        container,
        mount(
            ONEAGENT_SHARE_VOLUME_NAME,
            CONTAINER_CONF_PATH,
            Some(format!("container_{}.conf", container.name)),
        ),
    );
    if install.activegate_tls {
        add_volume_mount(
            container,
            mount(
                ONEAGENT_SHARE_VOLUME_NAME,
                CUSTOM_CERTS_PATH,
                Some(CUSTOM_CERTS_SUB_PATH.to_string()),
            ),
        );
    }
    if install.curl_options {
        add_volume_mount(
            container,
            mount(
                ONEAGENT_SHARE_VOLUME_NAME,
                CURL_OPTIONS_PATH,
                Some(CURL_OPTIONS_SUB_PATH.to_string()),
            ),
        );
    }
    add_preload(container, &install.preload_library());
}

/// Number of containers already listed on the init container.
fn container_count(init: &Container) -> usize {
    init.env
        .iter()
        .flatten()
        .find(|env| env.name == ENV_CONTAINERS_COUNT)
        .and_then(|env| env.value.as_deref())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn config_volume() -> Volume {
    Volume {
        name: INJECTION_CONFIG_VOLUME_NAME.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(AGENT_INIT_SECRET_NAME.to_string()),
            ..SecretVolumeSource::default()
        }),
        ..Volume::default()
    }
}

fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Volume::default()
    }
}

#[cfg(test)]
#[path = "v1_tests.rs"]
mod v1_tests;
