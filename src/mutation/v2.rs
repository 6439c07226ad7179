// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! v2 injection: the code-modules image runs as the init container.
//!
//! The image ships a bootstrapper that copies the agent into the shared
//! `dynatrace-config` empty dir and writes the configuration it reads from
//! the `dynatrace-input` projected volume. Pod and container attributes are
//! passed as arguments so the bootstrapper can imprint them.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, PodSpec, ProjectedVolumeSource, Secret, SecretProjection,
    Volume, VolumeMount, VolumeProjection,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::feature_flags::InjectionFailurePolicy;
use crate::cluster::ClusterClient;
use crate::constants::{
    BOOTSTRAPPER_ARG_ATTRIBUTE, BOOTSTRAPPER_ARG_CONFIG_DIRECTORY,
    BOOTSTRAPPER_ARG_CONTAINER_ATTRIBUTE, BOOTSTRAPPER_ARG_INPUT_DIRECTORY,
    BOOTSTRAPPER_ARG_SOURCE, BOOTSTRAPPER_ARG_SUPPRESS_ERRORS, BOOTSTRAPPER_ARG_TARGET,
    BOOTSTRAPPER_ARG_TECHNOLOGY, BOOTSTRAPPER_BIN_SUB_PATH, BOOTSTRAPPER_CERTS_SECRET_NAME,
    BOOTSTRAPPER_CERTS_SOURCE_SUFFIX, BOOTSTRAPPER_CONFIG_PATH, BOOTSTRAPPER_CONFIG_SECRET_NAME,
    BOOTSTRAPPER_CONFIG_SOURCE_SUFFIX, BOOTSTRAPPER_CONFIG_VOLUME_NAME, BOOTSTRAPPER_INPUT_PATH,
    BOOTSTRAPPER_INPUT_VOLUME_NAME, BOOTSTRAPPER_SOURCE_PATH, BOOTSTRAPPER_TARGET_PATH,
    BOOTSTRAPPER_USER_CONFIG_PATH, BOOTSTRAPPER_USER_MOUNT_PATH, ENV_NODE_NAME, ENV_POD_NAME,
    ENV_POD_UID, FIELD_PATH_NODE_NAME, FIELD_PATH_POD_NAME, FIELD_PATH_POD_UID,
    INSTALL_CONTAINER_NAME, LIB_AGENT_PROC_PATH,
};
use crate::errors::{ClusterError, InjectionError};
use crate::labels::{
    ANNOTATION_TECHNOLOGIES, ANNOTATION_VOLUME_TYPE, REASON_NO_BOOTSTRAPPER_CONFIG,
    REASON_NO_CODE_MODULES_IMAGE, VOLUME_TYPE_CSI,
};
use crate::mutation::container::{
    add_dynakube_envs, add_preload, add_volume, add_volume_mount, field_env, find_init_container,
    has_volume_mount, init_resources, init_security_context, mount,
};
use crate::mutation::image::{parse_image, ImageInfo};
use crate::mutation::{InjectionSettings, Injector, MutationRequest, Strategy};

/// Attributes of one user container, passed as JSON to the bootstrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerAttributes {
    #[serde(flatten)]
    pub image: ImageInfo,
    #[serde(rename = "k8s.container.name")]
    pub container_name: String,
}

impl ContainerAttributes {
    #[must_use]
    pub fn from_container(container: &Container) -> Self {
        Self {
            image: parse_image(container.image.as_deref().unwrap_or_default()),
            container_name: container.name.clone(),
        }
    }

    /// `--attribute-container=<json>`
    #[must_use]
    pub fn to_arg(&self) -> String {
        // a struct of strings always serializes
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{BOOTSTRAPPER_ARG_CONTAINER_ATTRIBUTE}={json}")
    }
}

/// Injector for the bootstrapper strategy.
pub struct BootstrapperInjector {
    client: Arc<dyn ClusterClient>,
    settings: Arc<InjectionSettings>,
}

impl BootstrapperInjector {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, settings: Arc<InjectionSettings>) -> Self {
        Self { client, settings }
    }

    fn code_modules_image<'a>(&self, request: &'a MutationRequest) -> &'a str {
        request
            .dynakube
            .one_agent()
            .custom_code_modules_image(self.settings.modules.csi_driver)
    }

    /// Copies `source` of the `DynaKube` namespace to `target` in the pod namespace.
    ///
    /// Returns false if the source secret does not exist.
    async fn replicate_secret(
        &self,
        request: &MutationRequest,
        source: &str,
        target: &str,
    ) -> Result<bool, InjectionError> {
        let namespace = request.namespace_name();
        let wrap = |source: ClusterError| InjectionError::SecretReplication {
            secret: target.to_string(),
            namespace: namespace.to_string(),
            source,
        };

        if self
            .client
            .get_secret(namespace, target)
            .await
            .map_err(wrap)?
            .is_some()
        {
            return Ok(true);
        }

        let Some(original) = self
            .client
            .get_secret(request.dynakube.namespace(), source)
            .await
            .map_err(wrap)?
        else {
            return Ok(false);
        };

        let replica = Secret {
            metadata: ObjectMeta {
                name: Some(target.to_string()),
                namespace: Some(namespace.to_string()),
                labels: original.metadata.labels.clone(),
                ..ObjectMeta::default()
            },
            data: original.data,
            type_: original.type_,
            ..Secret::default()
        };
        match self.client.create_secret(namespace, &replica).await {
            Ok(()) => {
                info!(secret = %target, namespace = %namespace, "Replicated bootstrapper secret");
                Ok(true)
            }
            Err(e) if e.is_already_exists() => Ok(true),
            Err(e) => Err(wrap(e)),
        }
    }

    fn init_container(&self, request: &MutationRequest) -> Container {
        let dk = &request.dynakube;
        let mut args = vec![
            format!("{BOOTSTRAPPER_ARG_SOURCE}={BOOTSTRAPPER_SOURCE_PATH}"),
            format!("{BOOTSTRAPPER_ARG_TARGET}={BOOTSTRAPPER_TARGET_PATH}"),
            format!("{BOOTSTRAPPER_ARG_CONFIG_DIRECTORY}={BOOTSTRAPPER_CONFIG_PATH}"),
            format!("{BOOTSTRAPPER_ARG_INPUT_DIRECTORY}={BOOTSTRAPPER_INPUT_PATH}"),
        ];

        let technology = request
            .pod_annotation(ANNOTATION_TECHNOLOGIES)
            .unwrap_or_else(|| dk.feature_flags().node_image_pull_technology());
        if !technology.is_empty() {
            args.push(format!("{BOOTSTRAPPER_ARG_TECHNOLOGY}={technology}"));
        }
        if request.failure_policy() != InjectionFailurePolicy::Fail {
            args.push(BOOTSTRAPPER_ARG_SUPPRESS_ERRORS.to_string());
        }
        args.extend(self.pod_attributes(request));

        let default_spec = PodSpec::default();
        let spec = request.pod.spec.as_ref().unwrap_or(&default_spec);
        Container {
            name: INSTALL_CONTAINER_NAME.to_string(),
            image: Some(self.code_modules_image(request).to_string()),
            args: Some(args),
            env: Some(vec![
                field_env(ENV_POD_NAME, FIELD_PATH_POD_NAME),
                field_env(ENV_POD_UID, FIELD_PATH_POD_UID),
                field_env(ENV_NODE_NAME, FIELD_PATH_NODE_NAME),
            ]),
            resources: init_resources(dk),
            security_context: Some(init_security_context(spec, dk)),
            volume_mounts: Some(vec![
                mount(BOOTSTRAPPER_CONFIG_VOLUME_NAME, BOOTSTRAPPER_CONFIG_PATH, None),
                mount(
                    BOOTSTRAPPER_CONFIG_VOLUME_NAME,
                    BOOTSTRAPPER_TARGET_PATH,
                    Some(BOOTSTRAPPER_BIN_SUB_PATH.to_string()),
                ),
                mount(BOOTSTRAPPER_INPUT_VOLUME_NAME, BOOTSTRAPPER_INPUT_PATH, None),
            ]),
            ..Container::default()
        }
    }

    /// `--attribute=<key>=<value>` arguments describing the pod and cluster.
    ///
    /// Pod name, UID and node are resolved by the kubelet from the init
    /// container env at start.
    fn pod_attributes(&self, request: &MutationRequest) -> Vec<String> {
        let status = request.dynakube.status.as_ref();
        let cluster_uid = status
            .map(|status| status.kube_system_uuid.as_str())
            .filter(|uuid| !uuid.is_empty())
            .unwrap_or(&self.settings.cluster_id);
        let meid = status.map_or("", |status| status.kubernetes_cluster_meid.as_str());
        let cluster_name = status.map_or("", |status| status.kubernetes_cluster_name.as_str());

        let mut attributes = vec![
            ("k8s.pod.name", format!("$({ENV_POD_NAME})")),
            ("k8s.pod.uid", format!("$({ENV_POD_UID})")),
            ("k8s.node.name", format!("$({ENV_NODE_NAME})")),
            ("k8s.namespace.name", request.namespace_name().to_string()),
            ("k8s.cluster.uid", cluster_uid.to_string()),
        ];
        if !meid.is_empty() {
            attributes.push(("dt.entity.kubernetes_cluster", meid.to_string()));
        }
        if !cluster_name.is_empty() {
            attributes.push(("k8s.cluster.name", cluster_name.to_string()));
        }

        attributes
            .into_iter()
            .map(|(key, value)| format!("{BOOTSTRAPPER_ARG_ATTRIBUTE}={key}={value}"))
            .collect()
    }

    /// Injects the user containers at `indices` and passes their attributes
    /// to the init container.
    fn inject_containers(&self, request: &mut MutationRequest, indices: &[usize]) {
        let dk = request.dynakube.clone();
        let cluster_id = self.settings.cluster_id.clone();
        let spec = request.spec_mut();
        let Some(init_index) = find_init_container(spec, INSTALL_CONTAINER_NAME) else {
            return;
        };

        for &index in indices {
            let Some(container) = spec.containers.get_mut(index) else {
                continue;
            };
            update_container(container);
            add_dynakube_envs(container, &dk, &cluster_id);

            let arg = ContainerAttributes::from_container(container).to_arg();
            if let Some(init) = spec
                .init_containers
                .as_mut()
                .and_then(|containers| containers.get_mut(init_index))
            {
                init.args.get_or_insert_with(Vec::new).push(arg);
            }
        }
    }
}

#[async_trait]
impl Injector for BootstrapperInjector {
    fn strategy(&self) -> Strategy {
        Strategy::V2
    }

    fn is_enabled(&self, request: &MutationRequest) -> bool {
        let dk = &request.dynakube;
        dk.feature_flags().node_image_pull()
            && dk.one_agent().is_app_injection_needed()
            && request.pod_annotation(ANNOTATION_VOLUME_TYPE) != Some(VOLUME_TYPE_CSI)
    }

    fn is_injected(&self, container: &Container) -> bool {
        has_volume_mount(container, BOOTSTRAPPER_CONFIG_VOLUME_NAME)
    }

    async fn skip_reasons(
        &self,
        request: &MutationRequest,
    ) -> Result<Vec<&'static str>, InjectionError> {
        if self.code_modules_image(request).is_empty() {
            return Ok(vec![REASON_NO_CODE_MODULES_IMAGE]);
        }

        let dk_name = request.dynakube.name();
        let config_source = format!("{dk_name}{BOOTSTRAPPER_CONFIG_SOURCE_SUFFIX}");
        if !self
            .replicate_secret(request, &config_source, BOOTSTRAPPER_CONFIG_SECRET_NAME)
            .await?
        {
            debug!(secret = %config_source, "Bootstrapper config secret not generated yet");
            return Ok(vec![REASON_NO_BOOTSTRAPPER_CONFIG]);
        }

        let certs_source = format!("{dk_name}{BOOTSTRAPPER_CERTS_SOURCE_SUFFIX}");
        self.replicate_secret(request, &certs_source, BOOTSTRAPPER_CERTS_SECRET_NAME)
            .await?;
        Ok(Vec::new())
    }

    async fn inject(&self, request: &mut MutationRequest) -> Result<(), InjectionError> {
        let init_container = self.init_container(request);
        let indices = request.new_containers(|container| self.is_injected(container));

        let spec = request.spec_mut();
        add_volume(spec, config_volume());
        add_volume(spec, input_volume());
        spec.init_containers
            .get_or_insert_with(Vec::new)
            .push(init_container);

        debug!(containers = indices.len(), "Injecting containers with bootstrapper");
        self.inject_containers(request, &indices);
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
        self.inject_containers(request, &indices);
        true
    }
}

fn update_container(container: &mut Container) {
    add_volume_mount(
        container,
        VolumeMount {
            read_only: Some(true),
            ..mount(
                BOOTSTRAPPER_CONFIG_VOLUME_NAME,
                BOOTSTRAPPER_USER_MOUNT_PATH,
                Some(BOOTSTRAPPER_BIN_SUB_PATH.to_string()),
            )
        },
    );
    let sub_path = container.name.clone();
    add_volume_mount(
        container,
        mount(
            BOOTSTRAPPER_CONFIG_VOLUME_NAME,
            BOOTSTRAPPER_USER_CONFIG_PATH,
            Some(sub_path),
        ),
    );
    add_preload(
        container,
        &format!("{BOOTSTRAPPER_USER_MOUNT_PATH}/{LIB_AGENT_PROC_PATH}"),
    );
}

fn config_volume() -> Volume {
    Volume {
        name: BOOTSTRAPPER_CONFIG_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Volume::default()
    }
}

fn input_volume() -> Volume {
    let secret = |name: &str, optional: bool| VolumeProjection {
        secret: Some(SecretProjection {
            name: name.to_string(),
            optional: Some(optional),
            ..SecretProjection::default()
        }),
        ..VolumeProjection::default()
    };
    Volume {
        name: BOOTSTRAPPER_INPUT_VOLUME_NAME.to_string(),
        projected: Some(ProjectedVolumeSource {
            sources: Some(vec![
                secret(BOOTSTRAPPER_CONFIG_SECRET_NAME, false),
                secret(BOOTSTRAPPER_CERTS_SECRET_NAME, true),
            ]),
            ..ProjectedVolumeSource::default()
        }),
        ..Volume::default()
    }
}

#[cfg(test)]
#[path = "v2_tests.rs"]
mod v2_tests;
