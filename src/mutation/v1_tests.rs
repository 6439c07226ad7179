// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `mutation/v1.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::{Container, Namespace, Pod, PodSpec, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;

    use crate::api::latest::oneagent::ApplicationMonitoringSpec;
    use crate::api::latest::status::DynaKubeStatus;
    use crate::api::latest::{DynaKube, DynaKubeSpec};
    use crate::api::shared::CommunicationHostStatus;
    use crate::cluster::fake::FakeCluster;
    use crate::config::Modules;
    use crate::constants::{
        AGENT_INIT_SECRET_NAME, ENV_CONTAINERS_COUNT, ENV_LD_PRELOAD, ENV_MODE,
        INSTALL_CONTAINER_NAME, ONEAGENT_BIN_VOLUME_NAME, ONEAGENT_SHARE_VOLUME_NAME,
    };
    use crate::labels::{
        ANNOTATION_INSTALL_PATH, ANNOTATION_VOLUME_TYPE, REASON_EMPTY_CONNECTION_INFO,
        REASON_EMPTY_TENANT_UUID, REASON_UNKNOWN_CODE_MODULE, VOLUME_TYPE_EPHEMERAL,
    };
    use crate::mutation::container::find_env;
    use crate::mutation::v1::InitContainerInjector;
    use crate::mutation::{InjectionSettings, Injector, MutationRequest};

    const APP_NAMESPACE: &str = "app";

    fn ready_dynakube() -> DynaKube {
        let mut dk = DynaKube::new(
            "dynakube",
            DynaKubeSpec {
                api_url: "https://tenant.live.dynatrace.com/api".to_string(),
                ..DynaKubeSpec::default()
            },
        );
        dk.metadata.namespace = Some("dynatrace".to_string());
        dk.spec.one_agent.application_monitoring = Some(ApplicationMonitoringSpec::default());

        let mut status = DynaKubeStatus::default();
        let connection = &mut status.one_agent.connection_info_status;
        connection.connection_info.tenant_uuid = "abc12345".to_string();
        connection.communication_hosts = vec![CommunicationHostStatus {
            protocol: "https".to_string(),
            host: "tenant.live.dynatrace.com".to_string(),
            port: 443,
        }];
        status.code_modules.version = "1.300.0.20240101-000000".to_string();
        dk.status = Some(status);
        dk
    }

    fn pod(containers: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                generate_name: Some("web-7d9c-".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|name| Container {
                        name: (*name).to_string(),
                        image: Some(format!("docker.io/library/{name}:1.0")),
                        ..Container::default()
                    })
                    .collect(),
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    fn request(pod: Pod, dk: DynaKube) -> MutationRequest {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(APP_NAMESPACE.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        MutationRequest::new(pod, namespace, dk)
    }

    fn cluster() -> Arc<FakeCluster> {
        let cluster = FakeCluster::new();
        cluster.add_secret(
            "dynatrace",
            Secret {
                metadata: ObjectMeta {
                    name: Some("dynakube".to_string()),
                    ..ObjectMeta::default()
                },
                data: Some(BTreeMap::from([(
                    "apiToken".to_string(),
                    ByteString(b"token".to_vec()),
                )])),
                ..Secret::default()
            },
        );
        Arc::new(cluster)
    }

    fn injector(cluster: Arc<FakeCluster>, csi_driver: bool) -> InitContainerInjector {
        let settings = InjectionSettings {
            webhook_image: "registry.example.com/dynatrace-operator:v1.0.0".to_string(),
            cluster_id: "kube-system-uid".to_string(),
            modules: Modules { csi_driver },
            ..InjectionSettings::default()
        };
        InitContainerInjector::new(cluster, Arc::new(settings))
    }

    fn init_container(request: &MutationRequest) -> &Container {
        request
            .pod
            .spec
            .as_ref()
            .and_then(|spec| spec.init_containers.as_ref())
            .and_then(|containers| containers.iter().find(|c| c.name == INSTALL_CONTAINER_NAME))
            .unwrap()
    }

    fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
        find_env(container, name).and_then(|env| env.value.as_deref())
    }

    // ========================================================================
    // Skip reasons
    // ========================================================================

    #[tokio::test]
    async fn test_skip_reasons_all_missing() {
        let injector = injector(cluster(), false);
        let mut dk = ready_dynakube();
        dk.status = None;

        let reasons = injector.skip_reasons(&request(pod(&["app"]), dk)).await.unwrap();
        assert_eq!(
            reasons,
            vec![
                REASON_EMPTY_TENANT_UUID,
                REASON_EMPTY_CONNECTION_INFO,
                REASON_UNKNOWN_CODE_MODULE
            ]
        );
    }

    #[tokio::test]
    async fn test_skip_reasons_ready() {
        let injector = injector(cluster(), false);
        let reasons = injector
            .skip_reasons(&request(pod(&["app"]), ready_dynakube()))
            .await
            .unwrap();
        assert!(reasons.is_empty());
    }

    // ========================================================================
    // Injection
    // ========================================================================

    #[tokio::test]
    async fn test_inject_installer_mode() {
        let cluster = cluster();
        let injector = injector(cluster.clone(), false);
        let mut request = request(pod(&["app", "sidecar"]), ready_dynakube());

        injector.inject(&mut request).await.unwrap();

        assert!(cluster.secret(APP_NAMESPACE, AGENT_INIT_SECRET_NAME).is_some());

        let init = init_container(&request);
        assert_eq!(
            init.image.as_deref(),
            Some("registry.example.com/dynatrace-operator:v1.0.0")
        );
        assert_eq!(env_value(init, ENV_MODE), Some("installer"));
        assert_eq!(env_value(init, ENV_CONTAINERS_COUNT), Some("2"));
        assert_eq!(env_value(init, "CONTAINER_1_NAME"), Some("app"));
        assert_eq!(env_value(init, "CONTAINER_2_NAME"), Some("sidecar"));
        assert_eq!(
            env_value(init, "CONTAINER_1_IMAGE"),
            Some("docker.io/library/app:1.0")
        );

        let spec = request.pod.spec.as_ref().unwrap();
        let volumes = spec.volumes.as_ref().unwrap();
        let bin = volumes.iter().find(|v| v.name == ONEAGENT_BIN_VOLUME_NAME).unwrap();
        assert!(bin.empty_dir.is_some());
        assert!(volumes.iter().any(|v| v.name == ONEAGENT_SHARE_VOLUME_NAME));

        for container in &spec.containers {
            assert!(injector.is_injected(container), "{} not injected", container.name);
            assert_eq!(
                env_value(container, ENV_LD_PRELOAD),
                Some("/opt/dynatrace/oneagent-paas/agent/lib64/liboneagentproc.so")
            );
        }
    }

    #[tokio::test]
    async fn test_inject_uses_csi_volume() {
        let injector = injector(cluster(), true);
        let mut request = request(pod(&["app"]), ready_dynakube());
        injector.inject(&mut request).await.unwrap();

        assert_eq!(env_value(init_container(&request), ENV_MODE), Some("provisioned"));
        let volumes = request.pod.spec.as_ref().unwrap().volumes.as_ref().unwrap();
        let bin = volumes.iter().find(|v| v.name == ONEAGENT_BIN_VOLUME_NAME).unwrap();
        let csi = bin.csi.as_ref().unwrap();
        assert_eq!(csi.driver, "csi.oneagent.dynatrace.com");
    }

    #[tokio::test]
    async fn test_inject_ephemeral_annotation_disables_csi() {
        let injector = injector(cluster(), true);
        let mut pod = pod(&["app"]);
        pod.metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_VOLUME_TYPE.to_string(),
            VOLUME_TYPE_EPHEMERAL.to_string(),
        )]));
        let mut request = request(pod, ready_dynakube());
        injector.inject(&mut request).await.unwrap();

        assert_eq!(env_value(init_container(&request), ENV_MODE), Some("installer"));
    }

    #[tokio::test]
    async fn test_inject_custom_install_path() {
        let injector = injector(cluster(), false);
        let mut pod = pod(&["app"]);
        pod.metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_INSTALL_PATH.to_string(),
            "/custom".to_string(),
        )]));
        let mut request = request(pod, ready_dynakube());
        injector.inject(&mut request).await.unwrap();

        let container = &request.pod.spec.as_ref().unwrap().containers[0];
        assert_eq!(
            env_value(container, ENV_LD_PRELOAD),
            Some("/custom/agent/lib64/liboneagentproc.so")
        );
        let mounts = container.volume_mounts.as_ref().unwrap();
        assert!(mounts
            .iter()
            .any(|m| m.name == ONEAGENT_BIN_VOLUME_NAME && m.mount_path == "/custom"));
    }

    #[tokio::test]
    async fn test_inject_skips_excluded_container() {
        let injector = injector(cluster(), false);
        let mut pod = pod(&["app", "istio-proxy"]);
        pod.metadata.annotations = Some(BTreeMap::from([(
            "container.inject.dynatrace.com/istio-proxy".to_string(),
            "false".to_string(),
        )]));
        let mut request = request(pod, ready_dynakube());
        injector.inject(&mut request).await.unwrap();

        let containers = &request.pod.spec.as_ref().unwrap().containers;
        assert!(injector.is_injected(&containers[0]));
        assert!(!injector.is_injected(&containers[1]));
        assert_eq!(
            env_value(init_container(&request), ENV_CONTAINERS_COUNT),
            Some("1")
        );
    }

    // ========================================================================
    // Reinvocation
    // ========================================================================

    #[tokio::test]
    async fn test_reinvoke_injects_only_new_containers() {
        let injector = injector(cluster(), false);
        let mut request = request(pod(&["app"]), ready_dynakube());
        injector.inject(&mut request).await.unwrap();
        let first = request.pod.spec.as_ref().unwrap().containers[0].clone();

        assert!(!injector.reinvoke(&mut request));

        request.spec_mut().containers.push(Container {
            name: "late".to_string(),
            image: Some("late:2".to_string()),
            ..Container::default()
        });
        assert!(injector.reinvoke(&mut request));

        let containers = &request.pod.spec.as_ref().unwrap().containers;
        assert_eq!(containers[0], first);
        assert!(injector.is_injected(&containers[1]));

        let init = init_container(&request);
        assert_eq!(env_value(init, ENV_CONTAINERS_COUNT), Some("2"));
        assert_eq!(env_value(init, "CONTAINER_2_NAME"), Some("late"));
    }

    #[test]
    fn test_reinvoke_without_init_container() {
        let injector = injector(cluster(), false);
        let mut request = request(pod(&["app"]), ready_dynakube());
        assert!(!injector.reinvoke(&mut request));
    }
}
