// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `mutation/v2.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::{Container, Namespace, Pod, PodSpec, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;

    use crate::api::feature_flags::{INJECTION_FAILURE_POLICY, NODE_IMAGE_PULL};
    use crate::api::latest::oneagent::{AppInjectionSpec, ApplicationMonitoringSpec};
    use crate::api::latest::status::DynaKubeStatus;
    use crate::api::latest::{DynaKube, DynaKubeSpec};
    use crate::cluster::fake::{op, FakeCluster};
    use crate::constants::{
        BOOTSTRAPPER_CERTS_SECRET_NAME, BOOTSTRAPPER_CONFIG_SECRET_NAME,
        BOOTSTRAPPER_CONFIG_VOLUME_NAME, BOOTSTRAPPER_INPUT_VOLUME_NAME, ENV_LD_PRELOAD,
        INSTALL_CONTAINER_NAME,
    };
    use crate::errors::InjectionError;
    use crate::labels::{
        ANNOTATION_TECHNOLOGIES, ANNOTATION_VOLUME_TYPE, REASON_NO_BOOTSTRAPPER_CONFIG,
        REASON_NO_CODE_MODULES_IMAGE,
    };
    use crate::mutation::container::find_env;
    use crate::mutation::v2::{BootstrapperInjector, ContainerAttributes};
    use crate::mutation::{InjectionSettings, Injector, MutationRequest};

    const DK_NAMESPACE: &str = "dynatrace";
    const APP_NAMESPACE: &str = "app";
    const CODE_MODULES_IMAGE: &str = "registry.example.com/codemodules:1.300";

    fn dynakube() -> DynaKube {
        let mut dk = DynaKube::new(
            "dynakube",
            DynaKubeSpec {
                api_url: "https://tenant.live.dynatrace.com/api".to_string(),
                ..DynaKubeSpec::default()
            },
        );
        dk.metadata.namespace = Some(DK_NAMESPACE.to_string());
        dk.metadata.annotations = Some(BTreeMap::from([(
            NODE_IMAGE_PULL.to_string(),
            "true".to_string(),
        )]));
        dk.spec.one_agent.application_monitoring = Some(ApplicationMonitoringSpec {
            app: AppInjectionSpec {
                code_modules_image: CODE_MODULES_IMAGE.to_string(),
                ..AppInjectionSpec::default()
            },
            ..ApplicationMonitoringSpec::default()
        });
        dk.status = Some(DynaKubeStatus {
            kube_system_uuid: "kube-system-uid".to_string(),
            kubernetes_cluster_meid: "KUBERNETES_CLUSTER-1234".to_string(),
            kubernetes_cluster_name: "prod".to_string(),
            ..DynaKubeStatus::default()
        });
        dk
    }

    fn set_flag(dk: &mut DynaKube, key: &str, value: &str) {
        dk.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
    }

    fn secret(name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "config".to_string(),
                ByteString(b"{}".to_vec()),
            )])),
            ..Secret::default()
        }
    }

    fn cluster() -> Arc<FakeCluster> {
        let cluster = FakeCluster::new();
        cluster.add_secret(DK_NAMESPACE, secret("dynakube-bootstrapper-config"));
        Arc::new(cluster)
    }

    fn injector(cluster: Arc<FakeCluster>) -> BootstrapperInjector {
        let settings = InjectionSettings {
            cluster_id: "settings-uid".to_string(),
            ..InjectionSettings::default()
        };
        BootstrapperInjector::new(cluster, Arc::new(settings))
    }

    fn pod(containers: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|name| Container {
                        name: (*name).to_string(),
                        image: Some(format!("quay.io/acme/{name}:2.1")),
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

    fn init_args(request: &MutationRequest) -> Vec<String> {
        request
            .pod
            .spec
            .as_ref()
            .and_then(|spec| spec.init_containers.as_ref())
            .and_then(|containers| containers.iter().find(|c| c.name == INSTALL_CONTAINER_NAME))
            .and_then(|init| init.args.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Selection
    // ========================================================================

    #[test]
    fn test_is_enabled_requires_node_image_pull() {
        let injector = injector(cluster());
        assert!(injector.is_enabled(&request(pod(&["app"]), dynakube())));

        let mut dk = dynakube();
        set_flag(&mut dk, NODE_IMAGE_PULL, "false");
        assert!(!injector.is_enabled(&request(pod(&["app"]), dk)));
    }

    #[test]
    fn test_is_enabled_csi_volume_type_opts_out() {
        let injector = injector(cluster());
        let mut pod = pod(&["app"]);
        pod.metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_VOLUME_TYPE.to_string(),
            "csi".to_string(),
        )]));
        assert!(!injector.is_enabled(&request(pod, dynakube())));
    }

    // ========================================================================
    // Skip reasons and secret replication
    // ========================================================================

    #[tokio::test]
    async fn test_skip_without_code_modules_image() {
        let injector = injector(cluster());
        let mut dk = dynakube();
        if let Some(app) = dk.spec.one_agent.application_monitoring.as_mut() {
            app.app.code_modules_image = String::new();
        }
        let reasons = injector.skip_reasons(&request(pod(&["app"]), dk)).await.unwrap();
        assert_eq!(reasons, vec![REASON_NO_CODE_MODULES_IMAGE]);
    }

    #[tokio::test]
    async fn test_skip_without_bootstrapper_config() {
        let injector = injector(Arc::new(FakeCluster::new()));
        let reasons = injector
            .skip_reasons(&request(pod(&["app"]), dynakube()))
            .await
            .unwrap();
        assert_eq!(reasons, vec![REASON_NO_BOOTSTRAPPER_CONFIG]);
    }

    #[tokio::test]
    async fn test_replicates_secrets_into_pod_namespace() {
        let cluster = cluster();
        cluster.add_secret(DK_NAMESPACE, secret("dynakube-bootstrapper-certs"));
        let injector = injector(cluster.clone());

        let reasons = injector
            .skip_reasons(&request(pod(&["app"]), dynakube()))
            .await
            .unwrap();
        assert!(reasons.is_empty());

        let config = cluster
            .secret(APP_NAMESPACE, BOOTSTRAPPER_CONFIG_SECRET_NAME)
            .unwrap();
        assert_eq!(config.metadata.namespace.as_deref(), Some(APP_NAMESPACE));
        assert!(config.data.unwrap().contains_key("config"));
        assert!(cluster
            .secret(APP_NAMESPACE, BOOTSTRAPPER_CERTS_SECRET_NAME)
            .is_some());
    }

    #[tokio::test]
    async fn test_replication_tolerates_creation_race() {
        let cluster = cluster();
        cluster.fail(op::CREATE_SECRET, 409, "AlreadyExists");
        let reasons = injector(cluster)
            .skip_reasons(&request(pod(&["app"]), dynakube()))
            .await
            .unwrap();
        assert!(reasons.is_empty());
    }

    #[tokio::test]
    async fn test_replication_error_is_reported() {
        let cluster = cluster();
        cluster.fail(op::GET_SECRET, 503, "ServiceUnavailable");
        let err = injector(cluster)
            .skip_reasons(&request(pod(&["app"]), dynakube()))
            .await
            .unwrap_err();
        assert!(matches!(err, InjectionError::SecretReplication { .. }));
        assert!(err.is_transient());
    }

    // ========================================================================
    // Injection
    // ========================================================================

    #[tokio::test]
    async fn test_inject_init_container_args() {
        let injector = injector(cluster());
        let mut request = request(pod(&["app"]), dynakube());
        injector.inject(&mut request).await.unwrap();

        let args = init_args(&request);
        for expected in [
            "--source=/opt/dynatrace/oneagent",
            "--target=/mnt/bin",
            "--config-directory=/mnt/config",
            "--input-directory=/mnt/input",
            "--suppress-errors",
            "--attribute=k8s.pod.name=$(K8S_PODNAME)",
            "--attribute=k8s.pod.uid=$(K8S_PODUID)",
            "--attribute=k8s.node.name=$(K8S_NODE_NAME)",
            "--attribute=k8s.namespace.name=app",
            "--attribute=k8s.cluster.uid=kube-system-uid",
            "--attribute=dt.entity.kubernetes_cluster=KUBERNETES_CLUSTER-1234",
            "--attribute=k8s.cluster.name=prod",
        ] {
            assert!(args.iter().any(|arg| arg == expected), "missing {expected} in {args:?}");
        }

        let container_arg = args
            .iter()
            .find(|arg| arg.starts_with("--attribute-container="))
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(container_arg.trim_start_matches("--attribute-container="))
                .unwrap();
        assert_eq!(json["k8s.container.name"], "app");
        assert_eq!(json["container_image.registry"], "quay.io");
        assert_eq!(json["container_image.repository"], "acme/app");
        assert_eq!(json["container_image.tags"], "2.1");
    }

    #[tokio::test]
    async fn test_inject_fail_policy_and_technology() {
        let injector = injector(cluster());
        let mut dk = dynakube();
        set_flag(&mut dk, INJECTION_FAILURE_POLICY, "fail");
        let mut pod = pod(&["app"]);
        pod.metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_TECHNOLOGIES.to_string(),
            "java".to_string(),
        )]));
        let mut request = request(pod, dk);
        injector.inject(&mut request).await.unwrap();

        let args = init_args(&request);
        assert!(!args.iter().any(|arg| arg == "--suppress-errors"));
        assert!(args.iter().any(|arg| arg == "--technology=java"));
    }

    #[tokio::test]
    async fn test_inject_cluster_uid_falls_back_to_settings() {
        let injector = injector(cluster());
        let mut dk = dynakube();
        dk.status = None;
        let mut request = request(pod(&["app"]), dk);
        injector.inject(&mut request).await.unwrap();

        let args = init_args(&request);
        assert!(args.iter().any(|arg| arg == "--attribute=k8s.cluster.uid=settings-uid"));
        assert!(!args.iter().any(|arg| arg.contains("k8s.cluster.name")));
    }

    #[tokio::test]
    async fn test_inject_volumes_and_user_containers() {
        let injector = injector(cluster());
        let mut request = request(pod(&["app"]), dynakube());
        injector.inject(&mut request).await.unwrap();

        let spec = request.pod.spec.as_ref().unwrap();
        let init = &spec.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.image.as_deref(), Some(CODE_MODULES_IMAGE));
        let env_names: Vec<&str> = init.env.iter().flatten().map(|e| e.name.as_str()).collect();
        assert_eq!(env_names, vec!["K8S_PODNAME", "K8S_PODUID", "K8S_NODE_NAME"]);

        let volumes = spec.volumes.as_ref().unwrap();
        let config = volumes.iter().find(|v| v.name == BOOTSTRAPPER_CONFIG_VOLUME_NAME).unwrap();
        assert!(config.empty_dir.is_some());
        let input = volumes.iter().find(|v| v.name == BOOTSTRAPPER_INPUT_VOLUME_NAME).unwrap();
        let sources = input.projected.as_ref().unwrap().sources.as_ref().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].secret.as_ref().unwrap().optional, Some(true));

        let app = &spec.containers[0];
        assert!(injector.is_injected(app));
        let mounts = app.volume_mounts.as_ref().unwrap();
        let config_mount = mounts
            .iter()
            .find(|m| m.mount_path == "/var/lib/dynatrace")
            .unwrap();
        assert_eq!(config_mount.sub_path.as_deref(), Some("app"));
        let bin_mount = mounts
            .iter()
            .find(|m| m.mount_path == "/opt/dynatrace/oneagent")
            .unwrap();
        assert_eq!(bin_mount.read_only, Some(true));
        assert_eq!(
            find_env(app, ENV_LD_PRELOAD).and_then(|e| e.value.as_deref()),
            Some("/opt/dynatrace/oneagent/agent/lib64/liboneagentproc.so")
        );
    }

    // ========================================================================
    // Reinvocation
    // ========================================================================

    #[tokio::test]
    async fn test_reinvoke_adds_attributes_for_new_containers() {
        let injector = injector(cluster());
        let mut request = request(pod(&["app"]), dynakube());
        injector.inject(&mut request).await.unwrap();
        assert!(!injector.reinvoke(&mut request));

        request.spec_mut().containers.push(Container {
            name: "late".to_string(),
            image: Some("late:1".to_string()),
            ..Container::default()
        });
        assert!(injector.reinvoke(&mut request));

        let container_args: Vec<String> = init_args(&request)
            .into_iter()
            .filter(|arg| arg.starts_with("--attribute-container="))
            .collect();
        assert_eq!(container_args.len(), 2);
        assert!(container_args[1].contains("\"k8s.container.name\":\"late\""));
        assert!(injector.is_injected(&request.pod.spec.as_ref().unwrap().containers[1]));
    }

    #[test]
    fn test_container_attributes_skip_empty_fields() {
        let container = Container {
            name: "app".to_string(),
            image: Some("nginx".to_string()),
            ..Container::default()
        };
        let arg = ContainerAttributes::from_container(&container).to_arg();
        assert!(!arg.contains("container_image.digest"));
        assert!(arg.contains("\"k8s.container.name\":\"app\""));
    }
}
