// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `webhook/startup.rs`

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::{Container, Namespace, Pod, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use crate::cluster::fake::FakeCluster;
    use crate::config::{Modules, WebhookConfig};
    use crate::constants::{
        DEFAULT_BIND_ADDRESS, DEFAULT_CERT_DIR, DEFAULT_CERT_FILE, DEFAULT_KEY_FILE,
        DEFAULT_METRICS_ADDRESS, LEGACY_ONEAGENT_APM_CRD,
    };
    use crate::labels::EVENT_REASON_INCOMPATIBLE_CRD;
    use crate::webhook::startup::injection_settings;

    fn config(pod_name: Option<&str>, webhook_image: Option<&str>) -> WebhookConfig {
        WebhookConfig {
            bind_address: DEFAULT_BIND_ADDRESS.parse().unwrap(),
            metrics_address: DEFAULT_METRICS_ADDRESS.parse().unwrap(),
            cert_dir: DEFAULT_CERT_DIR.into(),
            cert_file: DEFAULT_CERT_FILE.to_string(),
            key_file: DEFAULT_KEY_FILE.to_string(),
            namespace: "dynatrace".to_string(),
            pod_name: pod_name.map(str::to_string),
            webhook_image: webhook_image.map(str::to_string),
            csi_driver: false,
            insecure: false,
        }
    }

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Container::default()
        }
    }

    fn cluster(containers: Vec<Container>) -> Arc<FakeCluster> {
        let cluster = FakeCluster::new();
        cluster.add_namespace(Namespace {
            metadata: ObjectMeta {
                name: Some("kube-system".to_string()),
                uid: Some("9d3c5a1e-kube-system".to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        });
        cluster.add_pod(
            "dynatrace",
            Pod {
                metadata: ObjectMeta {
                    name: Some("dynatrace-webhook-5d8f".to_string()),
                    namespace: Some("dynatrace".to_string()),
                    ..ObjectMeta::default()
                },
                spec: Some(PodSpec {
                    containers,
                    ..PodSpec::default()
                }),
                ..Pod::default()
            },
        );
        Arc::new(cluster)
    }

    #[tokio::test]
    async fn test_image_resolved_from_own_pod() {
        let cluster = cluster(vec![
            container("istio-proxy", "istio/proxyv2:1.22"),
            container("webhook", "dynatrace/dynatrace-operator:v1.4.0"),
        ]);
        let settings = injection_settings(cluster.clone(), &config(Some("dynatrace-webhook-5d8f"), None))
            .await
            .unwrap();

        assert_eq!(settings.webhook_image, "dynatrace/dynatrace-operator:v1.4.0");
        assert_eq!(settings.cluster_id, "9d3c5a1e-kube-system");
        assert_eq!(settings.operator_namespace, "dynatrace");
        assert_eq!(settings.modules, Modules { csi_driver: false });
        assert!(!settings.incompatible_crd_present);
        assert!(cluster.events().is_empty());
    }

    #[tokio::test]
    async fn test_image_falls_back_to_first_container() {
        let cluster = cluster(vec![container("operator", "operator:v2")]);
        let settings = injection_settings(cluster, &config(Some("dynatrace-webhook-5d8f"), None))
            .await
            .unwrap();
        assert_eq!(settings.webhook_image, "operator:v2");
    }

    #[tokio::test]
    async fn test_configured_image_wins() {
        let cluster = cluster(vec![container("webhook", "operator:v2")]);
        let settings = injection_settings(cluster, &config(None, Some("registry/operator:pinned")))
            .await
            .unwrap();
        assert_eq!(settings.webhook_image, "registry/operator:pinned");
    }

    #[tokio::test]
    async fn test_unknown_image_is_an_error() {
        let cluster = cluster(vec![container("webhook", "operator:v2")]);
        assert!(injection_settings(cluster, &config(None, None)).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_kube_system_is_an_error() {
        let cluster = Arc::new(FakeCluster::new());
        let err = injection_settings(cluster, &config(None, Some("operator:v2")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cluster ID"));
    }

    #[tokio::test]
    async fn test_legacy_crd_disables_injection_and_emits_event() {
        let cluster = cluster(vec![container("webhook", "operator:v2")]);
        cluster.add_crd(LEGACY_ONEAGENT_APM_CRD);

        let settings = injection_settings(cluster.clone(), &config(Some("dynatrace-webhook-5d8f"), None))
            .await
            .unwrap();

        assert!(settings.incompatible_crd_present);
        let events = cluster.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "dynatrace");
        assert_eq!(events[0].1.reason.as_deref(), Some(EVENT_REASON_INCOMPATIBLE_CRD));
    }
}
