// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `webhook/mutate.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::{Namespace, Pod, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
    use serde_json::{json, Value};

    use crate::api::latest::oneagent::ApplicationMonitoringSpec;
    use crate::api::latest::status::DynaKubeStatus;
    use crate::api::latest::{DynaKube, DynaKubeSpec};
    use crate::api::shared::CommunicationHostStatus;
    use crate::cluster::fake::{op, FakeCluster};
    use crate::config::Modules;
    use crate::labels::INJECTION_INSTANCE_LABEL;
    use crate::metrics::{RESULT_ALLOWED, RESULT_ERROR, RESULT_PATCHED, RESULT_SKIPPED};
    use crate::mutation::{InjectionSettings, PodWebhook};
    use crate::webhook::mutate::{mutate, patch_response};

    fn dynakube(ready: bool) -> DynaKube {
        let mut dk = DynaKube::new(
            "dynakube",
            DynaKubeSpec {
                api_url: "https://tenant.live.dynatrace.com/api".to_string(),
                ..DynaKubeSpec::default()
            },
        );
        dk.metadata.namespace = Some("dynatrace".to_string());
        dk.spec.one_agent.application_monitoring = Some(ApplicationMonitoringSpec::default());
        if ready {
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
        }
        dk
    }

    fn cluster(dk: DynaKube) -> FakeCluster {
        let cluster = FakeCluster::new();
        cluster.add_namespace(Namespace {
            metadata: ObjectMeta {
                name: Some("app".to_string()),
                labels: Some(BTreeMap::from([(
                    INJECTION_INSTANCE_LABEL.to_string(),
                    "dynakube".to_string(),
                )])),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        });
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
        cluster.add_dynakube(dk);
        cluster
    }

    fn webhook(cluster: FakeCluster) -> PodWebhook {
        PodWebhook::new(
            Arc::new(cluster),
            InjectionSettings {
                webhook_image: "operator:v1".to_string(),
                cluster_id: "kube-system-uid".to_string(),
                operator_namespace: "dynatrace".to_string(),
                modules: Modules { csi_driver: false },
                incompatible_crd_present: false,
            },
        )
    }

    fn pod_json() -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "web", "namespace": "app" },
            "spec": { "containers": [{ "name": "app", "image": "nginx:1.27" }] },
        })
    }

    fn request(operation: &str, object: Option<Value>) -> AdmissionRequest<Pod> {
        let mut request = json!({
            "uid": "0df28fbd-5f5f-11e8-bc74-36e6bb280816",
            "kind": { "group": "", "version": "v1", "kind": "Pod" },
            "resource": { "group": "", "version": "v1", "resource": "pods" },
            "namespace": "app",
            "operation": operation,
            "userInfo": { "username": "system:serviceaccount:kube-system:replicaset-controller" },
        });
        if let Some(object) = object {
            request["object"] = object;
        }
        let review: AdmissionReview<Pod> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": request,
        }))
        .unwrap();
        review.try_into().unwrap()
    }

    fn patch_ops(response: &AdmissionResponse) -> Vec<Value> {
        let patch = response.patch.as_ref().expect("response carries a patch");
        serde_json::from_slice(patch).unwrap()
    }

    // ========================================================================
    // Admission outcomes
    // ========================================================================

    #[tokio::test]
    async fn test_injection_returns_patch() {
        let webhook = webhook(cluster(dynakube(true)));
        let (response, result) = mutate(&webhook, &request("CREATE", Some(pod_json()))).await;

        assert!(response.allowed);
        assert_eq!(result, RESULT_PATCHED);
        let ops = patch_ops(&response);
        assert!(ops
            .iter()
            .any(|op| op["path"].as_str().is_some_and(|p| p.starts_with("/spec/initContainers"))));
    }

    #[tokio::test]
    async fn test_skipped_injection_still_patches_annotations() {
        let webhook = webhook(cluster(dynakube(false)));
        let (response, result) = mutate(&webhook, &request("CREATE", Some(pod_json()))).await;

        assert!(response.allowed);
        assert_eq!(result, RESULT_SKIPPED);
        let ops = patch_ops(&response);
        assert!(!ops
            .iter()
            .any(|op| op["path"].as_str().is_some_and(|p| p.starts_with("/spec/initContainers"))));
    }

    #[tokio::test]
    async fn test_transient_error_denies_pod() {
        let cluster = cluster(dynakube(true));
        cluster.fail(op::GET_NAMESPACE, 503, "ServiceUnavailable");
        let (response, result) =
            mutate(&webhook(cluster), &request("CREATE", Some(pod_json()))).await;

        assert!(!response.allowed);
        assert_eq!(result, RESULT_ERROR);
        assert!(response
            .result
            .message
            .starts_with("Failed to inject into pod: web because"));
        assert!(response.result.message.ends_with("please retry"));
    }

    #[tokio::test]
    async fn test_permanent_error_admits_pod_unchanged() {
        let cluster = cluster(dynakube(true));
        cluster.fail(op::GET_DYNAKUBE, 403, "Forbidden");
        let (response, result) =
            mutate(&webhook(cluster), &request("CREATE", Some(pod_json()))).await;

        assert!(response.allowed);
        assert_eq!(result, RESULT_ERROR);
        assert!(response.patch.is_none());
        assert!(response
            .result
            .message
            .starts_with("Failed to inject into pod: web because"));
    }

    #[tokio::test]
    async fn test_unlabeled_namespace_admits_with_message() {
        let cluster = cluster(dynakube(true));
        cluster.add_namespace(Namespace {
            metadata: ObjectMeta {
                name: Some("app".to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        });
        let (response, result) =
            mutate(&webhook(cluster), &request("CREATE", Some(pod_json()))).await;

        assert!(response.allowed);
        assert_eq!(result, RESULT_ALLOWED);
        assert!(response.patch.is_none());
        assert_eq!(
            response.result.message,
            "no DynaKube instance set for namespace: app"
        );
    }

    #[tokio::test]
    async fn test_non_create_is_allowed() {
        let webhook = webhook(cluster(dynakube(true)));
        let (response, result) = mutate(&webhook, &request("UPDATE", Some(pod_json()))).await;
        assert!(response.allowed);
        assert_eq!(result, RESULT_ALLOWED);
        assert!(response.patch.is_none());
    }

    #[tokio::test]
    async fn test_request_without_object_is_allowed() {
        let webhook = webhook(cluster(dynakube(true)));
        let (response, result) = mutate(&webhook, &request("CREATE", None)).await;
        assert!(response.allowed);
        assert_eq!(result, RESULT_ALLOWED);
    }

    // ========================================================================
    // Patch construction
    // ========================================================================

    #[test]
    fn test_patch_response_skips_identical_pods() {
        let request = request("CREATE", Some(pod_json()));
        let pod: Pod = serde_json::from_value(pod_json()).unwrap();
        let response = patch_response(AdmissionResponse::from(&request), &pod, &pod).unwrap();
        assert!(response.patch.is_none());
    }

    #[test]
    fn test_patch_response_diffs_annotations() {
        let request = request("CREATE", Some(pod_json()));
        let pod: Pod = serde_json::from_value(pod_json()).unwrap();
        let mut mutated = pod.clone();
        mutated.metadata.annotations = Some(BTreeMap::from([(
            "oneagent.dynatrace.com/injected".to_string(),
            "true".to_string(),
        )]));

        let response = patch_response(AdmissionResponse::from(&request), &pod, &mutated).unwrap();
        let ops = patch_ops(&response);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["op"], "add");
        assert_eq!(ops[0]["path"], "/metadata/annotations");
    }
}
