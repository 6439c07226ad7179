// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::Handle;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dynakube::api::latest::oneagent::ApplicationMonitoringSpec;
use dynakube::api::latest::status::DynaKubeStatus;
use dynakube::api::latest::{DynaKube, DynaKubeSpec};
use dynakube::api::shared::CommunicationHostStatus;
use dynakube::cluster::fake::FakeCluster;
use dynakube::config::Modules;
use dynakube::labels::INJECTION_INSTANCE_LABEL;
use dynakube::mutation::InjectionSettings;
use dynakube::webhook::server::serve;
use dynakube::webhook::{webhook_router, WebhookState};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const OPERATOR_NAMESPACE: &str = "dynatrace";
pub const APP_NAMESPACE: &str = "shop";

// ============================================================================
// Live cluster
// ============================================================================

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "dynakube-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(client: &Client, name: &str) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => println!("Deleted test namespace: {name}"),
        Err(e) => eprintln!("Failed to delete test namespace {name}: {e}"),
    }
}

// ============================================================================
// Offline fixtures
// ============================================================================

/// A `DynaKube` with application monitoring and a populated status.
pub fn ready_dynakube() -> DynaKube {
    let mut dk = DynaKube::new(
        "dynakube",
        DynaKubeSpec {
            api_url: "https://abc12345.live.dynatrace.com/api".to_string(),
            ..DynaKubeSpec::default()
        },
    );
    dk.metadata.namespace = Some(OPERATOR_NAMESPACE.to_string());
    dk.spec.one_agent.application_monitoring = Some(ApplicationMonitoringSpec::default());

    let mut status = DynaKubeStatus::default();
    let connection = &mut status.one_agent.connection_info_status;
    connection.connection_info.tenant_uuid = "abc12345".to_string();
    connection.communication_hosts = vec![CommunicationHostStatus {
        protocol: "https".to_string(),
        host: "abc12345.live.dynatrace.com".to_string(),
        port: 443,
    }];
    status.code_modules.version = "1.300.0.20240101-000000".to_string();
    dk.status = Some(status);
    dk
}

/// A cluster with `dk`, its token secret and an application namespace
/// labeled for it.
pub fn cluster_with(dk: DynaKube) -> Arc<FakeCluster> {
    let cluster = FakeCluster::new();
    cluster.add_namespace(Namespace {
        metadata: ObjectMeta {
            name: Some(APP_NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([(
                INJECTION_INSTANCE_LABEL.to_string(),
                dk.metadata.name.clone().unwrap_or_default(),
            )])),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    });
    cluster.add_secret(
        OPERATOR_NAMESPACE,
        Secret {
            metadata: ObjectMeta {
                name: dk.metadata.name.clone(),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "apiToken".to_string(),
                ByteString(b"dt0c01.token".to_vec()),
            )])),
            ..Secret::default()
        },
    );
    cluster.add_dynakube(dk);
    Arc::new(cluster)
}

pub fn settings() -> InjectionSettings {
    InjectionSettings {
        webhook_image: "dynatrace/dynatrace-operator:v1.4.0".to_string(),
        cluster_id: "9d3c5a1e-kube-system".to_string(),
        operator_namespace: OPERATOR_NAMESPACE.to_string(),
        modules: Modules { csi_driver: false },
        incompatible_crd_present: false,
    }
}

/// An `AdmissionReview` envelope for `object`.
pub fn admission_review(resource: &str, operation: &str, namespace: &str, object: Value) -> Value {
    let (group, version, kind) = match resource {
        "pods" => ("", "v1", "Pod"),
        _ => ("dynatrace.com", "v1beta5", "DynaKube"),
    };
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "3f1b7e9a-2c4d-4e5f-8a6b-7c8d9e0f1a2b",
            "kind": { "group": group, "version": version, "kind": kind },
            "resource": { "group": group, "version": version, "resource": resource },
            "namespace": namespace,
            "operation": operation,
            "userInfo": { "username": "integration-test" },
            "object": object,
        }
    })
}

/// The JSON patch operations of an admission review response.
pub fn decode_patch(review: &Value) -> Vec<Value> {
    let bytes = match &review["response"]["patch"] {
        Value::Null => return Vec::new(),
        Value::String(encoded) => STANDARD.decode(encoded).expect("base64 patch"),
        other => serde_json::from_value::<Vec<u8>>(other.clone()).expect("byte patch"),
    };
    serde_json::from_slice(&bytes).expect("JSON patch")
}

// ============================================================================
// HTTP
// ============================================================================

/// A webhook router served over plain HTTP on a random local port.
pub struct TestServer {
    pub address: SocketAddr,
    handle: Handle,
}

impl TestServer {
    pub async fn start(cluster: Arc<FakeCluster>, settings: InjectionSettings) -> Self {
        let state = Arc::new(WebhookState::new(cluster, settings));
        let handle = Handle::new();
        tokio::spawn(serve(
            "127.0.0.1:0".parse().unwrap(),
            webhook_router(state),
            None,
            handle.clone(),
        ));
        let address = handle.listening().await.expect("test server is listening");
        Self { address, handle }
    }

    /// Posts `body` to `path` and returns the status code and JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> (u16, Value) {
        let payload = serde_json::to_vec(body).unwrap();
        let mut stream = TcpStream::connect(self.address).await.unwrap();
        let head = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(&payload).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();
        let (head, body) = raw.split_once("\r\n\r\n").expect("HTTP response");
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("status code");
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body).unwrap_or(Value::String(body.to_string()))
        };
        (status, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}
