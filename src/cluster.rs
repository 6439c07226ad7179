// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes API access for the webhooks.
//!
//! Every API-server call made by the validator and the pod webhook goes
//! through the [`ClusterClient`] trait. [`KubeClusterClient`] implements it on
//! top of [`kube::Client`] and bounds each call by the admission deadline;
//! [`fake::FakeCluster`] is an in-memory implementation for tests.
//!
//! Lookups return `Ok(None)` (or `false`) for "not found". Creators surface
//! "already exists" as an error so the caller can decide to treat it as success.

pub mod fake;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Pod, Secret};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

use crate::api::latest::status::DynaKubeStatus;
use crate::api::latest::DynaKube;
use crate::errors::ClusterError;

/// Default upper bound of a single API-server call.
///
/// The API server gives admission webhooks 10 seconds by default; a call that
/// takes longer than this leaves no time to answer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// The Kubernetes API calls needed by the validator and the pod webhook.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Reads a `DynaKube` (hub version).
    async fn get_dynakube(&self, namespace: &str, name: &str)
        -> Result<Option<DynaKube>, ClusterError>;

    /// Lists the `DynaKube`s of a namespace (hub version).
    async fn list_dynakubes(&self, namespace: &str) -> Result<Vec<DynaKube>, ClusterError>;

    /// Merge-patches the status subresource of a `DynaKube`.
    async fn patch_dynakube_status(
        &self,
        namespace: &str,
        name: &str,
        status: &DynaKubeStatus,
    ) -> Result<(), ClusterError>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError>;

    async fn daemonset_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError>;

    /// Creates a secret. "Already exists" is returned as an error.
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError>;

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError>;

    /// Returns true if the API server serves the given group/version.
    async fn api_group_version_exists(&self, group_version: &str) -> Result<bool, ClusterError>;

    /// Returns true if a CRD with the given name is installed.
    async fn crd_exists(&self, name: &str) -> Result<bool, ClusterError>;

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ClusterError>;
}

/// [`ClusterClient`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    request_timeout: Duration,
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the per-call deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Runs a call under the request deadline and tags errors with `operation`.
    async fn bounded<T, F>(&self, operation: String, call: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, kube::Error>> + Send,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(|e| ClusterError::api(operation, e)),
            Err(_) => Err(ClusterError::Timeout { operation }),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_dynakube(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynaKube>, ClusterError> {
        let api: Api<DynaKube> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(format!("get dynakube {namespace}/{name}"), api.get_opt(name))
            .await
    }

    async fn list_dynakubes(&self, namespace: &str) -> Result<Vec<DynaKube>, ClusterError> {
        let api: Api<DynaKube> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded(
                format!("list dynakubes {namespace}"),
                api.list(&ListParams::default()),
            )
            .await?;
        Ok(list.items)
    }

    async fn patch_dynakube_status(
        &self,
        namespace: &str,
        name: &str,
        status: &DynaKubeStatus,
    ) -> Result<(), ClusterError> {
        let api: Api<DynaKube> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": status });
        debug!(namespace = %namespace, name = %name, "Patching DynaKube status");
        self.bounded(
            format!("patch dynakube status {namespace}/{name}"),
            api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        self.bounded(format!("get namespace {name}"), api.get_opt(name))
            .await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .bounded("list namespaces".to_string(), api.list(&ListParams::default()))
            .await?;
        Ok(list.items)
    }

    async fn daemonset_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        let daemonset = self
            .bounded(format!("get daemonset {namespace}/{name}"), api.get_opt(name))
            .await?;
        Ok(daemonset.is_some())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(format!("get secret {namespace}/{name}"), api.get_opt(name))
            .await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        self.bounded(
            format!("create secret {namespace}/{name}"),
            api.create(&PostParams::default(), secret),
        )
        .await?;
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(format!("get configmap {namespace}/{name}"), api.get_opt(name))
            .await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(format!("get pod {namespace}/{name}"), api.get_opt(name))
            .await
    }

    async fn api_group_version_exists(&self, group_version: &str) -> Result<bool, ClusterError> {
        let result = self
            .bounded(
                format!("discover {group_version}"),
                self.client.list_api_group_resources(group_version),
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn crd_exists(&self, name: &str) -> Result<bool, ClusterError> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let crd = self
            .bounded(format!("get crd {name}"), api.get_opt(name))
            .await?;
        Ok(crd.is_some())
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ClusterError> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(
            format!("create event {namespace}"),
            api.create(&PostParams::default(), event),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
