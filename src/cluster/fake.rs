// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ClusterClient`] for tests and offline runs.
//!
//! Objects are keyed by `(namespace, name)`. Created secrets and events and
//! patched statuses are recorded so tests can assert on them. Individual calls
//! can be made to fail with a given HTTP status to exercise error paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Pod, Secret};
use kube::core::response::StatusSummary;
use kube::core::Status;

use crate::api::latest::status::DynaKubeStatus;
use crate::api::latest::DynaKube;
use crate::cluster::ClusterClient;
use crate::errors::ClusterError;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct State {
    dynakubes: BTreeMap<Key, DynaKube>,
    namespaces: BTreeMap<String, Namespace>,
    daemonsets: BTreeSet<Key>,
    secrets: BTreeMap<Key, Secret>,
    config_maps: BTreeMap<Key, ConfigMap>,
    pods: BTreeMap<Key, Pod>,
    group_versions: BTreeSet<String>,
    crds: BTreeSet<String>,
    events: Vec<(String, Event)>,
    status_patches: Vec<(Key, DynaKubeStatus)>,
    failures: BTreeMap<&'static str, (u16, String)>,
}

/// Operation names accepted by [`FakeCluster::fail`].
pub mod op {
    pub const GET_DYNAKUBE: &str = "get_dynakube";
    pub const LIST_DYNAKUBES: &str = "list_dynakubes";
    pub const PATCH_STATUS: &str = "patch_dynakube_status";
    pub const GET_NAMESPACE: &str = "get_namespace";
    pub const GET_SECRET: &str = "get_secret";
    pub const CREATE_SECRET: &str = "create_secret";
    pub const DAEMONSET_EXISTS: &str = "daemonset_exists";
}

/// In-memory cluster.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

fn api_failure(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(Box::new(Status {
        status: Some(StatusSummary::Failure),
        code,
        reason: reason.to_string(),
        message,
        ..Status::default()
    }))
}

impl FakeCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: &'static str) -> Result<(), ClusterError> {
        match self.state().failures.get(operation) {
            Some((code, reason)) => Err(ClusterError::api(
                operation,
                api_failure(*code, reason, format!("injected failure of {operation}")),
            )),
            None => Ok(()),
        }
    }

    /// Makes every later call of `operation` fail with the given HTTP status.
    pub fn fail(&self, operation: &'static str, code: u16, reason: &str) {
        self.state()
            .failures
            .insert(operation, (code, reason.to_string()));
    }

    pub fn add_dynakube(&self, dynakube: DynaKube) {
        let k = key(dynakube.namespace(), dynakube.name());
        self.state().dynakubes.insert(k, dynakube);
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        self.state().namespaces.insert(name, namespace);
    }

    pub fn add_daemonset(&self, namespace: &str, name: &str) {
        self.state().daemonsets.insert(key(namespace, name));
    }

    pub fn add_secret(&self, namespace: &str, secret: Secret) {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.state().secrets.insert(key(namespace, &name), secret);
    }

    pub fn add_config_map(&self, namespace: &str, config_map: ConfigMap) {
        let name = config_map.metadata.name.clone().unwrap_or_default();
        self.state()
            .config_maps
            .insert(key(namespace, &name), config_map);
    }

    pub fn add_pod(&self, namespace: &str, pod: Pod) {
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.state().pods.insert(key(namespace, &name), pod);
    }

    pub fn add_group_version(&self, group_version: &str) {
        self.state().group_versions.insert(group_version.to_string());
    }

    pub fn add_crd(&self, name: &str) {
        self.state().crds.insert(name.to_string());
    }

    /// A stored secret, including those created through the client.
    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state().secrets.get(&key(namespace, name)).cloned()
    }

    /// Events created through the client, with their namespace.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Event)> {
        self.state().events.clone()
    }

    /// Status patches applied through the client.
    #[must_use]
    pub fn status_patches(&self) -> Vec<(String, String, DynaKubeStatus)> {
        self.state()
            .status_patches
            .iter()
            .map(|((ns, name), status)| (ns.clone(), name.clone(), status.clone()))
            .collect()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_dynakube(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynaKube>, ClusterError> {
        self.check(op::GET_DYNAKUBE)?;
        Ok(self.state().dynakubes.get(&key(namespace, name)).cloned())
    }

    async fn list_dynakubes(&self, namespace: &str) -> Result<Vec<DynaKube>, ClusterError> {
        self.check(op::LIST_DYNAKUBES)?;
        Ok(self
            .state()
            .dynakubes
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, dk)| dk.clone())
            .collect())
    }

    async fn patch_dynakube_status(
        &self,
        namespace: &str,
        name: &str,
        status: &DynaKubeStatus,
    ) -> Result<(), ClusterError> {
        self.check(op::PATCH_STATUS)?;
        let mut state = self.state();
        if let Some(dk) = state.dynakubes.get_mut(&key(namespace, name)) {
            dk.status = Some(status.clone());
        }
        state
            .status_patches
            .push((key(namespace, name), status.clone()));
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        self.check(op::GET_NAMESPACE)?;
        Ok(self.state().namespaces.get(name).cloned())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        Ok(self.state().namespaces.values().cloned().collect())
    }

    async fn daemonset_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.check(op::DAEMONSET_EXISTS)?;
        Ok(self.state().daemonsets.contains(&key(namespace, name)))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        self.check(op::GET_SECRET)?;
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        self.check(op::CREATE_SECRET)?;
        let name = secret.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        let k = key(namespace, &name);
        if state.secrets.contains_key(&k) {
            return Err(ClusterError::api(
                format!("create secret {namespace}/{name}"),
                api_failure(409, "AlreadyExists", format!("secrets \"{name}\" already exists")),
            ));
        }
        state.secrets.insert(k, secret.clone());
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, ClusterError> {
        Ok(self.state().config_maps.get(&key(namespace, name)).cloned())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        Ok(self.state().pods.get(&key(namespace, name)).cloned())
    }

    async fn api_group_version_exists(&self, group_version: &str) -> Result<bool, ClusterError> {
        Ok(self.state().group_versions.contains(group_version))
    }

    async fn crd_exists(&self, name: &str) -> Result<bool, ClusterError> {
        Ok(self.state().crds.contains(name))
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ClusterError> {
        self.state()
            .events
            .push((namespace.to_string(), event.clone()));
        Ok(())
    }
}
