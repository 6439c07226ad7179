// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-namespace init secret read by the v1 init container.
//!
//! The secret `dynatrace-dynakube-config` holds the tenant connection
//! settings as JSON plus the proxy and the certificates the agent has to
//! trust. It is generated on demand the first time a pod of the namespace is
//! injected. Concurrent pods may race to create it, so "already exists"
//! counts as success.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::latest::DynaKube;
use crate::cluster::ClusterClient;
use crate::constants::{
    AGENT_INIT_SECRET_ACTIVEGATE_CAS_FIELD, AGENT_INIT_SECRET_CONFIG_FIELD, AGENT_INIT_SECRET_NAME,
    AGENT_INIT_SECRET_PROXY_FIELD, AGENT_INIT_SECRET_TRUSTED_CAS_FIELD,
};
use crate::errors::{ClusterError, InjectionError};
use crate::labels::{APP_NAME_OPERATOR, COMPONENT_INJECTION, K8S_COMPONENT, K8S_MANAGED_BY, K8S_NAME, MANAGED_BY_WEBHOOK};

/// Token secret key of the API token
pub const API_TOKEN_KEY: &str = "apiToken";

/// Token secret key of the PaaS token
pub const PAAS_TOKEN_KEY: &str = "paasToken";

/// Key of the proxy URL in a user-provided proxy secret
pub const PROXY_KEY: &str = "proxy";

/// Key of the certificates in the trusted-CA config map
pub const TRUSTED_CA_KEY: &str = "certs";

/// Key of the certificate in the ActiveGate TLS secret
pub const TLS_CERT_KEY: &str = "server.crt";

/// Connection settings serialized into the `config` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    pub monitoring_nodes: BTreeMap<String, String>,
    pub api_url: String,
    pub api_token: String,
    pub paas_token: String,
    pub proxy: String,
    pub no_proxy: String,
    pub network_zone: String,
    #[serde(rename = "tenantUUID")]
    pub tenant_uuid: String,
    pub host_group: String,
    pub initial_connect_retry: i64,
    pub skip_cert_check: bool,
    pub has_host: bool,
    pub enforcement_mode: bool,
    #[serde(rename = "readOnlyCSIDriver")]
    pub read_only_csi_driver: bool,
    #[serde(rename = "csiMode")]
    pub csi_mode: bool,
}

/// Makes sure the init secret exists in `namespace`.
///
/// # Errors
///
/// Returns [`InjectionError::InitSecret`] if reading the inputs or creating
/// the secret fails for a reason other than a creation race.
pub async fn ensure_init_secret(
    client: &dyn ClusterClient,
    dk: &DynaKube,
    namespace: &str,
    csi_mode: bool,
) -> Result<(), InjectionError> {
    let wrap = |source: ClusterError| InjectionError::InitSecret {
        namespace: namespace.to_string(),
        source,
    };

    if client
        .get_secret(namespace, AGENT_INIT_SECRET_NAME)
        .await
        .map_err(wrap)?
        .is_some()
    {
        debug!(namespace = %namespace, "Init secret already present");
        return Ok(());
    }

    let secret = generate_init_secret(client, dk, namespace, csi_mode).await?;
    match client.create_secret(namespace, &secret).await {
        Ok(()) => {
            info!(namespace = %namespace, dynakube = %dk.name(), "Created init secret");
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!(namespace = %namespace, "Init secret created concurrently");
            Ok(())
        }
        Err(e) => Err(wrap(e)),
    }
}

/// Builds the init secret for `namespace` from the `DynaKube` and the objects it references.
///
/// # Errors
///
/// Returns an error if the token secret is missing or any lookup fails.
pub async fn generate_init_secret(
    client: &dyn ClusterClient,
    dk: &DynaKube,
    namespace: &str,
    csi_mode: bool,
) -> Result<Secret, InjectionError> {
    let wrap = |source: ClusterError| InjectionError::InitSecret {
        namespace: namespace.to_string(),
        source,
    };
    let dk_namespace = dk.namespace();

    let tokens = client
        .get_secret(dk_namespace, dk.tokens())
        .await
        .map_err(wrap)?
        .ok_or_else(|| {
            InjectionError::InvalidInput(format!(
                "token secret '{dk_namespace}/{}' does not exist",
                dk.tokens()
            ))
        })?;

    let proxy = resolve_proxy(client, dk).await.map_err(wrap)?;
    let config = secret_config(dk, &tokens, proxy, csi_mode);
    let json = serde_json::to_vec(&config)
        .map_err(|e| InjectionError::InvalidInput(format!("failed to encode init config: {e}")))?;

    let mut data = BTreeMap::from([
        (AGENT_INIT_SECRET_CONFIG_FIELD.to_string(), ByteString(json)),
        (
            AGENT_INIT_SECRET_PROXY_FIELD.to_string(),
            ByteString(config.proxy.clone().into_bytes()),
        ),
    ]);

    if let Some(cas) = trusted_cas(client, dk).await.map_err(wrap)? {
        data.insert(AGENT_INIT_SECRET_TRUSTED_CAS_FIELD.to_string(), ByteString(cas));
    }
    if let Some(cert) = activegate_tls_cert(client, dk).await.map_err(wrap)? {
        data.insert(AGENT_INIT_SECRET_ACTIVEGATE_CAS_FIELD.to_string(), ByteString(cert));
    }

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(AGENT_INIT_SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                (K8S_NAME.to_string(), APP_NAME_OPERATOR.to_string()),
                (K8S_COMPONENT.to_string(), COMPONENT_INJECTION.to_string()),
                (K8S_MANAGED_BY.to_string(), MANAGED_BY_WEBHOOK.to_string()),
            ])),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..Secret::default()
    })
}

/// Connection settings derived from the `DynaKube` and its token secret.
#[must_use]
pub fn secret_config(dk: &DynaKube, tokens: &Secret, proxy: String, csi_mode: bool) -> SecretConfig {
    let flags = dk.feature_flags();
    let one_agent = dk.one_agent();
    let api_token = secret_value(tokens, API_TOKEN_KEY).unwrap_or_default();
    let paas_token = secret_value(tokens, PAAS_TOKEN_KEY)
        .filter(|token| !token.is_empty())
        .unwrap_or_else(|| api_token.clone());

    SecretConfig {
        monitoring_nodes: monitoring_nodes(dk),
        api_url: dk.api_url().to_string(),
        api_token,
        paas_token,
        proxy,
        no_proxy: flags.no_proxy().to_string(),
        network_zone: dk.spec.network_zone.clone(),
        tenant_uuid: one_agent.tenant_uuid().to_string(),
        host_group: one_agent.host_group().to_string(),
        initial_connect_retry: flags.oneagent_initial_connect_retry(),
        skip_cert_check: dk.spec.skip_cert_check,
        has_host: one_agent.is_cloud_native_full_stack_mode(),
        enforcement_mode: flags.enforcement_mode(),
        read_only_csi_driver: flags.readonly_csi_volume(),
        csi_mode,
    }
}

/// Nodes running a host agent of this `DynaKube`, mapped to its tenant UUID.
///
/// Only cloud-native full-stack has host agents. Without a tenant UUID the
/// nodes are left out, so the agent cannot pair with a host yet.
#[must_use]
pub fn monitoring_nodes(dk: &DynaKube) -> BTreeMap<String, String> {
    let one_agent = dk.one_agent();
    if !one_agent.is_cloud_native_full_stack_mode() {
        return BTreeMap::new();
    }

    let tenant_uuid = one_agent.tenant_uuid();
    if tenant_uuid.is_empty() {
        return BTreeMap::new();
    }

    dk.status
        .iter()
        .flat_map(|status| status.one_agent.instances.keys())
        .map(|node| (node.clone(), tenant_uuid.to_string()))
        .collect()
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| String::from_utf8_lossy(&value.0).trim().to_string())
}

/// Proxy URL inline or from the referenced secret; empty when the agent ignores it.
async fn resolve_proxy(client: &dyn ClusterClient, dk: &DynaKube) -> Result<String, ClusterError> {
    if dk.feature_flags().oneagent_ignore_proxy() {
        return Ok(String::new());
    }
    let Some(proxy) = dk.spec.proxy.as_ref() else {
        return Ok(String::new());
    };
    if !proxy.value.is_empty() {
        return Ok(proxy.value.clone());
    }
    if proxy.value_from.is_empty() {
        return Ok(String::new());
    }

    let secret = client.get_secret(dk.namespace(), &proxy.value_from).await?;
    Ok(secret
        .as_ref()
        .and_then(|secret| secret_value(secret, PROXY_KEY))
        .unwrap_or_default())
}

async fn trusted_cas(client: &dyn ClusterClient, dk: &DynaKube) -> Result<Option<Vec<u8>>, ClusterError> {
    if dk.spec.trusted_cas.is_empty() {
        return Ok(None);
    }
    let config_map = client.get_config_map(dk.namespace(), &dk.spec.trusted_cas).await?;
    Ok(config_map
        .and_then(|cm| cm.data)
        .and_then(|mut data| data.remove(TRUSTED_CA_KEY))
        .map(String::into_bytes))
}

async fn activegate_tls_cert(
    client: &dyn ClusterClient,
    dk: &DynaKube,
) -> Result<Option<Vec<u8>>, ClusterError> {
    if !has_activegate_tls(dk) {
        return Ok(None);
    }
    let secret = client
        .get_secret(dk.namespace(), &dk.active_gate().tls_secret_name())
        .await?;
    Ok(secret
        .and_then(|secret| secret.data)
        .and_then(|mut data| data.remove(TLS_CERT_KEY))
        .map(|cert| cert.0))
}

/// Returns true if the agent has to trust an ActiveGate certificate.
#[must_use]
pub fn has_activegate_tls(dk: &DynaKube) -> bool {
    let active_gate = dk.active_gate();
    active_gate.is_enabled()
        && (active_gate.has_custom_tls_certificate()
            || dk.feature_flags().activegate_automatic_tls_certificate())
}

#[cfg(test)]
#[path = "init_secret_tests.rs"]
mod init_secret_tests;
