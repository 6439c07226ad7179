// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Feature flags carried as `DynaKube` annotations.
//!
//! Every flag lives under the `feature.dynatrace.com/` prefix. [`FeatureFlags`]
//! is a borrowed view over the annotation map that exposes one typed accessor
//! per flag, each with its documented default.
//!
//! # Value domains
//!
//! - **bool** - `true` only for the exact string `"true"`
//! - **bool (default on)** - `false` only for the exact string `"false"`
//! - **int** - unparsable values fall back to the default
//! - **duration** - Go duration format, invalid or negative values fall back
//! - **enum** - see [`InjectionFailurePolicy`]
//!
//! # Example
//!
//! ```rust
//! use dynakube::api::feature_flags::{FeatureFlags, AUTOMATIC_INJECTION};
//! use std::collections::BTreeMap;
//!
//! let mut annotations = BTreeMap::new();
//! annotations.insert(AUTOMATIC_INJECTION.to_string(), "false".to_string());
//!
//! let flags = FeatureFlags::new(Some(&annotations), "dynakube", "dynatrace", false);
//! assert!(!flags.automatic_injection());
//! assert_eq!(flags.oneagent_max_unavailable(), 1);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use crate::api::duration::parse_go_duration;

/// Prefix shared by every feature flag annotation
pub const ANNOTATION_FEATURE_PREFIX: &str = "feature.dynatrace.com/";

// ============================================================================
// General
// ============================================================================

/// Pull images from the public registry instead of the tenant registry
pub const PUBLIC_REGISTRY: &str = "feature.dynatrace.com/public-registry";

/// Disables proxy usage for these hosts
pub const NO_PROXY: &str = "feature.dynatrace.com/no-proxy";

/// Minutes between API requests to the tenant (moved to a CRD field)
pub const API_REQUEST_THRESHOLD: &str = "feature.dynatrace.com/dynatrace-api-request-threshold";

/// Keep OneAgent instances whose state cannot be determined
pub const IGNORE_UNKNOWN_STATE: &str = "feature.dynatrace.com/ignore-unknown-state";

// ============================================================================
// ActiveGate
// ============================================================================

/// Deprecated inverse of [`ACTIVEGATE_UPDATES`]
pub const DISABLE_ACTIVEGATE_UPDATES: &str = "feature.dynatrace.com/disable-activegate-updates";

/// Allow ActiveGate auto-updates
pub const ACTIVEGATE_UPDATES: &str = "feature.dynatrace.com/activegate-updates";

/// Ignore the proxy for ActiveGate traffic (deprecated)
pub const ACTIVEGATE_IGNORE_PROXY: &str = "feature.dynatrace.com/activegate-ignore-proxy";

/// Run the ActiveGate with an AppArmor profile
pub const ACTIVEGATE_APPARMOR: &str = "feature.dynatrace.com/activegate-apparmor";

/// Create the Kubernetes API monitoring settings automatically
pub const AUTOMATIC_K8S_API_MONITORING: &str =
    "feature.dynatrace.com/automatic-kubernetes-api-monitoring";

/// Cluster name used by the automatic Kubernetes API monitoring (moved to a CRD field)
pub const AUTOMATIC_K8S_API_MONITORING_CLUSTER_NAME: &str =
    "feature.dynatrace.com/automatic-kubernetes-api-monitoring-cluster-name";

/// Enable the Kubernetes app
pub const K8S_APP_ENABLED: &str = "feature.dynatrace.com/k8s-app-enabled";

/// Generate a TLS certificate for the ActiveGate automatically
pub const ACTIVEGATE_AUTOMATIC_TLS_CERTIFICATE: &str =
    "feature.dynatrace.com/automatic-tls-certificate";

// ============================================================================
// OneAgent
// ============================================================================

/// Ignore the proxy for OneAgent traffic (deprecated)
pub const ONEAGENT_IGNORE_PROXY: &str = "feature.dynatrace.com/oneagent-ignore-proxy";

/// Allow more than one OneAgent per node
pub const MULTIPLE_OSAGENTS_ON_NODE: &str = "feature.dynatrace.com/multiple-osagents-on-node";

/// `maxUnavailable` of the OneAgent daemonset
pub const ONEAGENT_MAX_UNAVAILABLE: &str = "feature.dynatrace.com/oneagent-max-unavailable";

/// Initial connect retry of the OneAgent in milliseconds
pub const ONEAGENT_INITIAL_CONNECT_RETRY: &str =
    "feature.dynatrace.com/oneagent-initial-connect-retry-ms";

/// Run the OneAgent container privileged (deprecated)
pub const ONEAGENT_PRIVILEGED: &str = "feature.dynatrace.com/oneagent-privileged";

/// Seccomp profile of the OneAgent (moved to a CRD field)
pub const ONEAGENT_SECCOMP_PROFILE: &str = "feature.dynatrace.com/oneagent-seccomp-profile";

/// Skip the OneAgent liveness probe
pub const ONEAGENT_SKIP_LIVENESS_PROBE: &str = "feature.dynatrace.com/oneagent-skip-liveness-probe";

/// Run the OneAgent with a read-only host filesystem
pub const ONEAGENT_READONLY_HOST_FS: &str = "feature.dynatrace.com/oneagent-readonly-host-fs";

// ============================================================================
// Injection
// ============================================================================

/// Deprecated inverse of [`METADATA_ENRICHMENT`]
pub const DISABLE_METADATA_ENRICHMENT: &str = "feature.dynatrace.com/disable-metadata-enrichment";

/// Enable metadata enrichment (moved to a CRD field)
pub const METADATA_ENRICHMENT: &str = "feature.dynatrace.com/metadata-enrichment";

/// JSON list of namespace regexes the webhook never injects into
pub const IGNORED_NAMESPACES: &str = "feature.dynatrace.com/ignored-namespaces";

/// Inject into every pod of a selected namespace unless it opts out
pub const AUTOMATIC_INJECTION: &str = "feature.dynatrace.com/automatic-injection";

/// Add the release version-detection environment variables
pub const LABEL_VERSION_DETECTION: &str = "feature.dynatrace.com/label-version-detection";

/// Behavior of the init container when the installation fails
pub const INJECTION_FAILURE_POLICY: &str = "feature.dynatrace.com/injection-failure-policy";

/// Set the runtime-default seccomp profile on the init container
pub const INIT_CONTAINER_SECCOMP: &str = "feature.dynatrace.com/init-container-seccomp-profile";

/// Enforce the configured injection settings on the agent
pub const ENFORCEMENT_MODE: &str = "feature.dynatrace.com/enforcement-mode";

/// Retry count of CSI mounts (deprecated, replaced by [`MAX_CSI_MOUNT_TIMEOUT`])
pub const MAX_CSI_MOUNT_ATTEMPTS: &str = "feature.dynatrace.com/max-csi-mount-attempts";

/// Total timeout of CSI mounts
pub const MAX_CSI_MOUNT_TIMEOUT: &str = "feature.dynatrace.com/max-csi-mount-timeout";

/// Mount the CSI volume read-only
pub const READONLY_CSI_VOLUME: &str = "feature.dynatrace.com/injection-readonly-volume";

/// Use the bootstrapper (node image pull) injection strategy
pub const NODE_IMAGE_PULL: &str = "feature.dynatrace.com/node-image-pull";

/// Technology list used by the bootstrapper injection strategy
pub const NODE_IMAGE_PULL_TECHNOLOGY: &str = "oneagent.dynatrace.com/technologies";

// ============================================================================
// Defaults
// ============================================================================

/// Default of [`MAX_CSI_MOUNT_TIMEOUT`]
pub const DEFAULT_MAX_CSI_MOUNT_TIMEOUT: &str = "10m";

/// Default of [`MAX_CSI_MOUNT_ATTEMPTS`]
pub const DEFAULT_MAX_FAILED_CSI_MOUNT_ATTEMPTS: i64 = 10;

/// Default of [`ONEAGENT_INITIAL_CONNECT_RETRY`] meaning "unset"
pub const DEFAULT_ONEAGENT_INITIAL_CONNECT_RETRY: i64 = -1;

/// Default of [`ONEAGENT_INITIAL_CONNECT_RETRY`] when istio is enabled
pub const ISTIO_DEFAULT_ONEAGENT_INITIAL_CONNECT_RETRY: i64 = 6000;

/// Flags that are deprecated and will be removed without a replacement
pub const DEPRECATED_FEATURE_FLAGS: &[&str] = &[
    ONEAGENT_IGNORE_PROXY,
    ACTIVEGATE_IGNORE_PROXY,
    MAX_CSI_MOUNT_ATTEMPTS,
    DISABLE_ACTIVEGATE_UPDATES,
    DISABLE_METADATA_ENRICHMENT,
    ONEAGENT_PRIVILEGED,
];

/// Flags that were moved into typed `DynaKube` fields
pub const MOVED_FEATURE_FLAGS: &[&str] = &[
    METADATA_ENRICHMENT,
    API_REQUEST_THRESHOLD,
    ONEAGENT_SECCOMP_PROFILE,
    AUTOMATIC_K8S_API_MONITORING_CLUSTER_NAME,
];

const TRUE_PHRASE: &str = "true";
const FALSE_PHRASE: &str = "false";

/// Behavior of the injected init container when the agent installation fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InjectionFailurePolicy {
    /// Log the failure and let the pod start
    #[default]
    Silent,
    /// Fail the init container and thereby the pod
    Fail,
}

impl InjectionFailurePolicy {
    /// Map a raw value: only `"fail"` is strict, everything else is silent.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "fail" {
            Self::Fail
        } else {
            Self::Silent
        }
    }

    /// Wire representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for InjectionFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, read-only view over the feature flag annotations of one `DynaKube`.
#[derive(Clone, Copy, Debug)]
pub struct FeatureFlags<'a> {
    annotations: Option<&'a BTreeMap<String, String>>,
    name: &'a str,
    namespace: &'a str,
    istio_enabled: bool,
}

impl<'a> FeatureFlags<'a> {
    /// Create a view.
    ///
    /// `name` and `namespace` are those of the `DynaKube`; they feed the
    /// defaults of the cluster-name and ignored-namespaces flags.
    #[must_use]
    pub fn new(
        annotations: Option<&'a BTreeMap<String, String>>,
        name: &'a str,
        namespace: &'a str,
        istio_enabled: bool,
    ) -> Self {
        Self {
            annotations,
            name,
            namespace,
            istio_enabled,
        }
    }

    /// Raw annotation value, or `""` if absent.
    #[must_use]
    pub fn raw(&self, key: &str) -> &'a str {
        self.annotations
            .and_then(|annotations| annotations.get(key))
            .map_or("", String::as_str)
    }

    /// Returns true if the annotation is present, whatever its value.
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.annotations
            .is_some_and(|annotations| annotations.contains_key(key))
    }

    fn bool_flag(&self, key: &str) -> bool {
        self.raw(key) == TRUE_PHRASE
    }

    fn bool_flag_default_on(&self, key: &str) -> bool {
        self.raw(key) != FALSE_PHRASE
    }

    /// A default-on flag with a deprecated inverse alias. The new flag wins
    /// whenever it is set; the alias is only consulted when it is empty.
    fn disabled_with_deprecated_alias(&self, key: &str, deprecated_inverse: &str) -> bool {
        self.raw(key) == FALSE_PHRASE
            || (self.raw(deprecated_inverse) == TRUE_PHRASE && self.raw(key).is_empty())
    }

    fn int_flag(&self, key: &str, default: i64) -> i64 {
        let raw = self.raw(key);
        if raw.is_empty() {
            return default;
        }
        raw.parse().unwrap_or(default)
    }

    /// Every feature flag annotation present, in key order.
    pub fn present(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.annotations
            .into_iter()
            .flat_map(|annotations| annotations.iter())
            .filter(|(key, _)| key.starts_with(ANNOTATION_FEATURE_PREFIX))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    // ------------------------------------------------------------------------
    // General
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn public_registry(&self) -> bool {
        self.bool_flag(PUBLIC_REGISTRY)
    }

    #[must_use]
    pub fn no_proxy(&self) -> &'a str {
        self.raw(NO_PROXY)
    }

    #[must_use]
    pub fn ignore_unknown_state(&self) -> bool {
        self.bool_flag(IGNORE_UNKNOWN_STATE)
    }

    // ------------------------------------------------------------------------
    // ActiveGate
    // ------------------------------------------------------------------------

    /// ActiveGate auto-updates, honoring the deprecated `disable-activegate-updates`.
    #[must_use]
    pub fn activegate_updates(&self) -> bool {
        !self.disabled_with_deprecated_alias(ACTIVEGATE_UPDATES, DISABLE_ACTIVEGATE_UPDATES)
    }

    #[must_use]
    pub fn activegate_ignore_proxy(&self) -> bool {
        self.bool_flag(ACTIVEGATE_IGNORE_PROXY)
    }

    #[must_use]
    pub fn activegate_apparmor(&self) -> bool {
        self.bool_flag(ACTIVEGATE_APPARMOR)
    }

    #[must_use]
    pub fn automatic_kubernetes_api_monitoring(&self) -> bool {
        self.bool_flag_default_on(AUTOMATIC_K8S_API_MONITORING)
    }

    /// Cluster name for Kubernetes API monitoring, defaulting to the `DynaKube` name.
    #[must_use]
    pub fn automatic_kubernetes_api_monitoring_cluster_name(&self) -> &'a str {
        match self.raw(AUTOMATIC_K8S_API_MONITORING_CLUSTER_NAME) {
            "" => self.name,
            name => name,
        }
    }

    #[must_use]
    pub fn k8s_app_enabled(&self) -> bool {
        self.bool_flag(K8S_APP_ENABLED)
    }

    #[must_use]
    pub fn activegate_automatic_tls_certificate(&self) -> bool {
        self.bool_flag_default_on(ACTIVEGATE_AUTOMATIC_TLS_CERTIFICATE)
    }

    // ------------------------------------------------------------------------
    // OneAgent
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn oneagent_ignore_proxy(&self) -> bool {
        self.bool_flag(ONEAGENT_IGNORE_PROXY)
    }

    #[must_use]
    pub fn multiple_osagents_on_node(&self) -> bool {
        self.bool_flag(MULTIPLE_OSAGENTS_ON_NODE)
    }

    #[must_use]
    pub fn oneagent_max_unavailable(&self) -> i64 {
        self.int_flag(ONEAGENT_MAX_UNAVAILABLE, 1)
    }

    /// Initial connect retry in milliseconds; `-1` means unset.
    ///
    /// With istio enabled the unset value becomes `6000`. An explicit value,
    /// including an explicit `-1`, is returned unchanged unless istio is on.
    #[must_use]
    pub fn oneagent_initial_connect_retry(&self) -> i64 {
        let value = self.int_flag(
            ONEAGENT_INITIAL_CONNECT_RETRY,
            DEFAULT_ONEAGENT_INITIAL_CONNECT_RETRY,
        );
        if value == DEFAULT_ONEAGENT_INITIAL_CONNECT_RETRY && self.istio_enabled {
            return ISTIO_DEFAULT_ONEAGENT_INITIAL_CONNECT_RETRY;
        }
        value
    }

    #[must_use]
    pub fn oneagent_privileged(&self) -> bool {
        self.bool_flag(ONEAGENT_PRIVILEGED)
    }

    #[must_use]
    pub fn oneagent_skip_liveness_probe(&self) -> bool {
        self.bool_flag(ONEAGENT_SKIP_LIVENESS_PROBE)
    }

    #[must_use]
    pub fn oneagent_readonly_host_fs(&self) -> bool {
        self.bool_flag_default_on(ONEAGENT_READONLY_HOST_FS)
    }

    // ------------------------------------------------------------------------
    // Injection
    // ------------------------------------------------------------------------

    /// Metadata enrichment as carried by the annotation, honoring the
    /// deprecated `disable-metadata-enrichment`.
    #[must_use]
    pub fn metadata_enrichment(&self) -> bool {
        !self.disabled_with_deprecated_alias(METADATA_ENRICHMENT, DISABLE_METADATA_ENRICHMENT)
    }

    /// Namespace regexes excluded from injection.
    ///
    /// An absent or malformed annotation yields the default list, which always
    /// contains the `DynaKube`'s own namespace.
    #[must_use]
    pub fn ignored_namespaces(&self) -> Vec<String> {
        let raw = self.raw(IGNORED_NAMESPACES);
        if !raw.is_empty() {
            match serde_json::from_str::<Vec<String>>(raw) {
                Ok(namespaces) => return namespaces,
                Err(e) => warn!(
                    name = %self.name,
                    error = %e,
                    "Ignoring malformed ignored-namespaces feature flag"
                ),
            }
        }
        self.default_ignored_namespaces()
    }

    /// Returns true if `namespace` matches one of the ignored-namespace regexes.
    ///
    /// Regexes that fail to compile are logged and skipped.
    #[must_use]
    pub fn is_namespace_ignored(&self, namespace: &str) -> bool {
        self.ignored_namespaces()
            .iter()
            .any(|pattern| match Regex::new(pattern) {
                Ok(regex) => regex.is_match(namespace),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Skipping invalid ignored-namespaces regex");
                    false
                }
            })
    }

    /// The default ignored namespaces for this `DynaKube`.
    #[must_use]
    pub fn default_ignored_namespaces(&self) -> Vec<String> {
        vec![
            format!("^{}$", self.namespace),
            "^kube-.*".to_string(),
            "^openshift(-.*)?".to_string(),
            "^gke-.*".to_string(),
            "^gmp-.*".to_string(),
        ]
    }

    #[must_use]
    pub fn automatic_injection(&self) -> bool {
        self.bool_flag_default_on(AUTOMATIC_INJECTION)
    }

    #[must_use]
    pub fn label_version_detection(&self) -> bool {
        self.bool_flag(LABEL_VERSION_DETECTION)
    }

    #[must_use]
    pub fn injection_failure_policy(&self) -> InjectionFailurePolicy {
        InjectionFailurePolicy::parse(self.raw(INJECTION_FAILURE_POLICY))
    }

    #[must_use]
    pub fn init_container_seccomp(&self) -> bool {
        self.bool_flag(INIT_CONTAINER_SECCOMP)
    }

    #[must_use]
    pub fn enforcement_mode(&self) -> bool {
        self.bool_flag_default_on(ENFORCEMENT_MODE)
    }

    /// Legacy CSI mount retry count; negative values fall back to the default.
    #[must_use]
    pub fn max_failed_csi_mount_attempts(&self) -> i64 {
        let value = self.int_flag(MAX_CSI_MOUNT_ATTEMPTS, DEFAULT_MAX_FAILED_CSI_MOUNT_ATTEMPTS);
        if value < 0 {
            return DEFAULT_MAX_FAILED_CSI_MOUNT_ATTEMPTS;
        }
        value
    }

    /// Total CSI mount timeout; invalid or negative values fall back to `10m`.
    #[must_use]
    pub fn max_csi_mount_timeout(&self) -> Duration {
        parse_go_duration(self.raw(MAX_CSI_MOUNT_TIMEOUT)).unwrap_or(DEFAULT_CSI_MOUNT_TIMEOUT)
    }

    #[must_use]
    pub fn readonly_csi_volume(&self) -> bool {
        self.bool_flag(READONLY_CSI_VOLUME)
    }

    #[must_use]
    pub fn node_image_pull(&self) -> bool {
        self.bool_flag(NODE_IMAGE_PULL)
    }

    /// Technology list for the bootstrapper, `""` when unset.
    #[must_use]
    pub fn node_image_pull_technology(&self) -> &'a str {
        self.raw(NODE_IMAGE_PULL_TECHNOLOGY)
    }
}

/// [`DEFAULT_MAX_CSI_MOUNT_TIMEOUT`] as a `Duration`.
const DEFAULT_CSI_MOUNT_TIMEOUT: Duration = Duration::from_secs(600);

#[cfg(test)]
#[path = "feature_flags_tests.rs"]
mod feature_flags_tests;
