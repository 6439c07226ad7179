// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the DynaKube API and webhooks.
//!
//! This module contains the numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance. Annotation and label keys
//! live in [`crate::labels`], feature-flag keys in [`crate::api::feature_flags`].

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `DynaKube` CRD
pub const API_GROUP: &str = "dynatrace.com";

/// Kind name for the `DynaKube` resource
pub const KIND_DYNAKUBE: &str = "DynaKube";

/// Plural resource name for the `DynaKube` resource
pub const DYNAKUBE_PLURAL: &str = "dynakubes";

/// Storage (hub) version of the `DynaKube` resource
pub const HUB_VERSION: &str = "v1beta5";

/// Oldest served version
pub const V1BETA1: &str = "v1beta1";

/// Served version with typed metadata enrichment and host group
pub const V1BETA2: &str = "v1beta2";

/// Served version with log monitoring, KSPM and telemetry ingest
pub const V1BETA4: &str = "v1beta4";

/// Fully qualified hub API version (group/version)
pub const HUB_API_VERSION: &str = "dynatrace.com/v1beta5";

/// Name of the legacy CRD that cannot coexist with the pod webhook
pub const LEGACY_ONEAGENT_APM_CRD: &str = "oneagentapms.dynatrace.com";

/// Istio API group/version probed when `enableIstio` is set
pub const ISTIO_GROUP_VERSION: &str = "networking.istio.io/v1beta1";

// ============================================================================
// Resource Naming
// ============================================================================

/// Maximum length of a `DynaKube` name.
///
/// The name prefixes every dependent object; 63 (label value limit) minus the
/// longest suffix leaves 40 characters.
pub const MAX_DYNAKUBE_NAME_LENGTH: usize = 40;

/// Suffix of the image pull secret
pub const PULL_SECRET_SUFFIX: &str = "-pull-secret";

/// Suffix of the OneAgent tenant secret
pub const ONEAGENT_TENANT_SECRET_SUFFIX: &str = "-oneagent-tenant-secret";

/// Suffix of the ActiveGate tenant secret
pub const ACTIVEGATE_TENANT_SECRET_SUFFIX: &str = "-activegate-tenant-secret";

/// Suffix of the ActiveGate auth-token secret
pub const ACTIVEGATE_AUTH_TOKEN_SECRET_SUFFIX: &str = "-activegate-authtoken-secret";

/// Suffix of the automatically created ActiveGate TLS secret
pub const ACTIVEGATE_TLS_SECRET_SUFFIX: &str = "-activegate-tls-secret";

/// Suffix of the ActiveGate connection-info configmap
pub const ACTIVEGATE_CONNECTION_INFO_SUFFIX: &str = "-activegate-connection-info";

/// Suffix of the OneAgent connection-info configmap
pub const ONEAGENT_CONNECTION_INFO_SUFFIX: &str = "-oneagent-connection-info";

/// Suffix of the OneAgent daemonset
pub const ONEAGENT_DAEMONSET_SUFFIX: &str = "-oneagent";

/// Key of the KSPM token inside its secret, also the secret suffix
pub const KSPM_TOKEN_SECRET_KEY: &str = "kspm-token";

/// Suffix of the KSPM node-configuration-collector daemonset
pub const KSPM_NODE_COLLECTOR_SUFFIX: &str = "node-config-collector";

/// Suffix of the extensions collector statefulset
pub const EXTENSIONS_COLLECTOR_SUFFIX: &str = "-extensions-collector";

/// Suffix of the ActiveGate statefulset
pub const ACTIVEGATE_STATEFULSET_SUFFIX: &str = "-activegate";

/// Suffix of the per-DynaKube bootstrapper config secret (source of replication)
pub const BOOTSTRAPPER_CONFIG_SOURCE_SUFFIX: &str = "-bootstrapper-config";

/// Suffix of the per-DynaKube bootstrapper certs secret (source of replication)
pub const BOOTSTRAPPER_CERTS_SOURCE_SUFFIX: &str = "-bootstrapper-certs";

// ============================================================================
// Tenant / Image Constants
// ============================================================================

/// Placeholder API URL shipped in sample manifests
pub const EXAMPLE_API_URL: &str = "https://ENVIRONMENTID.live.dynatrace.com/api";

/// Path suffix every API URL must carry
pub const API_URL_SUFFIX: &str = "/api";

/// Tag suffix of raw (non-immutable) images
pub const RAW_TAG: &str = "raw";

/// Registry sub-path of the ActiveGate image
pub const ACTIVEGATE_IMAGE_SUB_PATH: &str = "/linux/activegate";

/// Registry sub-path of the OneAgent image
pub const ONEAGENT_IMAGE_SUB_PATH: &str = "/linux/oneagent";

/// Registry sub-path of the code-modules image
pub const CODEMODULES_IMAGE_SUB_PATH: &str = "/linux/codemodules";

/// Default API request threshold in minutes
pub const DEFAULT_API_REQUEST_THRESHOLD_MINUTES: u16 = 15;

/// Default host path for OneAgent storage
pub const STORAGE_VOLUME_DEFAULT_HOST_PATH: &str = "/var/opt/dynatrace";

// ============================================================================
// CSI Driver
// ============================================================================

/// Name of the CSI driver daemonset looked up by the validator
pub const CSI_DAEMONSET_NAME: &str = "dynatrace-oneagent-csi-driver";

/// CSI driver name used in pod volumes
pub const CSI_DRIVER_NAME: &str = "csi.oneagent.dynatrace.com";

/// CSI volume attribute selecting the volume mode
pub const CSI_VOLUME_ATTRIBUTE_MODE: &str = "mode";

/// CSI volume attribute carrying the DynaKube name
pub const CSI_VOLUME_ATTRIBUTE_DYNAKUBE: &str = "dynakube";

/// CSI volume attribute carrying the retry timeout
pub const CSI_VOLUME_ATTRIBUTE_RETRY_TIMEOUT: &str = "csi.oneagent.dynatrace.com/retry-timeout";

/// CSI volume mode for application monitoring
pub const CSI_APP_MONITORING_MODE: &str = "app";

// ============================================================================
// Pod Injection: Shared
// ============================================================================

/// Name of the injected init container
pub const INSTALL_CONTAINER_NAME: &str = "install-oneagent";

/// Default user id of the init container
pub const DEFAULT_USER: i64 = 1001;

/// Default group id of the init container
pub const DEFAULT_GROUP: i64 = 1001;

/// Default technologies when the pod does not narrow them
pub const DEFAULT_TECHNOLOGIES: &str = "all";

/// Failure policy that makes injection errors fatal for the pod
pub const FAILURE_POLICY_FAIL: &str = "fail";

/// Failure policy that ignores injection errors
pub const FAILURE_POLICY_SILENT: &str = "silent";

/// Env var with the pod name (field ref)
pub const ENV_POD_NAME: &str = "K8S_PODNAME";

/// Env var with the pod uid (field ref)
pub const ENV_POD_UID: &str = "K8S_PODUID";

/// Env var with the node name (field ref)
pub const ENV_NODE_NAME: &str = "K8S_NODE_NAME";

/// Env var with the namespace (field ref)
pub const ENV_NAMESPACE: &str = "K8S_NAMESPACE";

/// Env var with the base pod name (generateName or name without suffix)
pub const ENV_BASE_POD_NAME: &str = "K8S_BASEPODNAME";

/// Env var with the deployment metadata of the injection
pub const ENV_DEPLOYMENT_METADATA: &str = "DT_DEPLOYMENT_METADATA";

/// Env var with the network zone
pub const ENV_NETWORK_ZONE: &str = "DT_NETWORK_ZONE";

/// Preload env var
pub const ENV_LD_PRELOAD: &str = "LD_PRELOAD";

/// Env var with the failure policy of the init container
pub const ENV_FAILURE_POLICY: &str = "FAILURE_POLICY";

/// Env var with the number of user containers
pub const ENV_CONTAINERS_COUNT: &str = "CONTAINERS_COUNT";

/// Env var with the installer flavor
pub const ENV_INSTALLER_FLAVOR: &str = "INSTALLER_FLAVOR";

/// Env var with the technologies to install
pub const ENV_INSTALLER_TECH: &str = "INSTALLER_TECH";

/// Env var with the install path
pub const ENV_INSTALL_PATH: &str = "INSTALLPATH";

/// Env var with the installer URL override
pub const ENV_INSTALLER_URL: &str = "INSTALLER_URL";

/// Env var with the code-modules version to install
pub const ENV_INSTALLER_VERSION: &str = "INSTALLER_VERSION";

/// Env var with the installer mode (`provisioned` or `installer`)
pub const ENV_MODE: &str = "MODE";

/// Env var telling the init container that OneAgent is injected
pub const ENV_ONEAGENT_INJECTED: &str = "ONEAGENT_INJECTED";

/// Env var with the release version of the workload
pub const ENV_RELEASE_VERSION: &str = "DT_RELEASE_VERSION";

/// Env var with the release product of the workload
pub const ENV_RELEASE_PRODUCT: &str = "DT_RELEASE_PRODUCT";

/// Env var with the release stage of the workload
pub const ENV_RELEASE_STAGE: &str = "DT_RELEASE_STAGE";

/// Env var with the release build version of the workload
pub const ENV_RELEASE_BUILD_VERSION: &str = "DT_RELEASE_BUILD_VERSION";

/// Default field path of `DT_RELEASE_VERSION`
pub const DEFAULT_RELEASE_VERSION_FIELD_PATH: &str = "metadata.labels['app.kubernetes.io/version']";

/// Default field path of `DT_RELEASE_PRODUCT`
pub const DEFAULT_RELEASE_PRODUCT_FIELD_PATH: &str = "metadata.labels['app.kubernetes.io/part-of']";

/// Orchestration technology reported in the deployment metadata
pub const DEPLOYMENT_ORCHESTRATION_TECH: &str = "Operator";

/// Deployment type of cloud-native full-stack injections
pub const DEPLOYMENT_TYPE_CLOUD_NATIVE: &str = "cloud_native_fullstack";

/// Deployment type of application-monitoring injections
pub const DEPLOYMENT_TYPE_APP_MONITORING: &str = "application_monitoring";

/// Field path of the pod name
pub const FIELD_PATH_POD_NAME: &str = "metadata.name";

/// Field path of the pod uid
pub const FIELD_PATH_POD_UID: &str = "metadata.uid";

/// Field path of the namespace
pub const FIELD_PATH_NAMESPACE: &str = "metadata.namespace";

/// Field path of the node name
pub const FIELD_PATH_NODE_NAME: &str = "spec.nodeName";

// ============================================================================
// Pod Injection: v1 (init-container installer)
// ============================================================================

/// Volume holding the OneAgent binaries
pub const ONEAGENT_BIN_VOLUME_NAME: &str = "oneagent-bin";

/// Volume shared between init and user containers
pub const ONEAGENT_SHARE_VOLUME_NAME: &str = "oneagent-share";

/// Volume with the init secret
pub const INJECTION_CONFIG_VOLUME_NAME: &str = "injection-config";

/// Name of the per-namespace init secret
pub const AGENT_INIT_SECRET_NAME: &str = "dynatrace-dynakube-config";

/// Init-secret key holding the JSON configuration
pub const AGENT_INIT_SECRET_CONFIG_FIELD: &str = "config";

/// Init-secret key holding the proxy
pub const AGENT_INIT_SECRET_PROXY_FIELD: &str = "proxy";

/// Init-secret key holding the trusted CAs
pub const AGENT_INIT_SECRET_TRUSTED_CAS_FIELD: &str = "trustedCAs";

/// Init-secret key holding the ActiveGate TLS certificate
pub const AGENT_INIT_SECRET_ACTIVEGATE_CAS_FIELD: &str = "activegate-tls.crt";

/// Mount path of the init secret in the init container
pub const INJECTION_CONFIG_MOUNT_PATH: &str = "/mnt/config";

/// Mount path of the binaries in the init container
pub const ONEAGENT_BIN_MOUNT_PATH: &str = "/mnt/bin";

/// Mount path of the share volume in the init container
pub const ONEAGENT_SHARE_MOUNT_PATH: &str = "/mnt/share";

/// Default install path of the agent inside user containers
pub const DEFAULT_INSTALL_PATH: &str = "/opt/dynatrace/oneagent-paas";

/// Flavor passed to the installer
pub const INSTALLER_FLAVOR: &str = "multidistro";

/// Installer mode when binaries come from the CSI driver
pub const INSTALLER_MODE_PROVISIONED: &str = "provisioned";

/// Installer mode when the init container downloads the binaries
pub const INSTALLER_MODE_INSTALLER: &str = "installer";

/// Path of the preload file inside user containers
pub const LD_PRELOAD_PATH: &str = "/etc/ld.so.preload";

/// Sub path of the preload file in the share volume
pub const LD_PRELOAD_SUB_PATH: &str = "ld.so.preload";

/// Path of the container configuration inside user containers
pub const CONTAINER_CONF_PATH: &str = "/var/lib/dynatrace/oneagent/agent/config/container.conf";

/// Relative path of the agent process library
pub const LIB_AGENT_PROC_PATH: &str = "agent/lib64/liboneagentproc.so";

/// Path of the curl options file inside user containers
pub const CURL_OPTIONS_PATH: &str = "/var/lib/dynatrace/oneagent/agent/customkeys/curl_options.conf";

/// Sub path of the curl options file in the share volume
pub const CURL_OPTIONS_SUB_PATH: &str = "curl_options.conf";

/// Path of the custom certificate bundle inside user containers
pub const CUSTOM_CERTS_PATH: &str = "/var/lib/dynatrace/oneagent/agent/customkeys/custom.pem";

/// Sub path of the custom certificate bundle in the share volume
pub const CUSTOM_CERTS_SUB_PATH: &str = "custom.pem";

/// Tenant placeholder of nodes without a host agent
pub const AGENT_NO_HOST_TENANT: &str = "-";

// ============================================================================
// Pod Injection: v2 (bootstrapper)
// ============================================================================

/// Config volume shared between init and user containers
pub const BOOTSTRAPPER_CONFIG_VOLUME_NAME: &str = "dynatrace-config";

/// Projected input volume with the bootstrapper secrets
pub const BOOTSTRAPPER_INPUT_VOLUME_NAME: &str = "dynatrace-input";

/// Replicated bootstrapper config secret in the pod namespace
pub const BOOTSTRAPPER_CONFIG_SECRET_NAME: &str = "dynatrace-bootstrapper-config";

/// Replicated bootstrapper certs secret in the pod namespace
pub const BOOTSTRAPPER_CERTS_SECRET_NAME: &str = "dynatrace-bootstrapper-certs";

/// Root of the agent inside the code-modules image
pub const BOOTSTRAPPER_SOURCE_PATH: &str = "/opt/dynatrace/oneagent";

/// Target of the agent binaries in the init container
pub const BOOTSTRAPPER_TARGET_PATH: &str = "/mnt/bin";

/// Config directory of the init container
pub const BOOTSTRAPPER_CONFIG_PATH: &str = "/mnt/config";

/// Input directory of the init container
pub const BOOTSTRAPPER_INPUT_PATH: &str = "/mnt/input";

/// Sub path of the binaries inside the config volume
pub const BOOTSTRAPPER_BIN_SUB_PATH: &str = "bin";

/// Mount path of the agent inside user containers
pub const BOOTSTRAPPER_USER_MOUNT_PATH: &str = "/opt/dynatrace/oneagent";

/// Mount path of the per-container config inside user containers
pub const BOOTSTRAPPER_USER_CONFIG_PATH: &str = "/var/lib/dynatrace";

/// Bootstrapper flag: agent install root inside the image
pub const BOOTSTRAPPER_ARG_SOURCE: &str = "--source";

/// Bootstrapper flag: where the agent is copied to
pub const BOOTSTRAPPER_ARG_TARGET: &str = "--target";

/// Bootstrapper flag: per-container configuration output
pub const BOOTSTRAPPER_ARG_CONFIG_DIRECTORY: &str = "--config-directory";

/// Bootstrapper flag: mounted input secrets
pub const BOOTSTRAPPER_ARG_INPUT_DIRECTORY: &str = "--input-directory";

/// Bootstrapper flag: technologies to keep
pub const BOOTSTRAPPER_ARG_TECHNOLOGY: &str = "--technology";

/// Bootstrapper flag: exit successfully on errors
pub const BOOTSTRAPPER_ARG_SUPPRESS_ERRORS: &str = "--suppress-errors";

/// Bootstrapper flag: one pod attribute (`key=value`)
pub const BOOTSTRAPPER_ARG_ATTRIBUTE: &str = "--attribute";

/// Bootstrapper flag: attributes of one container (JSON)
pub const BOOTSTRAPPER_ARG_CONTAINER_ATTRIBUTE: &str = "--attribute-container";

// ============================================================================
// Webhook Server
// ============================================================================

/// Default bind address of the admission server
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8443";

/// Default bind address of the metrics server
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:8383";

/// Default directory of the serving certificate
pub const DEFAULT_CERT_DIR: &str = "/tmp/webhook/certs";

/// Default certificate file name
pub const DEFAULT_CERT_FILE: &str = "tls.crt";

/// Default key file name
pub const DEFAULT_KEY_FILE: &str = "tls.key";

/// Component name reported on emitted events
pub const EVENT_REPORTING_COMPONENT: &str = "dynatrace-webhook";

/// Name of the webhook's own container, used to resolve its image
pub const WEBHOOK_CONTAINER_NAME: &str = "webhook";

/// Namespace whose UID identifies the cluster
pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";
