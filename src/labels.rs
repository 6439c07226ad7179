// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used by the API and the webhooks.
//!
//! This module defines standard Kubernetes labels and the Dynatrace-specific
//! labels/annotations read from or written to pods, namespaces and DynaKubes.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the version of the application
pub const K8S_VERSION: &str = "app.kubernetes.io/version";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/name` on objects created by the webhook
pub const APP_NAME_OPERATOR: &str = "dynatrace-operator";

/// Value for `app.kubernetes.io/managed-by` on objects created by the webhook
pub const MANAGED_BY_WEBHOOK: &str = "dynatrace-webhook";

/// Component value for injection secrets
pub const COMPONENT_INJECTION: &str = "injection";

// ============================================================================
// Namespace Labels and Annotations
// ============================================================================

/// Namespace label naming the DynaKube responsible for injection
pub const INJECTION_INSTANCE_LABEL: &str = "dynakube.internal.dynatrace.com/instance";

/// Namespace annotation overriding the field path of `DT_RELEASE_VERSION`
pub const MAPPING_RELEASE_VERSION: &str = "mapping.release.dynatrace.com/version";

/// Namespace annotation overriding the field path of `DT_RELEASE_PRODUCT`
pub const MAPPING_RELEASE_PRODUCT: &str = "mapping.release.dynatrace.com/product";

/// Namespace annotation overriding the field path of `DT_RELEASE_STAGE`
pub const MAPPING_RELEASE_STAGE: &str = "mapping.release.dynatrace.com/stage";

/// Namespace annotation overriding the field path of `DT_RELEASE_BUILD_VERSION`
pub const MAPPING_RELEASE_BUILD_VERSION: &str = "mapping.release.dynatrace.com/build-version";

// ============================================================================
// Pod Annotations
// ============================================================================

/// Pod opt-in/opt-out of OneAgent injection
pub const ANNOTATION_ONEAGENT_INJECT: &str = "oneagent.dynatrace.com/inject";

/// Pod-level opt-out of any Dynatrace injection
pub const ANNOTATION_DYNATRACE_INJECT: &str = "dynatrace.com/inject";

/// Pod marker: `"true"` when injected, `"false"` when skipped on purpose
pub const ANNOTATION_ONEAGENT_INJECTED: &str = "oneagent.dynatrace.com/injected";

/// Pod marker: reason list accompanying `injected=false`
pub const ANNOTATION_ONEAGENT_REASON: &str = "oneagent.dynatrace.com/reason";

/// Pod marker: the webhook already handled this pod
pub const ANNOTATION_DYNAKUBE_INJECTED: &str = "dynakube.dynatrace.com/injected";

/// Technologies to install (comma separated)
pub const ANNOTATION_TECHNOLOGIES: &str = "oneagent.dynatrace.com/technologies";

/// Install path of the agent inside user containers
pub const ANNOTATION_INSTALL_PATH: &str = "oneagent.dynatrace.com/install-path";

/// Installer URL override
pub const ANNOTATION_INSTALLER_URL: &str = "oneagent.dynatrace.com/installer-url";

/// Pod-level failure policy override
pub const ANNOTATION_FAILURE_POLICY: &str = "oneagent.dynatrace.com/failure-policy";

/// Prefix of the per-container opt-out annotation (`<prefix><container-name>`)
pub const ANNOTATION_CONTAINER_INJECTION_PREFIX: &str = "container.inject.dynatrace.com/";

/// Pod-level choice of the volume that carries the agent binaries
pub const ANNOTATION_VOLUME_TYPE: &str = "oneagent.dynatrace.com/volume-type";

/// `volume-type` value: binaries provided by the CSI driver
pub const VOLUME_TYPE_CSI: &str = "csi";

/// `volume-type` value: binaries downloaded into an empty-dir
pub const VOLUME_TYPE_EPHEMERAL: &str = "ephemeral";

// ============================================================================
// Injection Skip Reasons
// ============================================================================

/// The DynaKube status has no tenant UUID yet
pub const REASON_EMPTY_TENANT_UUID: &str = "EmptyTenantUUID";

/// The DynaKube status has no communication hosts yet
pub const REASON_EMPTY_CONNECTION_INFO: &str = "EmptyConnectionInfo";

/// Neither a code-modules version nor a custom image is known
pub const REASON_UNKNOWN_CODE_MODULE: &str = "UnknownCodeModule";

/// The bootstrapper config secret is not available
pub const REASON_NO_BOOTSTRAPPER_CONFIG: &str = "NoBootstrapperConfig";

/// No code-modules image is configured for the bootstrapper
pub const REASON_NO_CODE_MODULES_IMAGE: &str = "NoCodeModulesImage";

// ============================================================================
// Internal DynaKube Annotations (conversion round-trips)
// ============================================================================

/// Extensions spec carried by versions without a typed field
pub const ANNOTATION_EXTENSIONS: &str = "internal.operator.dynatrace.com/extensions";

/// OpenTelemetry collector template carried by versions without a typed field
pub const ANNOTATION_OTEL_COLLECTOR: &str = "internal.operator.dynatrace.com/open-telemetry-collector";

/// Extension execution controller template carried by versions without a typed field
pub const ANNOTATION_EXTENSION_EXECUTION_CONTROLLER: &str =
    "internal.operator.dynatrace.com/extension-execution-controller";

/// `useCSIDriver` of application monitoring, which the hub no longer models
pub const ANNOTATION_USE_CSI_DRIVER: &str = "internal.operator.dynatrace.com/use-csi-driver";

/// KSPM mapped host paths carried through versions without the field
pub const ANNOTATION_KSPM_MAPPED_HOST_PATHS: &str = "internal.operator.dynatrace.com/kspm-mapped-host-paths";

// ============================================================================
// Event Reasons
// ============================================================================

/// Event reason of a successful injection
pub const EVENT_REASON_INJECT: &str = "Inject";

/// Event reason of a reinvocation that updated new containers
pub const EVENT_REASON_UPDATE_POD: &str = "UpdatePod";

/// Event reason when the namespace names a DynaKube that does not exist
pub const EVENT_REASON_MISSING_DYNAKUBE: &str = "MissingDynakube";

/// Event reason when the legacy CRD is installed next to the webhook
pub const EVENT_REASON_INCOMPATIBLE_CRD: &str = "IncompatibleCRDPresent";
