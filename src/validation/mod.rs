// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admission validation of `DynaKube` resources.
//!
//! Validation runs in two phases:
//!
//! 1. **Prefetch** - the cluster facts the rules depend on (sibling
//!    `DynaKube`s, namespaces, the CSI driver daemonset, the istio API group)
//!    are read once into a [`ValidationContext`]. Only the facts the object
//!    actually needs are fetched.
//! 2. **Rules** - two ordered lists of pure functions, [`ERROR_RULES`] and
//!    [`WARNING_RULES`], run against the context. Every rule runs; reasons are
//!    collected in rule order and never short-circuit.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dynakube::cluster::fake::FakeCluster;
//! use dynakube::config::Modules;
//! use dynakube::validation::Validator;
//! # async fn run(dk: dynakube::api::latest::DynaKube) {
//! let validator = Validator::new(Arc::new(FakeCluster::new()), Modules::default());
//! let outcome = validator.validate(&dk).await.unwrap();
//! if let Some(message) = outcome.denial_message() {
//!     println!("{message}");
//! }
//! # }
//! ```

pub mod activegate;
pub mod dynakube;
pub mod modules;
pub mod oneagent;

use std::sync::Arc;

use k8s_openapi::api::core::v1::Namespace;
use tracing::{debug, info, warn};

use crate::api::latest::DynaKube;
use crate::cluster::ClusterClient;
use crate::config::Modules;
use crate::constants::{CSI_DAEMONSET_NAME, ISTIO_GROUP_VERSION};
use crate::errors::ClusterError;

/// Prefix of every denial message.
pub const DENIAL_PREFIX: &str = "DynaKube's specification is invalid: ";

/// A validation rule: `Some(reason)` fails, `None` passes.
pub type Rule = fn(&ValidationContext<'_>) -> Option<String>;

/// Rules that deny admission, in evaluation order.
pub const ERROR_RULES: &[Rule] = &[
    dynakube::no_api_url,
    dynakube::invalid_api_url,
    dynakube::third_gen_api_url,
    dynakube::name_violates_dns_1035,
    dynakube::name_too_long,
    oneagent::conflicting_modes,
    oneagent::missing_csi_daemonset,
    oneagent::readonly_csi_volume_without_csi,
    oneagent::image_field_set_without_csi_flag,
    oneagent::missing_code_modules_image,
    oneagent::conflicting_volume_storage_settings,
    oneagent::duplicate_arguments,
    oneagent::forbidden_host_id_source_argument,
    oneagent::invalid_version,
    oneagent::conflicting_node_selector,
    oneagent::conflicting_namespace_selector,
    oneagent::namespace_selector_violates_label_spec,
    activegate::invalid_capabilities,
    activegate::duplicate_capabilities,
    activegate::invalid_proxy_url,
    dynakube::public_image_for_tenant_registry,
    dynakube::missing_istio_resources,
    modules::kspm_too_many_activegate_replicas,
    modules::kspm_missing_kubernetes_monitoring,
    modules::kspm_missing_image,
    modules::kspm_root_host_path_mixed,
    modules::kspm_relative_host_path,
    modules::extensions_missing_executor_image,
    modules::extensions_conflicting_volume_config,
    modules::telemetry_ingest_invalid_protocol,
    modules::telemetry_ingest_duplicate_protocol,
];

/// Rules that only warn, in evaluation order.
pub const WARNING_RULES: &[Rule] = &[
    activegate::missing_memory_limit,
    oneagent::installer_env_vars,
    oneagent::host_group_as_argument,
    oneagent::deprecated_auto_update,
    modules::kspm_no_mapped_host_paths,
];

/// Cluster facts a single validation works on.
///
/// Built by [`Validator::validate`]; tests build it directly.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    /// The object under validation
    pub dynakube: &'a DynaKube,
    pub modules: Modules,
    /// Other `DynaKube`s of the same namespace (never includes `dynakube` itself)
    pub siblings: Vec<DynaKube>,
    /// All namespaces, fetched only when the object injects into applications
    pub namespaces: Vec<Namespace>,
    /// Whether the CSI driver daemonset was found next to the object
    pub csi_daemonset_present: bool,
    /// Whether the cluster serves the istio networking API
    pub istio_available: bool,
}

impl<'a> ValidationContext<'a> {
    /// A context without cluster facts: no siblings, no namespaces, CSI
    /// daemonset and istio present.
    #[must_use]
    pub fn new(dynakube: &'a DynaKube, modules: Modules) -> Self {
        Self {
            dynakube,
            modules,
            siblings: Vec::new(),
            namespaces: Vec::new(),
            csi_daemonset_present: true,
            istio_available: true,
        }
    }
}

/// Errors and warnings collected for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.errors.is_empty()
    }

    /// The denial message, or `None` if admission is allowed.
    #[must_use]
    pub fn denial_message(&self) -> Option<String> {
        if self.is_allowed() {
            return None;
        }
        Some(format!("{DENIAL_PREFIX}{}", self.errors.join("\n")))
    }
}

/// Runs both rule lists against a context.
#[must_use]
pub fn run_rules(ctx: &ValidationContext<'_>) -> ValidationOutcome {
    let errors = ERROR_RULES.iter().filter_map(|rule| rule(ctx)).collect();
    let mut warnings: Vec<String> = WARNING_RULES.iter().filter_map(|rule| rule(ctx)).collect();
    warnings.extend(dynakube::deprecated_feature_flags(ctx));
    ValidationOutcome { errors, warnings }
}

/// Validates `DynaKube` objects against the cluster.
#[derive(Clone)]
pub struct Validator {
    client: Arc<dyn ClusterClient>,
    modules: Modules,
}

impl Validator {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, modules: Modules) -> Self {
        Self { client, modules }
    }

    /// Validates one object.
    ///
    /// # Errors
    ///
    /// Returns transient API errors (timeouts, throttling, server errors) so
    /// the caller can deny with a retryable message. Other lookup failures
    /// are logged and the dependent rules pass.
    pub async fn validate(&self, dk: &DynaKube) -> Result<ValidationOutcome, ClusterError> {
        let ctx = self.prefetch(dk).await?;
        let outcome = run_rules(&ctx);

        if outcome.is_allowed() {
            info!(
                name = %dk.name(),
                namespace = %dk.namespace(),
                warnings = outcome.warnings.len(),
                "DynaKube is valid"
            );
        } else {
            info!(
                name = %dk.name(),
                namespace = %dk.namespace(),
                errors = outcome.errors.len(),
                "DynaKube is invalid"
            );
        }
        Ok(outcome)
    }

    async fn prefetch<'a>(&self, dk: &'a DynaKube) -> Result<ValidationContext<'a>, ClusterError> {
        let mut ctx = ValidationContext::new(dk, self.modules);
        let one_agent = dk.one_agent();

        let needs_siblings = one_agent.is_daemonset_required()
            || one_agent.is_app_injection_needed()
            || dk.log_monitoring().is_standalone();
        if needs_siblings {
            let siblings = tolerate(self.client.list_dynakubes(dk.namespace()).await, "list dynakubes")?;
            ctx.siblings = siblings
                .unwrap_or_default()
                .into_iter()
                .filter(|other| other.name() != dk.name())
                .collect();
        }

        if one_agent.is_app_injection_needed() {
            let namespaces = tolerate(self.client.list_namespaces().await, "list namespaces")?;
            ctx.namespaces = namespaces.unwrap_or_default();
        }

        if self.modules.csi_driver && one_agent.is_csi_required() {
            let present = tolerate(
                self.client
                    .daemonset_exists(dk.namespace(), CSI_DAEMONSET_NAME)
                    .await,
                "get CSI driver daemonset",
            )?;
            ctx.csi_daemonset_present = present.unwrap_or(true);
        }

        if dk.spec.enable_istio {
            let available = tolerate(
                self.client
                    .api_group_version_exists(ISTIO_GROUP_VERSION)
                    .await,
                "discover istio API group",
            )?;
            ctx.istio_available = available.unwrap_or(true);
        }

        debug!(
            name = %dk.name(),
            siblings = ctx.siblings.len(),
            namespaces = ctx.namespaces.len(),
            csi_daemonset_present = ctx.csi_daemonset_present,
            istio_available = ctx.istio_available,
            "Prefetched validation context"
        );
        Ok(ctx)
    }
}

/// Transient errors propagate; any other error is logged and yields `None`.
fn tolerate<T>(result: Result<T, ClusterError>, what: &str) -> Result<Option<T>, ClusterError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => Err(e),
        Err(e) => {
            warn!(error = %e, "Failed to {what} during validation, skipping dependent rules");
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
