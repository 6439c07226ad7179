// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the validation pipeline in `validation/mod.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::api::feature_flags::{ONEAGENT_IGNORE_PROXY, API_REQUEST_THRESHOLD};
    use crate::api::latest::oneagent::{CloudNativeFullStackSpec, HostInjectSpec};
    use crate::api::latest::{DynaKube, DynaKubeSpec};
    use crate::cluster::fake::{op, FakeCluster};
    use crate::config::Modules;
    use crate::constants::{CSI_DAEMONSET_NAME, ISTIO_GROUP_VERSION};
    use crate::validation::dynakube::{ERROR_NO_API_URL, ERROR_NO_DNS1035_LABEL, ERROR_NO_RESOURCES};
    use crate::validation::oneagent::{ERROR_CONFLICTING_ONEAGENT_MODE, ERROR_CSI_REQUIRED};
    use crate::validation::*;

    const API_URL: &str = "https://demo.live.dynatrace.com/api";

    fn dynakube(name: &str, api_url: &str) -> DynaKube {
        let mut dk = DynaKube::new(
            name,
            DynaKubeSpec {
                api_url: api_url.to_string(),
                ..DynaKubeSpec::default()
            },
        );
        dk.metadata.namespace = Some("dynatrace".to_string());
        dk
    }

    fn validator(cluster: FakeCluster) -> Validator {
        Validator::new(Arc::new(cluster), Modules::default())
    }

    // ========================================================================
    // Outcome
    // ========================================================================

    #[test]
    fn test_denial_message_joins_reasons_with_newlines() {
        let outcome = ValidationOutcome {
            errors: vec!["first".to_string(), "second".to_string()],
            warnings: Vec::new(),
        };
        assert!(!outcome.is_allowed());
        assert_eq!(
            outcome.denial_message().unwrap(),
            "DynaKube's specification is invalid: first\nsecond"
        );
    }

    #[test]
    fn test_allowed_outcome_has_no_denial_message() {
        let outcome = ValidationOutcome {
            errors: Vec::new(),
            warnings: vec!["careful".to_string()],
        };
        assert!(outcome.is_allowed());
        assert!(outcome.denial_message().is_none());
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    #[tokio::test]
    async fn test_valid_dynakube_is_allowed() {
        let outcome = validator(FakeCluster::new())
            .validate(&dynakube("dynakube", API_URL))
            .await
            .unwrap();
        assert!(outcome.is_allowed());
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_name_violating_dns_1035_is_denied() {
        let outcome = validator(FakeCluster::new())
            .validate(&dynakube("1dynakube", API_URL))
            .await
            .unwrap();
        assert_eq!(outcome.errors, vec![ERROR_NO_DNS1035_LABEL.to_string()]);
        assert!(outcome.denial_message().unwrap().starts_with(DENIAL_PREFIX));
    }

    #[tokio::test]
    async fn test_conflicting_modes_are_denied() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec::default());
        dk.spec.one_agent.host_monitoring = Some(HostInjectSpec::default());

        let cluster = FakeCluster::new();
        cluster.add_daemonset("dynatrace", CSI_DAEMONSET_NAME);
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert_eq!(outcome.errors, vec![ERROR_CONFLICTING_ONEAGENT_MODE.to_string()]);
    }

    #[tokio::test]
    async fn test_errors_accumulate_in_rule_order() {
        let mut dk = dynakube("1dynakube", "");
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec::default());
        dk.spec.one_agent.host_monitoring = Some(HostInjectSpec::default());

        let cluster = FakeCluster::new();
        cluster.add_daemonset("dynatrace", CSI_DAEMONSET_NAME);
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert_eq!(
            outcome.errors,
            vec![
                ERROR_NO_API_URL.to_string(),
                ERROR_NO_DNS1035_LABEL.to_string(),
                ERROR_CONFLICTING_ONEAGENT_MODE.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cloud_native_requires_csi_daemonset() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.cloud_native_full_stack = Some(CloudNativeFullStackSpec::default());

        let outcome = validator(FakeCluster::new()).validate(&dk).await.unwrap();
        assert_eq!(outcome.errors, vec![ERROR_CSI_REQUIRED.to_string()]);

        let cluster = FakeCluster::new();
        cluster.add_daemonset("dynatrace", CSI_DAEMONSET_NAME);
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_csi_daemonset_not_checked_without_csi_module() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.cloud_native_full_stack = Some(CloudNativeFullStackSpec::default());

        let outcome = Validator::new(Arc::new(FakeCluster::new()), Modules { csi_driver: false })
            .validate(&dk)
            .await
            .unwrap();
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_istio_requires_group_version() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.enable_istio = true;

        let outcome = validator(FakeCluster::new()).validate(&dk).await.unwrap();
        assert_eq!(outcome.errors, vec![ERROR_NO_RESOURCES.to_string()]);

        let cluster = FakeCluster::new();
        cluster.add_group_version(ISTIO_GROUP_VERSION);
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_node_selector_conflict_with_sibling() {
        let mut existing = dynakube("existing", API_URL);
        existing.spec.one_agent.host_monitoring = Some(HostInjectSpec::default());
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec::default());

        let cluster = FakeCluster::new();
        cluster.add_dynakube(existing);
        cluster.add_daemonset("dynatrace", CSI_DAEMONSET_NAME);
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].ends_with("Conflicting DynaKubes: existing"));
    }

    #[tokio::test]
    async fn test_update_of_same_dynakube_is_no_conflict() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec::default());

        let cluster = FakeCluster::new();
        cluster.add_dynakube(dk.clone());
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert!(outcome.is_allowed());
    }

    // ========================================================================
    // Cluster errors
    // ========================================================================

    #[tokio::test]
    async fn test_transient_list_error_is_returned() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec::default());

        let cluster = FakeCluster::new();
        cluster.fail(op::LIST_DYNAKUBES, 503, "ServiceUnavailable");
        let err = validator(cluster).validate(&dk).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_forbidden_list_error_passes_dependent_rules() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec::default());

        let cluster = FakeCluster::new();
        cluster.fail(op::LIST_DYNAKUBES, 403, "Forbidden");
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_forbidden_daemonset_lookup_assumes_csi_present() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.spec.one_agent.cloud_native_full_stack = Some(CloudNativeFullStackSpec::default());

        let cluster = FakeCluster::new();
        cluster.fail(op::DAEMONSET_EXISTS, 403, "Forbidden");
        let outcome = validator(cluster).validate(&dk).await.unwrap();
        assert!(outcome.is_allowed());
    }

    // ========================================================================
    // Warnings
    // ========================================================================

    #[test]
    fn test_deprecated_feature_flags_warn_once_each() {
        let mut dk = dynakube("dynakube", API_URL);
        dk.metadata.annotations = Some(BTreeMap::from([
            (ONEAGENT_IGNORE_PROXY.to_string(), "true".to_string()),
            (API_REQUEST_THRESHOLD.to_string(), "5".to_string()),
        ]));

        let outcome = run_rules(&ValidationContext::new(&dk, Modules::default()));
        assert!(outcome.is_allowed());
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[0].contains(ONEAGENT_IGNORE_PROXY));
        assert!(outcome.warnings[0].contains("will be removed"));
        assert!(outcome.warnings[1].contains(API_REQUEST_THRESHOLD));
        assert!(outcome.warnings[1].contains("field of the DynaKube"));
    }
}
