// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `v1beta4` conversion

#[cfg(test)]
mod tests {
    use crate::api::conversion::HubConversion;
    use crate::api::latest;
    use crate::api::v1beta4::*;
    use crate::labels::ANNOTATION_KSPM_MAPPED_HOST_PATHS;
    use std::collections::BTreeMap;

    fn v1beta4_dynakube() -> DynaKube {
        let mut dk = DynaKube::new(
            "dynakube",
            DynaKubeSpec {
                api_url: "https://demo.live.dynatrace.com/api".to_string(),
                tokens: "custom-tokens".to_string(),
                network_zone: "zone-a".to_string(),
                dynatrace_api_request_threshold: Some(42),
                one_agent: OneAgentSpec {
                    cloud_native_full_stack: Some(CloudNativeFullStackSpec {
                        host: HostInjectSpec {
                            version: "1.300.0".to_string(),
                            sec_comp_profile: "restricted".to_string(),
                            args: vec!["--set-proxy=foo".to_string()],
                            auto_update: Some(false),
                            ..HostInjectSpec::default()
                        },
                        app: AppInjectionSpec {
                            code_modules_image: "registry/codemodules:1.300".to_string(),
                            ..AppInjectionSpec::default()
                        },
                    }),
                    host_group: "group-a".to_string(),
                    ..OneAgentSpec::default()
                },
                active_gate: ActiveGateSpec {
                    capabilities: vec!["routing".to_string(), "dynatrace-api".to_string()],
                    replicas: Some(3),
                    group: "ag-group".to_string(),
                    ..ActiveGateSpec::default()
                },
                ..DynaKubeSpec::default()
            },
        );
        dk.metadata.namespace = Some("dynatrace".to_string());
        dk.metadata.labels = Some(BTreeMap::from([("team".to_string(), "obs".to_string())]));
        dk.metadata.finalizers = Some(vec!["dynatrace.com/finalizer".to_string()]);
        dk
    }

    #[test]
    fn test_round_trip_preserves_spec() {
        let dk = v1beta4_dynakube();
        let hub = dk.to_hub().unwrap();
        let back = DynaKube::from_hub(&hub).unwrap();
        assert_eq!(back, dk);
    }

    #[test]
    fn test_to_hub_copies_fields() {
        let hub = v1beta4_dynakube().to_hub().unwrap();
        assert_eq!(hub.spec.tokens, "custom-tokens");
        assert_eq!(hub.spec.network_zone, "zone-a");
        assert_eq!(hub.spec.dynatrace_api_request_threshold, Some(42));
        assert_eq!(hub.spec.one_agent.host_group, "group-a");
        assert_eq!(hub.spec.active_gate.replicas, Some(3));
        assert_eq!(hub.spec.active_gate.capabilities.len(), 2);

        let cloud_native = hub.spec.one_agent.cloud_native_full_stack.unwrap();
        assert_eq!(cloud_native.host.sec_comp_profile, "restricted");
        assert_eq!(cloud_native.host.auto_update, Some(false));
        assert!(cloud_native.host.image_pull_policy.is_empty());
    }

    #[test]
    fn test_metadata_preserved() {
        let hub = v1beta4_dynakube().to_hub().unwrap();
        assert_eq!(hub.metadata.name.as_deref(), Some("dynakube"));
        assert_eq!(hub.metadata.namespace.as_deref(), Some("dynatrace"));
        assert_eq!(
            hub.metadata.finalizers,
            Some(vec!["dynatrace.com/finalizer".to_string()])
        );
        assert!(hub.metadata.annotations.is_none());
    }

    #[test]
    fn test_every_configured_mode_is_converted() {
        let mut dk = v1beta4_dynakube();
        dk.spec.one_agent.host_monitoring = Some(HostInjectSpec::default());

        let hub = dk.to_hub().unwrap();
        assert!(hub.spec.one_agent.cloud_native_full_stack.is_some());
        assert!(hub.spec.one_agent.host_monitoring.is_some());
    }

    #[test]
    fn test_persistent_volume_claim_becomes_volume_claim_template() {
        let mut dk = v1beta4_dynakube();
        dk.spec.active_gate.persistent_volume_claim =
            Some(k8s_openapi::api::core::v1::PersistentVolumeClaimSpec::default());

        let hub = dk.to_hub().unwrap();
        assert!(hub.spec.active_gate.volume_claim_template.is_some());

        let back = DynaKube::from_hub(&hub).unwrap();
        assert!(back.spec.active_gate.persistent_volume_claim.is_some());
    }

    // ========================================================================
    // KSPM host paths
    // ========================================================================

    #[test]
    fn test_kspm_defaults_to_root_path() {
        let mut dk = v1beta4_dynakube();
        dk.spec.kspm = Some(KspmSpec {});

        let hub = dk.to_hub().unwrap();
        assert_eq!(
            hub.spec.kspm.unwrap().mapped_host_paths,
            vec!["/".to_string()]
        );
    }

    #[test]
    fn test_kspm_default_paths_leave_no_annotation() {
        let mut dk = v1beta4_dynakube();
        dk.spec.kspm = Some(KspmSpec {});

        let hub = dk.to_hub().unwrap();
        let back = DynaKube::from_hub(&hub).unwrap();
        assert!(back.metadata.annotations.is_none());
        assert_eq!(back, dk);
    }

    #[test]
    fn test_kspm_custom_paths_survive_round_trip_through_annotation() {
        let mut hub = v1beta4_dynakube().to_hub().unwrap();
        hub.spec.kspm = Some(latest::kspm::KspmSpec {
            mapped_host_paths: vec!["/etc".to_string(), "/var/lib".to_string()],
        });

        let v1beta4 = DynaKube::from_hub(&hub).unwrap();
        let stored = v1beta4
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_KSPM_MAPPED_HOST_PATHS))
            .cloned()
            .unwrap();
        assert_eq!(stored, r#"["/etc","/var/lib"]"#);

        let again = v1beta4.to_hub().unwrap();
        assert_eq!(again.spec.kspm, hub.spec.kspm);
        assert!(again.metadata.annotations.is_none());
    }

    #[test]
    fn test_kspm_malformed_annotation_fails() {
        let mut dk = v1beta4_dynakube();
        dk.spec.kspm = Some(KspmSpec {});
        dk.metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_KSPM_MAPPED_HOST_PATHS.to_string(),
            "not-json".to_string(),
        )]));

        assert!(dk.to_hub().is_err());
    }

    #[test]
    fn test_hub_only_fields_dropped() {
        let mut hub = v1beta4_dynakube().to_hub().unwrap();
        if let Some(cloud_native) = hub.spec.one_agent.cloud_native_full_stack.as_mut() {
            cloud_native.host.image_pull_policy = "Always".to_string();
            cloud_native.app.code_modules_image_pull_policy = "Always".to_string();
        }

        let back = DynaKube::from_hub(&hub).unwrap();
        assert_eq!(back, v1beta4_dynakube());
    }
}
