// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `v1beta1` conversion

#[cfg(test)]
mod tests {
    use crate::api::conversion::HubConversion;
    use crate::api::feature_flags::{
        API_REQUEST_THRESHOLD, DISABLE_METADATA_ENRICHMENT, METADATA_ENRICHMENT,
        ONEAGENT_SECCOMP_PROFILE,
    };
    use crate::api::v1beta1::*;
    use crate::errors::ConversionError;
    use crate::labels::ANNOTATION_USE_CSI_DRIVER;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use std::collections::BTreeMap;

    fn selector() -> LabelSelector {
        LabelSelector {
            match_labels: Some(BTreeMap::from([(
                "inject".to_string(),
                "true".to_string(),
            )])),
            ..LabelSelector::default()
        }
    }

    fn cloud_native_dynakube() -> DynaKube {
        let mut dk = DynaKube::new(
            "dynakube",
            DynaKubeSpec {
                api_url: "https://demo.live.dynatrace.com/api".to_string(),
                namespace_selector: selector(),
                one_agent: OneAgentSpec {
                    cloud_native_full_stack: Some(CloudNativeFullStackSpec {
                        host: HostInjectSpec {
                            args: vec!["--set-host-group=prod".to_string()],
                            auto_update: Some(false),
                            ..HostInjectSpec::default()
                        },
                        app: AppInjectionSpec {
                            code_modules_image: "registry/codemodules:1.2.3".to_string(),
                            ..AppInjectionSpec::default()
                        },
                    }),
                    ..OneAgentSpec::default()
                },
                active_gate: ActiveGateSpec {
                    capabilities: vec!["routing".to_string()],
                    ..ActiveGateSpec::default()
                },
                ..DynaKubeSpec::default()
            },
        );
        dk.metadata.namespace = Some("dynatrace".to_string());
        dk
    }

    fn annotate(dk: &mut DynaKube, key: &str, value: &str) {
        dk.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
    }

    #[test]
    fn test_round_trip_preserves_spec() {
        let dk = cloud_native_dynakube();
        let back = DynaKube::from_hub(&dk.to_hub().unwrap()).unwrap();
        assert_eq!(back, dk);
    }

    #[test]
    fn test_round_trip_preserves_moved_flags() {
        let mut dk = cloud_native_dynakube();
        annotate(&mut dk, API_REQUEST_THRESHOLD, "20");
        annotate(&mut dk, ONEAGENT_SECCOMP_PROFILE, "restricted");
        annotate(&mut dk, METADATA_ENRICHMENT, "false");

        let hub = dk.to_hub().unwrap();
        assert!(hub.metadata.annotations.is_none());

        let back = DynaKube::from_hub(&hub).unwrap();
        assert_eq!(back, dk);
    }

    #[test]
    fn test_namespace_selector_spread_over_sections() {
        let hub = cloud_native_dynakube().to_hub().unwrap();
        let cloud_native = hub.spec.one_agent.cloud_native_full_stack.as_ref().unwrap();
        assert_eq!(cloud_native.app.namespace_selector, selector());
        assert_eq!(hub.spec.metadata_enrichment.namespace_selector, selector());
    }

    #[test]
    fn test_host_group_read_from_args() {
        let hub = cloud_native_dynakube().to_hub().unwrap();
        assert_eq!(hub.spec.one_agent.host_group, "prod");
    }

    #[test]
    fn test_host_group_written_back_as_arg() {
        let mut hub = cloud_native_dynakube().to_hub().unwrap();
        hub.spec.one_agent.host_group = "staging".to_string();
        if let Some(cloud_native) = hub.spec.one_agent.cloud_native_full_stack.as_mut() {
            cloud_native.host.args.clear();
        }

        let back = DynaKube::from_hub(&hub).unwrap();
        let host = &back.spec.one_agent.cloud_native_full_stack.unwrap().host;
        assert_eq!(host.args, vec!["--set-host-group=staging".to_string()]);
    }

    // ========================================================================
    // Moved feature flags
    // ========================================================================

    #[test]
    fn test_threshold_flag_becomes_field() {
        let mut dk = cloud_native_dynakube();
        annotate(&mut dk, API_REQUEST_THRESHOLD, "45");

        let hub = dk.to_hub().unwrap();
        assert_eq!(hub.spec.dynatrace_api_request_threshold, Some(45));
    }

    #[test]
    fn test_threshold_flag_invalid_fails() {
        let mut dk = cloud_native_dynakube();
        annotate(&mut dk, API_REQUEST_THRESHOLD, "soon");

        let err = dk.to_hub().unwrap_err();
        assert!(matches!(err, ConversionError::InvalidMovedFlag { .. }));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_threshold_flag_clamped() {
        let mut dk = cloud_native_dynakube();
        annotate(&mut dk, API_REQUEST_THRESHOLD, "9999999");

        let hub = dk.to_hub().unwrap();
        assert_eq!(hub.spec.dynatrace_api_request_threshold, Some(u16::MAX));
    }

    #[test]
    fn test_seccomp_flag_moves_to_host_spec() {
        let mut dk = cloud_native_dynakube();
        annotate(&mut dk, ONEAGENT_SECCOMP_PROFILE, "restricted");

        let hub = dk.to_hub().unwrap();
        let cloud_native = hub.spec.one_agent.cloud_native_full_stack.unwrap();
        assert_eq!(cloud_native.host.sec_comp_profile, "restricted");
    }

    #[test]
    fn test_enrichment_enabled_by_default_for_app_injection() {
        let hub = cloud_native_dynakube().to_hub().unwrap();
        assert_eq!(hub.spec.metadata_enrichment.enabled, Some(true));
    }

    #[test]
    fn test_enrichment_disabled_without_app_injection() {
        let mut dk = cloud_native_dynakube();
        dk.spec.one_agent = OneAgentSpec {
            host_monitoring: Some(HostInjectSpec::default()),
            ..OneAgentSpec::default()
        };

        let hub = dk.to_hub().unwrap();
        assert_eq!(hub.spec.metadata_enrichment.enabled, Some(false));
    }

    #[test]
    fn test_enrichment_deprecated_inverse_flag() {
        let mut dk = cloud_native_dynakube();
        annotate(&mut dk, DISABLE_METADATA_ENRICHMENT, "true");

        let hub = dk.to_hub().unwrap();
        assert_eq!(hub.spec.metadata_enrichment.enabled, Some(false));
        assert!(hub.metadata.annotations.is_none());
    }

    // ========================================================================
    // useCSIDriver
    // ========================================================================

    #[test]
    fn test_use_csi_driver_round_trip() {
        let mut dk = cloud_native_dynakube();
        dk.spec.one_agent = OneAgentSpec {
            application_monitoring: Some(ApplicationMonitoringSpec {
                use_csi_driver: Some(false),
                version: "1.2.3".to_string(),
                ..ApplicationMonitoringSpec::default()
            }),
            ..OneAgentSpec::default()
        };

        let hub = dk.to_hub().unwrap();
        assert_eq!(
            hub.metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(ANNOTATION_USE_CSI_DRIVER))
                .map(String::as_str),
            Some("false")
        );
        assert_eq!(
            hub.spec
                .one_agent
                .application_monitoring
                .as_ref()
                .unwrap()
                .app
                .namespace_selector,
            selector()
        );

        let back = DynaKube::from_hub(&hub).unwrap();
        assert_eq!(back, dk);
    }
}
