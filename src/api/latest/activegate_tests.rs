// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `activegate.rs`

#[cfg(test)]
mod tests {
    use crate::api::latest::activegate::*;
    use k8s_openapi::api::core::v1::ResourceRequirements;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    fn spec_with(capabilities: &[&str]) -> ActiveGateSpec {
        ActiveGateSpec {
            capabilities: capabilities.iter().map(ToString::to_string).collect(),
            ..ActiveGateSpec::default()
        }
    }

    #[test]
    fn test_capability_names() {
        let kubemon = Capability::from_display_name("kubernetes-monitoring").unwrap();
        assert_eq!(kubemon, Capability::KubernetesMonitoring);
        assert_eq!(kubemon.short_name(), "kubemon");
        assert_eq!(kubemon.argument_name(), "kubernetes_monitoring");
        assert_eq!(Capability::Routing.argument_name(), "MSGrouter");
        assert_eq!(Capability::DynatraceApi.argument_name(), "restInterface");
        assert_eq!(Capability::MetricsIngest.to_string(), "metrics-ingest");
        assert!(Capability::from_display_name("data-collector").is_none());
    }

    #[test]
    fn test_enabled_with_capabilities() {
        let spec = spec_with(&["routing", "unknown"]);
        let ag = ActiveGate::new(Some(&spec), None, "dynakube", String::new(), false);
        assert!(ag.is_enabled());
        assert!(ag.is_routing_enabled());
        assert!(!ag.is_kubernetes_monitoring_enabled());
        assert_eq!(ag.capabilities(), vec![Capability::Routing]);

        let empty = ActiveGateSpec::default();
        let ag = ActiveGate::new(Some(&empty), None, "dynakube", String::new(), false);
        assert!(!ag.is_enabled());
    }

    #[test]
    fn test_default_image() {
        let spec = spec_with(&["routing"]);
        let ag = ActiveGate::new(Some(&spec), None, "dynakube", "test-endpoint".to_string(), false);
        assert_eq!(
            ag.default_image("1.239.14.20220325-164521"),
            "test-endpoint/linux/activegate:1.239.14-raw"
        );
        assert_eq!(
            ag.default_image("1.239.14-raw"),
            "test-endpoint/linux/activegate:1.239.14-raw"
        );
    }

    #[test]
    fn test_replicas_default_to_one() {
        let mut spec = spec_with(&["routing"]);
        assert_eq!(
            ActiveGate::new(Some(&spec), None, "dk", String::new(), false).replicas(),
            1
        );
        spec.replicas = Some(3);
        assert_eq!(
            ActiveGate::new(Some(&spec), None, "dk", String::new(), false).replicas(),
            3
        );
    }

    #[test]
    fn test_memory_limit_detection() {
        let mut spec = spec_with(&["routing"]);
        assert!(!ActiveGate::new(Some(&spec), None, "dk", String::new(), false).has_memory_limit());

        spec.resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([(
                "memory".to_string(),
                Quantity("1Gi".to_string()),
            )])),
            ..ResourceRequirements::default()
        });
        assert!(ActiveGate::new(Some(&spec), None, "dk", String::new(), false).has_memory_limit());
    }
}
