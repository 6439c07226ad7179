// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for version dispatch

#[cfg(test)]
mod tests {
    use crate::api::conversion::*;
    use crate::api::feature_flags::{MAX_CSI_MOUNT_ATTEMPTS, MAX_CSI_MOUNT_TIMEOUT};
    use crate::errors::ConversionError;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn v1beta4_object() -> serde_json::Value {
        json!({
            "apiVersion": "dynatrace.com/v1beta4",
            "kind": "DynaKube",
            "metadata": {
                "name": "dynakube",
                "namespace": "dynatrace",
                "resourceVersion": "1234",
                "labels": { "team": "obs" }
            },
            "spec": {
                "apiUrl": "https://demo.live.dynatrace.com/api",
                "oneAgent": { "cloudNativeFullStack": { "args": ["--set-host-group=a"] } },
                "activeGate": { "capabilities": ["routing"], "persistentVolumeClaim": {} },
                "kspm": {}
            }
        })
    }

    #[test]
    fn test_served_version() {
        assert_eq!(served_version("dynatrace.com/v1beta1").unwrap(), "v1beta1");
        assert_eq!(served_version("dynatrace.com/v1beta5").unwrap(), "v1beta5");
    }

    #[test]
    fn test_served_version_rejects_unknown() {
        for api_version in ["dynatrace.com/v1beta3", "example.com/v1beta4", "v1beta4", ""] {
            let err = served_version(api_version).unwrap_err();
            assert!(
                matches!(err, ConversionError::UnsupportedVersion { .. }),
                "{api_version} should be unsupported"
            );
        }
    }

    #[test]
    fn test_to_hub_from_v1beta4() {
        let hub = to_hub(&v1beta4_object()).unwrap();
        assert_eq!(hub.metadata.resource_version.as_deref(), Some("1234"));
        assert!(hub.spec.active_gate.volume_claim_template.is_some());
        assert_eq!(hub.spec.kspm.unwrap().mapped_host_paths, vec!["/".to_string()]);
    }

    #[test]
    fn test_convert_between_old_versions_via_hub() {
        let v1beta2 = convert_object(&v1beta4_object(), "dynatrace.com/v1beta2").unwrap();
        assert_eq!(v1beta2["apiVersion"], "dynatrace.com/v1beta2");
        assert_eq!(v1beta2["spec"]["activeGate"]["replicas"], 1);
        assert!(v1beta2["spec"]["activeGate"].get("persistentVolumeClaim").is_none());
        assert!(v1beta2["spec"].get("kspm").is_none());
        assert_eq!(v1beta2["metadata"]["labels"]["team"], "obs");

        let v1beta1 = convert_object(&v1beta2, "dynatrace.com/v1beta1").unwrap();
        assert_eq!(v1beta1["apiVersion"], "dynatrace.com/v1beta1");
        assert_eq!(
            v1beta1["spec"]["oneAgent"]["cloudNativeFullStack"]["args"][0],
            "--set-host-group=a"
        );
    }

    #[test]
    fn test_convert_to_same_version_is_identity_on_spec() {
        let object = v1beta4_object();
        let converted = convert_object(&object, "dynatrace.com/v1beta4").unwrap();
        assert_eq!(converted["spec"], object["spec"]);
    }

    #[test]
    fn test_malformed_object() {
        let object = json!({
            "apiVersion": "dynatrace.com/v1beta2",
            "kind": "DynaKube",
            "metadata": { "name": "dynakube" },
            "spec": { "apiUrl": 42 }
        });
        let err = to_hub(&object).unwrap_err();
        assert!(matches!(err, ConversionError::MalformedObject { .. }));
    }

    #[test]
    fn test_missing_api_version() {
        let err = to_hub(&json!({ "kind": "DynaKube" })).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedVersion { .. }));
    }

    // ========================================================================
    // Annotation helpers
    // ========================================================================

    #[test]
    fn test_take_annotation_prunes_empty_map() {
        let mut annotations = Some(BTreeMap::from([("a".to_string(), "1".to_string())]));
        assert_eq!(take_annotation(&mut annotations, "a").as_deref(), Some("1"));
        assert!(annotations.is_none());
    }

    #[test]
    fn test_take_annotation_missing_key_keeps_map() {
        let mut annotations = Some(BTreeMap::new());
        assert!(take_annotation(&mut annotations, "a").is_none());
        assert_eq!(annotations, Some(BTreeMap::new()));
    }

    #[test]
    fn test_migrate_csi_mount_attempts_ignores_garbage() {
        let mut annotations = Some(BTreeMap::from([(
            MAX_CSI_MOUNT_ATTEMPTS.to_string(),
            "many".to_string(),
        )]));
        migrate_csi_mount_attempts(&mut annotations);

        let annotations = annotations.unwrap();
        assert_eq!(annotations.get(MAX_CSI_MOUNT_ATTEMPTS).unwrap(), "many");
        assert!(!annotations.contains_key(MAX_CSI_MOUNT_TIMEOUT));
    }
}
