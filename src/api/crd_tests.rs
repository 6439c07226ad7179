// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `api/crd.rs`

#[cfg(test)]
mod tests {
    use crate::api::crd::*;

    #[test]
    fn test_all_versions_served_with_hub_as_storage() {
        let crd = dynakube_crd("dynatrace").unwrap();

        assert_eq!(crd.metadata.name.as_deref(), Some("dynakubes.dynatrace.com"));
        assert_eq!(crd.spec.scope, "Namespaced");
        let versions: Vec<(&str, bool, bool)> = crd
            .spec
            .versions
            .iter()
            .map(|v| (v.name.as_str(), v.served, v.storage))
            .collect();
        assert_eq!(versions.len(), 4);
        for (name, served, storage) in versions {
            assert!(served, "{name} must be served");
            assert_eq!(storage, name == "v1beta5", "storage flag of {name}");
        }
    }

    #[test]
    fn test_old_versions_are_deprecated() {
        let crd = dynakube_crd("dynatrace").unwrap();
        for version in &crd.spec.versions {
            let deprecated = version.deprecated.unwrap_or(false);
            match version.name.as_str() {
                "v1beta1" | "v1beta2" => {
                    assert!(deprecated, "{} must be deprecated", version.name);
                    assert!(version
                        .deprecation_warning
                        .as_deref()
                        .is_some_and(|w| w.contains("v1beta5")));
                }
                _ => assert!(!deprecated, "{} must not be deprecated", version.name),
            }
        }
    }

    #[test]
    fn test_names_and_columns() {
        let crd = dynakube_crd("dynatrace").unwrap();
        let names = &crd.spec.names;
        assert_eq!(names.kind, "DynaKube");
        assert_eq!(names.plural, "dynakubes");
        assert_eq!(
            names.short_names.as_deref(),
            Some(&["dk".to_string(), "dks".to_string()][..])
        );
        assert_eq!(names.categories.as_deref(), Some(&["dynatrace".to_string()][..]));

        let hub = crd.spec.versions.iter().find(|v| v.name == "v1beta5").unwrap();
        let columns: Vec<&str> = hub
            .additional_printer_columns
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(columns, vec!["ApiUrl", "Status", "Age"]);
    }

    #[test]
    fn test_conversion_webhook() {
        let crd = dynakube_crd("operators").unwrap();
        let conversion = crd.spec.conversion.unwrap();
        assert_eq!(conversion.strategy, "Webhook");

        let webhook = conversion.webhook.unwrap();
        assert_eq!(webhook.conversion_review_versions, vec!["v1".to_string()]);
        let service = webhook.client_config.unwrap().service.unwrap();
        assert_eq!(service.name, WEBHOOK_SERVICE_NAME);
        assert_eq!(service.namespace, "operators");
        assert_eq!(service.path.as_deref(), Some(CONVERSION_PATH));
        assert_eq!(service.port, Some(443));
    }
}
