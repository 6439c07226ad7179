// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `validation/dynakube.rs`

#[cfg(test)]
mod tests {
    use crate::api::latest::oneagent::{ApplicationMonitoringSpec, HostInjectSpec};
    use crate::api::latest::{DynaKube, DynaKubeSpec};
    use crate::config::Modules;
    use crate::constants::EXAMPLE_API_URL;
    use crate::validation::dynakube::*;
    use crate::validation::ValidationContext;

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

    fn ctx(dk: &DynaKube) -> ValidationContext<'_> {
        ValidationContext::new(dk, Modules::default())
    }

    // ========================================================================
    // API URL
    // ========================================================================

    #[test]
    fn test_missing_and_example_api_url() {
        let empty = dynakube("dynakube", "");
        assert_eq!(no_api_url(&ctx(&empty)).as_deref(), Some(ERROR_NO_API_URL));

        let example = dynakube("dynakube", EXAMPLE_API_URL);
        assert!(no_api_url(&ctx(&example)).is_some());
        assert!(invalid_api_url(&ctx(&example)).is_none());
    }

    #[test]
    fn test_invalid_api_url_shapes() {
        for api_url in [
            "demo.live.dynatrace.com/api",
            "https://demo.live.dynatrace.com",
            "https://demo.live.dynatrace.com/api/v2",
            "ftp://demo.live.dynatrace.com/api",
        ] {
            let dk = dynakube("dynakube", api_url);
            assert_eq!(
                invalid_api_url(&ctx(&dk)).as_deref(),
                Some(ERROR_INVALID_API_URL),
                "{api_url} should be rejected"
            );
        }
    }

    #[test]
    fn test_valid_api_urls() {
        for api_url in [
            "https://demo.live.dynatrace.com/api",
            "https://gateway.example.com/e/acme/api",
            "http://10.0.0.1:8080/api",
        ] {
            let dk = dynakube("dynakube", api_url);
            assert!(invalid_api_url(&ctx(&dk)).is_none(), "{api_url} should be accepted");
        }
    }

    #[test]
    fn test_third_gen_api_url() {
        let dk = dynakube("dynakube", "https://demo.apps.dynatrace.com/api");
        assert_eq!(third_gen_api_url(&ctx(&dk)).as_deref(), Some(ERROR_THIRD_GEN_API_URL));

        let dk = dynakube("dynakube", "https://demo.apps.dynatracelabs.com/api");
        assert!(third_gen_api_url(&ctx(&dk)).is_some());

        let dk = dynakube("dynakube", "https://demo.live.dynatrace.com/api");
        assert!(third_gen_api_url(&ctx(&dk)).is_none());
    }

    // ========================================================================
    // Name
    // ========================================================================

    #[test]
    fn test_name_dns_1035() {
        for name in ["1dynakube", "Dynakube", "dyna_kube", "dynakube-"] {
            let dk = dynakube(name, "https://demo.live.dynatrace.com/api");
            assert!(name_violates_dns_1035(&ctx(&dk)).is_some(), "{name} should be rejected");
        }
        for name in ["dynakube", "a", "dk-123"] {
            let dk = dynakube(name, "https://demo.live.dynatrace.com/api");
            assert!(name_violates_dns_1035(&ctx(&dk)).is_none(), "{name} should be accepted");
        }
    }

    #[test]
    fn test_name_too_long() {
        let dk = dynakube(&"a".repeat(40), "https://demo.live.dynatrace.com/api");
        assert!(name_too_long(&ctx(&dk)).is_none());

        let dk = dynakube(&"a".repeat(41), "https://demo.live.dynatrace.com/api");
        let message = name_too_long(&ctx(&dk)).unwrap();
        assert!(message.contains("40"));
        assert!(message.contains("41"));
    }

    // ========================================================================
    // Images
    // ========================================================================

    #[test]
    fn test_image_from_tenant_registry_is_rejected() {
        let mut dk = dynakube("dynakube", "https://demo.live.dynatrace.com/api");
        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec {
            image: "demo.live.dynatrace.com/linux/oneagent:1.2.3".to_string(),
            ..HostInjectSpec::default()
        });
        let message = public_image_for_tenant_registry(&ctx(&dk)).unwrap();
        assert!(message.contains("oneAgent image"));

        dk.spec.one_agent.classic_full_stack = Some(HostInjectSpec {
            image: "docker.io/dynatrace/oneagent:1.2.3".to_string(),
            ..HostInjectSpec::default()
        });
        assert!(public_image_for_tenant_registry(&ctx(&dk)).is_none());
    }

    #[test]
    fn test_code_modules_image_from_tenant_registry_is_rejected() {
        let mut dk = dynakube("dynakube", "https://demo.live.dynatrace.com/api");
        let mut spec = ApplicationMonitoringSpec::default();
        spec.app.code_modules_image = "demo.live.dynatrace.com/linux/codemodules:1.2.3".to_string();
        dk.spec.one_agent.application_monitoring = Some(spec);

        let message = public_image_for_tenant_registry(&ctx(&dk)).unwrap();
        assert!(message.contains("codeModulesImage"));
    }

    // ========================================================================
    // Istio
    // ========================================================================

    #[test]
    fn test_missing_istio_resources() {
        let mut dk = dynakube("dynakube", "https://demo.live.dynatrace.com/api");
        let mut context = ctx(&dk);
        context.istio_available = false;
        assert!(missing_istio_resources(&context).is_none());

        dk.spec.enable_istio = true;
        let mut context = ctx(&dk);
        context.istio_available = false;
        assert_eq!(missing_istio_resources(&context).as_deref(), Some(ERROR_NO_RESOURCES));
    }
}
