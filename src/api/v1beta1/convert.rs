// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversion between `v1beta1` and the hub.
//!
//! Besides the field mapping this moves three feature flags into typed hub
//! fields and spreads the single namespace selector over the OneAgent and
//! metadata-enrichment sections. `from_hub` only writes a flag back when
//! `to_hub` could not derive the hub value without it.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::api::conversion::{
    migrate_csi_mount_attempts, put_annotation, take_annotation, HubConversion,
};
use crate::api::feature_flags::{
    API_REQUEST_THRESHOLD, DISABLE_METADATA_ENRICHMENT, METADATA_ENRICHMENT,
    ONEAGENT_SECCOMP_PROFILE,
};
use crate::api::latest::oneagent::{is_empty_selector, split_arg, HOST_GROUP_ARGUMENT};
use crate::api::latest::{self, activegate, oneagent};
use crate::api::v1beta2::convert::{status_from_hub, status_to_hub, threshold_to_hub};
use crate::errors::ConversionError;
use crate::labels::ANNOTATION_USE_CSI_DRIVER;

use super::{
    ActiveGateSpec, AppInjectionSpec, ApplicationMonitoringSpec, CloudNativeFullStackSpec,
    DynaKube, DynaKubeSpec, HostInjectSpec, OneAgentSpec,
};

type Annotations = Option<BTreeMap<String, String>>;

impl HubConversion for DynaKube {
    fn to_hub(&self) -> Result<latest::DynaKube, ConversionError> {
        let mut metadata = self.metadata.clone();
        migrate_csi_mount_attempts(&mut metadata.annotations);

        let spec = &self.spec;
        let mut one_agent = one_agent_to_hub(&spec.one_agent);

        let enrichment_flag = take_enrichment_flag(&mut metadata.annotations);
        let threshold = take_threshold(&mut metadata.annotations)?;

        if let Some(profile) = take_annotation(&mut metadata.annotations, ONEAGENT_SECCOMP_PROFILE)
        {
            if let Some(host) = host_spec_mut(&mut one_agent) {
                host.sec_comp_profile = profile;
            }
        }

        take_annotation(&mut metadata.annotations, ANNOTATION_USE_CSI_DRIVER);
        if let (Some(app), Some(_)) = (
            &spec.one_agent.application_monitoring,
            &one_agent.application_monitoring,
        ) {
            if let Some(use_csi_driver) = app.use_csi_driver {
                put_annotation(
                    &mut metadata.annotations,
                    ANNOTATION_USE_CSI_DRIVER,
                    use_csi_driver.to_string(),
                );
            }
        }

        if !is_empty_selector(&spec.namespace_selector) {
            if let Some(app) = app_spec_mut(&mut one_agent) {
                app.namespace_selector = spec.namespace_selector.clone();
            }
        }

        let needs_app_injection = needs_app_injection(&one_agent);
        let hub_spec = latest::DynaKubeSpec {
            proxy: spec.proxy.clone(),
            dynatrace_api_request_threshold: threshold,
            api_url: spec.api_url.clone(),
            tokens: spec.tokens.clone(),
            trusted_cas: spec.trusted_cas.clone(),
            network_zone: spec.network_zone.clone(),
            custom_pull_secret: spec.custom_pull_secret.clone(),
            skip_cert_check: spec.skip_cert_check,
            enable_istio: spec.enable_istio,
            one_agent,
            active_gate: active_gate_to_hub(&spec.active_gate),
            metadata_enrichment: latest::MetadataEnrichment {
                enabled: Some(enrichment_flag.unwrap_or(true) && needs_app_injection),
                namespace_selector: spec.namespace_selector.clone(),
            },
            ..latest::DynaKubeSpec::default()
        };

        Ok(latest::DynaKube {
            metadata,
            spec: hub_spec,
            status: self.status.as_ref().map(status_to_hub),
        })
    }

    fn from_hub(hub: &latest::DynaKube) -> Result<Self, ConversionError> {
        let mut metadata = hub.metadata.clone();
        let spec = &hub.spec;

        let use_csi_driver = take_annotation(&mut metadata.annotations, ANNOTATION_USE_CSI_DRIVER)
            .and_then(|raw| raw.parse::<bool>().ok());

        let enrichment = spec.metadata_enrichment.is_enabled();
        if enrichment != needs_app_injection(&spec.one_agent) {
            put_annotation(
                &mut metadata.annotations,
                METADATA_ENRICHMENT,
                enrichment.to_string(),
            );
        }

        if let Some(threshold) = spec.dynatrace_api_request_threshold {
            put_annotation(
                &mut metadata.annotations,
                API_REQUEST_THRESHOLD,
                threshold.to_string(),
            );
        }

        let mode = spec.one_agent.mode();
        if let Some(host) = mode.and_then(|mode| mode.host_spec()) {
            if !host.sec_comp_profile.is_empty() {
                put_annotation(
                    &mut metadata.annotations,
                    ONEAGENT_SECCOMP_PROFILE,
                    host.sec_comp_profile.clone(),
                );
            }
        }

        let namespace_selector = mode
            .and_then(|mode| mode.app_spec())
            .map(|app| &app.namespace_selector)
            .filter(|selector| !is_empty_selector(selector))
            .unwrap_or(&spec.metadata_enrichment.namespace_selector);

        Ok(DynaKube {
            metadata,
            spec: DynaKubeSpec {
                proxy: spec.proxy.clone(),
                api_url: spec.api_url.clone(),
                tokens: spec.tokens.clone(),
                custom_pull_secret: spec.custom_pull_secret.clone(),
                skip_cert_check: spec.skip_cert_check,
                trusted_cas: spec.trusted_cas.clone(),
                network_zone: spec.network_zone.clone(),
                enable_istio: spec.enable_istio,
                namespace_selector: namespace_selector.clone(),
                one_agent: one_agent_from_hub(&spec.one_agent, use_csi_driver),
                active_gate: active_gate_from_hub(&spec.active_gate),
            },
            status: hub.status.as_ref().map(status_from_hub),
        })
    }
}

/// Reads the enrichment flag, falling back to its deprecated inverse.
fn take_enrichment_flag(annotations: &mut Annotations) -> Option<bool> {
    let current = take_annotation(annotations, METADATA_ENRICHMENT);
    let deprecated = take_annotation(annotations, DISABLE_METADATA_ENRICHMENT);

    match (current, deprecated) {
        (Some(value), _) => Some(value != "false"),
        (None, Some(disabled)) => Some(disabled != "true"),
        (None, None) => None,
    }
}

fn take_threshold(annotations: &mut Annotations) -> Result<Option<u16>, ConversionError> {
    let Some(raw) = take_annotation(annotations, API_REQUEST_THRESHOLD) else {
        return Ok(None);
    };

    let minutes = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ConversionError::InvalidMovedFlag {
            annotation: API_REQUEST_THRESHOLD.to_string(),
            value: raw.clone(),
        })?;
    let minutes = i32::try_from(minutes).unwrap_or(if minutes < 0 { -1 } else { i32::MAX });

    Ok(threshold_to_hub(minutes))
}

fn needs_app_injection(one_agent: &oneagent::OneAgentSpec) -> bool {
    one_agent
        .mode()
        .is_some_and(|mode| mode.app_spec().is_some())
}

fn host_spec_mut(one_agent: &mut oneagent::OneAgentSpec) -> Option<&mut oneagent::HostInjectSpec> {
    if let Some(host) = one_agent.classic_full_stack.as_mut() {
        return Some(host);
    }
    if let Some(cloud_native) = one_agent.cloud_native_full_stack.as_mut() {
        return Some(&mut cloud_native.host);
    }
    one_agent.host_monitoring.as_mut()
}

fn app_spec_mut(one_agent: &mut oneagent::OneAgentSpec) -> Option<&mut oneagent::AppInjectionSpec> {
    if let Some(cloud_native) = one_agent.cloud_native_full_stack.as_mut() {
        return Some(&mut cloud_native.app);
    }
    one_agent
        .application_monitoring
        .as_mut()
        .map(|app| &mut app.app)
}

fn one_agent_to_hub(src: &OneAgentSpec) -> oneagent::OneAgentSpec {
    let mut dst = oneagent::OneAgentSpec::default();

    if let Some(host) = &src.classic_full_stack {
        dst.classic_full_stack = Some(host_inject_to_hub(host));
    }
    if let Some(cloud_native) = &src.cloud_native_full_stack {
        dst.cloud_native_full_stack = Some(oneagent::CloudNativeFullStackSpec {
            host: host_inject_to_hub(&cloud_native.host),
            app: app_injection_to_hub(&cloud_native.app),
        });
    }
    if let Some(app) = &src.application_monitoring {
        dst.application_monitoring = Some(oneagent::ApplicationMonitoringSpec {
            version: app.version.clone(),
            app: app_injection_to_hub(&app.app),
        });
    }
    if let Some(host) = &src.host_monitoring {
        dst.host_monitoring = Some(host_inject_to_hub(host));
    }

    if let Some(host) = dst.mode().and_then(|mode| mode.host_spec()) {
        dst.host_group = host_group_from_args(&host.args).to_string();
    }

    dst
}

fn one_agent_from_hub(src: &oneagent::OneAgentSpec, use_csi_driver: Option<bool>) -> OneAgentSpec {
    let mut dst = OneAgentSpec::default();

    match src.mode() {
        Some(oneagent::OneAgentMode::ClassicFullStack(host)) => {
            dst.classic_full_stack = Some(host_inject_from_hub(host, &src.host_group));
        }
        Some(oneagent::OneAgentMode::CloudNativeFullStack(cloud_native)) => {
            dst.cloud_native_full_stack = Some(CloudNativeFullStackSpec {
                app: app_injection_from_hub(&cloud_native.app),
                host: host_inject_from_hub(&cloud_native.host, &src.host_group),
            });
        }
        Some(oneagent::OneAgentMode::ApplicationMonitoring(app)) => {
            dst.application_monitoring = Some(ApplicationMonitoringSpec {
                app: app_injection_from_hub(&app.app),
                use_csi_driver,
                version: app.version.clone(),
            });
        }
        Some(oneagent::OneAgentMode::HostMonitoring(host)) => {
            dst.host_monitoring = Some(host_inject_from_hub(host, &src.host_group));
        }
        None => {}
    }

    dst
}

fn host_group_from_args(args: &[String]) -> &str {
    args.iter()
        .map(|arg| split_arg(arg))
        .find(|(key, _)| *key == HOST_GROUP_ARGUMENT)
        .map_or("", |(_, value)| value)
}

fn host_inject_to_hub(src: &HostInjectSpec) -> oneagent::HostInjectSpec {
    oneagent::HostInjectSpec {
        annotations: src.annotations.clone(),
        labels: src.labels.clone(),
        node_selector: src.node_selector.clone(),
        version: src.version.clone(),
        image: src.image.clone(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        one_agent_resources: src.one_agent_resources.clone(),
        tolerations: src.tolerations.clone(),
        env: src.env.clone(),
        args: src.args.clone(),
        auto_update: src.auto_update,
        ..oneagent::HostInjectSpec::default()
    }
}

fn host_inject_from_hub(src: &oneagent::HostInjectSpec, host_group: &str) -> HostInjectSpec {
    let mut args = src.args.clone();
    if !host_group.is_empty() && host_group_from_args(&args).is_empty() {
        args.push(format!("{HOST_GROUP_ARGUMENT}={host_group}"));
    }

    HostInjectSpec {
        version: src.version.clone(),
        image: src.image.clone(),
        tolerations: src.tolerations.clone(),
        auto_update: src.auto_update,
        dns_policy: src.dns_policy.clone(),
        annotations: src.annotations.clone(),
        labels: src.labels.clone(),
        env: src.env.clone(),
        args,
        node_selector: src.node_selector.clone(),
        priority_class_name: src.priority_class_name.clone(),
        one_agent_resources: src.one_agent_resources.clone(),
    }
}

fn app_injection_to_hub(src: &AppInjectionSpec) -> oneagent::AppInjectionSpec {
    oneagent::AppInjectionSpec {
        init_resources: src.init_resources.clone(),
        code_modules_image: src.code_modules_image.clone(),
        code_modules_image_pull_policy: String::new(),
        namespace_selector: LabelSelector::default(),
    }
}

fn app_injection_from_hub(src: &oneagent::AppInjectionSpec) -> AppInjectionSpec {
    AppInjectionSpec {
        init_resources: src.init_resources.clone(),
        code_modules_image: src.code_modules_image.clone(),
    }
}

fn active_gate_to_hub(src: &ActiveGateSpec) -> activegate::ActiveGateSpec {
    activegate::ActiveGateSpec {
        annotations: src.annotations.clone(),
        tls_secret_name: src.tls_secret_name.clone(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        capabilities: src.capabilities.clone(),
        volume_claim_template: None,
        custom_properties: src.custom_properties.clone(),
        node_selector: src.node_selector.clone(),
        labels: src.labels.clone(),
        image: src.image.clone(),
        group: src.group.clone(),
        resources: src.resources.clone(),
        tolerations: src.tolerations.clone(),
        env: src.env.clone(),
        topology_spread_constraints: src.topology_spread_constraints.clone(),
        replicas: src.replicas,
    }
}

fn active_gate_from_hub(src: &activegate::ActiveGateSpec) -> ActiveGateSpec {
    ActiveGateSpec {
        capabilities: src.capabilities.clone(),
        image: src.image.clone(),
        priority_class_name: src.priority_class_name.clone(),
        tls_secret_name: src.tls_secret_name.clone(),
        group: src.group.clone(),
        custom_properties: src.custom_properties.clone(),
        annotations: src.annotations.clone(),
        tolerations: src.tolerations.clone(),
        node_selector: src.node_selector.clone(),
        labels: src.labels.clone(),
        env: src.env.clone(),
        dns_policy: src.dns_policy.clone(),
        topology_spread_constraints: src.topology_spread_constraints.clone(),
        resources: src.resources.clone(),
        replicas: src.replicas,
    }
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod convert_tests;
