// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversion between `v1beta4` and the hub.

use crate::api::conversion::{put_json_annotation, take_json_annotation, HubConversion};
use crate::api::latest::{self, activegate, kspm, oneagent};
use crate::errors::ConversionError;
use crate::labels::ANNOTATION_KSPM_MAPPED_HOST_PATHS;

use super::{
    ActiveGateSpec, AppInjectionSpec, ApplicationMonitoringSpec, CloudNativeFullStackSpec,
    DynaKube, DynaKubeSpec, HostInjectSpec, KspmSpec, OneAgentSpec,
};

impl HubConversion for DynaKube {
    fn to_hub(&self) -> Result<latest::DynaKube, ConversionError> {
        let mut metadata = self.metadata.clone();
        let stored_paths: Option<Vec<String>> =
            take_json_annotation(&mut metadata.annotations, ANNOTATION_KSPM_MAPPED_HOST_PATHS)?;

        let spec = &self.spec;
        let hub_spec = latest::DynaKubeSpec {
            proxy: spec.proxy.clone(),
            dynatrace_api_request_threshold: spec.dynatrace_api_request_threshold,
            api_url: spec.api_url.clone(),
            tokens: spec.tokens.clone(),
            trusted_cas: spec.trusted_cas.clone(),
            network_zone: spec.network_zone.clone(),
            custom_pull_secret: spec.custom_pull_secret.clone(),
            skip_cert_check: spec.skip_cert_check,
            enable_istio: spec.enable_istio,
            one_agent: one_agent_to_hub(&spec.one_agent),
            active_gate: active_gate_to_hub(&spec.active_gate),
            metadata_enrichment: spec.metadata_enrichment.clone(),
            log_monitoring: spec.log_monitoring.clone(),
            kspm: spec.kspm.as_ref().map(|_| kspm::KspmSpec {
                mapped_host_paths: stored_paths
                    .unwrap_or_else(|| vec![kspm::DEFAULT_MAPPED_HOST_PATH.to_string()]),
            }),
            extensions: spec.extensions.clone(),
            telemetry_ingest: spec.telemetry_ingest.clone(),
            templates: spec.templates.clone(),
        };

        Ok(latest::DynaKube {
            metadata,
            spec: hub_spec,
            status: self.status.clone(),
        })
    }

    fn from_hub(hub: &latest::DynaKube) -> Result<Self, ConversionError> {
        let mut metadata = hub.metadata.clone();
        if let Some(kspm_spec) = &hub.spec.kspm {
            if kspm_spec.mapped_host_paths != [kspm::DEFAULT_MAPPED_HOST_PATH] {
                put_json_annotation(
                    &mut metadata.annotations,
                    ANNOTATION_KSPM_MAPPED_HOST_PATHS,
                    &kspm_spec.mapped_host_paths,
                )?;
            }
        }

        let spec = &hub.spec;
        Ok(DynaKube {
            metadata,
            spec: DynaKubeSpec {
                proxy: spec.proxy.clone(),
                dynatrace_api_request_threshold: spec.dynatrace_api_request_threshold,
                api_url: spec.api_url.clone(),
                tokens: spec.tokens.clone(),
                trusted_cas: spec.trusted_cas.clone(),
                network_zone: spec.network_zone.clone(),
                custom_pull_secret: spec.custom_pull_secret.clone(),
                skip_cert_check: spec.skip_cert_check,
                enable_istio: spec.enable_istio,
                one_agent: one_agent_from_hub(&spec.one_agent),
                active_gate: active_gate_from_hub(&spec.active_gate),
                metadata_enrichment: spec.metadata_enrichment.clone(),
                log_monitoring: spec.log_monitoring.clone(),
                kspm: spec.kspm.as_ref().map(|_| KspmSpec {}),
                extensions: spec.extensions.clone(),
                telemetry_ingest: spec.telemetry_ingest.clone(),
                templates: spec.templates.clone(),
            },
            status: hub.status.clone(),
        })
    }
}

fn one_agent_to_hub(src: &OneAgentSpec) -> oneagent::OneAgentSpec {
    let mut dst = oneagent::OneAgentSpec {
        host_group: src.host_group.clone(),
        ..oneagent::OneAgentSpec::default()
    };

    // All configured modes are carried over.
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

    dst
}

fn one_agent_from_hub(src: &oneagent::OneAgentSpec) -> OneAgentSpec {
    let mut dst = OneAgentSpec {
        host_group: src.host_group.clone(),
        ..OneAgentSpec::default()
    };

    match src.mode() {
        Some(oneagent::OneAgentMode::ClassicFullStack(host)) => {
            dst.classic_full_stack = Some(host_inject_from_hub(host));
        }
        Some(oneagent::OneAgentMode::CloudNativeFullStack(cloud_native)) => {
            dst.cloud_native_full_stack = Some(CloudNativeFullStackSpec {
                host: host_inject_from_hub(&cloud_native.host),
                app: app_injection_from_hub(&cloud_native.app),
            });
        }
        Some(oneagent::OneAgentMode::ApplicationMonitoring(app)) => {
            dst.application_monitoring = Some(ApplicationMonitoringSpec {
                version: app.version.clone(),
                app: app_injection_from_hub(&app.app),
            });
        }
        Some(oneagent::OneAgentMode::HostMonitoring(host)) => {
            dst.host_monitoring = Some(host_inject_from_hub(host));
        }
        None => {}
    }

    dst
}

fn host_inject_to_hub(src: &HostInjectSpec) -> oneagent::HostInjectSpec {
    oneagent::HostInjectSpec {
        annotations: src.annotations.clone(),
        labels: src.labels.clone(),
        node_selector: src.node_selector.clone(),
        version: src.version.clone(),
        image: src.image.clone(),
        image_pull_policy: String::new(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        sec_comp_profile: src.sec_comp_profile.clone(),
        storage_host_path: String::new(),
        one_agent_resources: src.one_agent_resources.clone(),
        tolerations: src.tolerations.clone(),
        env: src.env.clone(),
        args: src.args.clone(),
        auto_update: src.auto_update,
    }
}

fn host_inject_from_hub(src: &oneagent::HostInjectSpec) -> HostInjectSpec {
    HostInjectSpec {
        annotations: src.annotations.clone(),
        labels: src.labels.clone(),
        node_selector: src.node_selector.clone(),
        auto_update: src.auto_update,
        version: src.version.clone(),
        image: src.image.clone(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        sec_comp_profile: src.sec_comp_profile.clone(),
        one_agent_resources: src.one_agent_resources.clone(),
        tolerations: src.tolerations.clone(),
        env: src.env.clone(),
        args: src.args.clone(),
    }
}

fn app_injection_to_hub(src: &AppInjectionSpec) -> oneagent::AppInjectionSpec {
    oneagent::AppInjectionSpec {
        init_resources: src.init_resources.clone(),
        code_modules_image: src.code_modules_image.clone(),
        code_modules_image_pull_policy: String::new(),
        namespace_selector: src.namespace_selector.clone(),
    }
}

fn app_injection_from_hub(src: &oneagent::AppInjectionSpec) -> AppInjectionSpec {
    AppInjectionSpec {
        init_resources: src.init_resources.clone(),
        code_modules_image: src.code_modules_image.clone(),
        namespace_selector: src.namespace_selector.clone(),
    }
}

fn active_gate_to_hub(src: &ActiveGateSpec) -> activegate::ActiveGateSpec {
    activegate::ActiveGateSpec {
        annotations: src.annotations.clone(),
        tls_secret_name: src.tls_secret_name.clone(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        capabilities: src.capabilities.clone(),
        volume_claim_template: src.persistent_volume_claim.clone(),
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
        annotations: src.annotations.clone(),
        tls_secret_name: src.tls_secret_name.clone(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        capabilities: src.capabilities.clone(),
        persistent_volume_claim: src.volume_claim_template.clone(),
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

#[cfg(test)]
#[path = "convert_tests.rs"]
mod convert_tests;
