// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversion between `v1beta2` and the hub.

use tracing::debug;

use crate::api::conversion::{
    migrate_csi_mount_attempts, put_annotation, put_json_annotation, take_annotation,
    take_json_annotation, HubConversion,
};
use crate::api::latest::extensions::{ExtensionExecutionControllerSpec, OpenTelemetryCollectorSpec};
use crate::api::latest::status as hub_status;
use crate::api::latest::{self, activegate, oneagent};
use crate::api::v1beta4;
use crate::constants::DEFAULT_API_REQUEST_THRESHOLD_MINUTES;
use crate::errors::ConversionError;
use crate::labels::{
    ANNOTATION_EXTENSIONS, ANNOTATION_EXTENSION_EXECUTION_CONTROLLER, ANNOTATION_OTEL_COLLECTOR,
    ANNOTATION_USE_CSI_DRIVER,
};

use super::{
    ActiveGateSpec, ApplicationMonitoringSpec, CloudNativeFullStackSpec, DynaKube, DynaKubeSpec,
    DynaKubeStatus, HostInjectSpec, MetadataEnrichment, OneAgentSpec,
};

impl HubConversion for DynaKube {
    fn to_hub(&self) -> Result<latest::DynaKube, ConversionError> {
        let mut metadata = self.metadata.clone();
        migrate_csi_mount_attempts(&mut metadata.annotations);

        let extensions = take_json_annotation(&mut metadata.annotations, ANNOTATION_EXTENSIONS)?;
        let otel: Option<OpenTelemetryCollectorSpec> =
            take_json_annotation(&mut metadata.annotations, ANNOTATION_OTEL_COLLECTOR)?;
        let eec: Option<ExtensionExecutionControllerSpec> = take_json_annotation(
            &mut metadata.annotations,
            ANNOTATION_EXTENSION_EXECUTION_CONTROLLER,
        )?;

        let spec = &self.spec;
        let one_agent = one_agent_to_hub(&spec.one_agent);
        take_annotation(&mut metadata.annotations, ANNOTATION_USE_CSI_DRIVER);
        let use_csi_driver = spec
            .one_agent
            .application_monitoring
            .as_ref()
            .is_some_and(|app| app.use_csi_driver);
        if use_csi_driver && one_agent.application_monitoring.is_some() {
            put_annotation(
                &mut metadata.annotations,
                ANNOTATION_USE_CSI_DRIVER,
                "true".to_string(),
            );
        }

        let hub_spec = latest::DynaKubeSpec {
            proxy: spec.proxy.clone(),
            dynatrace_api_request_threshold: threshold_to_hub(spec.dynatrace_api_request_threshold),
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
                enabled: Some(spec.metadata_enrichment.enabled),
                namespace_selector: spec.metadata_enrichment.namespace_selector.clone(),
            },
            log_monitoring: None,
            kspm: None,
            extensions,
            telemetry_ingest: None,
            templates: latest::TemplatesSpec {
                open_telemetry_collector: otel.unwrap_or_default(),
                extension_execution_controller: eec.unwrap_or_default(),
                ..latest::TemplatesSpec::default()
            },
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

        let use_csi_driver =
            take_annotation(&mut metadata.annotations, ANNOTATION_USE_CSI_DRIVER).as_deref()
                == Some("true");

        if let Some(extensions) = &spec.extensions {
            put_json_annotation(&mut metadata.annotations, ANNOTATION_EXTENSIONS, extensions)?;
        }
        let templates = &spec.templates;
        if templates.open_telemetry_collector != OpenTelemetryCollectorSpec::default() {
            put_json_annotation(
                &mut metadata.annotations,
                ANNOTATION_OTEL_COLLECTOR,
                &templates.open_telemetry_collector,
            )?;
        }
        if templates.extension_execution_controller != ExtensionExecutionControllerSpec::default() {
            put_json_annotation(
                &mut metadata.annotations,
                ANNOTATION_EXTENSION_EXECUTION_CONTROLLER,
                &templates.extension_execution_controller,
            )?;
        }

        if spec.log_monitoring.is_some() || spec.kspm.is_some() || spec.telemetry_ingest.is_some() {
            debug!(
                name = hub.name(),
                "Dropping log monitoring, KSPM and telemetry ingest, unknown to v1beta2"
            );
        }

        Ok(DynaKube {
            metadata,
            spec: DynaKubeSpec {
                proxy: spec.proxy.clone(),
                one_agent: one_agent_from_hub(&spec.one_agent, use_csi_driver),
                api_url: spec.api_url.clone(),
                tokens: spec.tokens.clone(),
                trusted_cas: spec.trusted_cas.clone(),
                network_zone: spec.network_zone.clone(),
                custom_pull_secret: spec.custom_pull_secret.clone(),
                active_gate: active_gate_from_hub(&spec.active_gate),
                metadata_enrichment: MetadataEnrichment {
                    enabled: spec.metadata_enrichment.is_enabled(),
                    namespace_selector: spec.metadata_enrichment.namespace_selector.clone(),
                },
                dynatrace_api_request_threshold: spec
                    .dynatrace_api_request_threshold
                    .map_or(0, i32::from),
                skip_cert_check: spec.skip_cert_check,
                enable_istio: spec.enable_istio,
            },
            status: hub.status.as_ref().map(status_from_hub),
        })
    }
}

/// Narrows a signed threshold: zero stays unset, negative values fall back to
/// the default and large values clamp to the hub's maximum.
pub(crate) fn threshold_to_hub(minutes: i32) -> Option<u16> {
    match minutes {
        0 => None,
        m if m < 0 => Some(DEFAULT_API_REQUEST_THRESHOLD_MINUTES),
        m => Some(u16::try_from(m).unwrap_or(u16::MAX)),
    }
}

fn one_agent_to_hub(src: &OneAgentSpec) -> oneagent::OneAgentSpec {
    let mut dst = oneagent::OneAgentSpec {
        host_group: src.host_group.clone(),
        ..oneagent::OneAgentSpec::default()
    };

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

fn one_agent_from_hub(src: &oneagent::OneAgentSpec, use_csi_driver: bool) -> OneAgentSpec {
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
                use_csi_driver,
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
        // Only an explicit opt-out is carried, the hub treats unset as enabled.
        auto_update: (!src.auto_update).then_some(false),
    }
}

fn host_inject_from_hub(src: &oneagent::HostInjectSpec) -> HostInjectSpec {
    HostInjectSpec {
        annotations: src.annotations.clone(),
        labels: src.labels.clone(),
        node_selector: src.node_selector.clone(),
        auto_update: src.auto_update.unwrap_or(true),
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

fn app_injection_to_hub(src: &v1beta4::AppInjectionSpec) -> oneagent::AppInjectionSpec {
    oneagent::AppInjectionSpec {
        init_resources: src.init_resources.clone(),
        code_modules_image: src.code_modules_image.clone(),
        code_modules_image_pull_policy: String::new(),
        namespace_selector: src.namespace_selector.clone(),
    }
}

fn app_injection_from_hub(src: &oneagent::AppInjectionSpec) -> v1beta4::AppInjectionSpec {
    v1beta4::AppInjectionSpec {
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
        replicas: Some(src.replicas),
    }
}

fn active_gate_from_hub(src: &activegate::ActiveGateSpec) -> ActiveGateSpec {
    ActiveGateSpec {
        annotations: src.annotations.clone(),
        tls_secret_name: src.tls_secret_name.clone(),
        dns_policy: src.dns_policy.clone(),
        priority_class_name: src.priority_class_name.clone(),
        capabilities: src.capabilities.clone(),
        custom_properties: src.custom_properties.clone(),
        node_selector: src.node_selector.clone(),
        labels: src.labels.clone(),
        image: src.image.clone(),
        group: src.group.clone(),
        resources: src.resources.clone(),
        tolerations: src.tolerations.clone(),
        env: src.env.clone(),
        topology_spread_constraints: src.topology_spread_constraints.clone(),
        replicas: src.replicas.unwrap_or(1),
    }
}

pub(crate) fn status_to_hub(src: &DynaKubeStatus) -> hub_status::DynaKubeStatus {
    hub_status::DynaKubeStatus {
        one_agent: src.one_agent.clone(),
        active_gate: src.active_gate.clone(),
        code_modules: src.code_modules.clone(),
        updated_timestamp: src.updated_timestamp.clone(),
        dynatrace_api: src.dynatrace_api.clone(),
        phase: src.phase.clone(),
        kube_system_uuid: src.kube_system_uuid.clone(),
        conditions: src.conditions.clone(),
        ..hub_status::DynaKubeStatus::default()
    }
}

pub(crate) fn status_from_hub(src: &hub_status::DynaKubeStatus) -> DynaKubeStatus {
    DynaKubeStatus {
        one_agent: src.one_agent.clone(),
        active_gate: src.active_gate.clone(),
        code_modules: src.code_modules.clone(),
        updated_timestamp: src.updated_timestamp.clone(),
        dynatrace_api: src.dynatrace_api.clone(),
        phase: src.phase.clone(),
        kube_system_uuid: src.kube_system_uuid.clone(),
        conditions: src.conditions.clone(),
    }
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod convert_tests;
