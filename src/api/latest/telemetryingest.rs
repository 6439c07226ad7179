// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Telemetry ingest section of the hub `DynaKube`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::EXTENSIONS_COLLECTOR_SUFFIX;

/// Protocols accepted by the telemetry ingest endpoint.
pub const KNOWN_PROTOCOLS: [&str; 4] = ["otlp", "zipkin", "jaeger", "statsd"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryIngestSpec {
    /// Protocols to accept. Defaults to all known protocols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,

    /// Name of the ingest service. Defaults to `<name>-telemetry-ingest`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_name: String,

    /// Name of a secret holding the TLS certificate of the ingest endpoint
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_ref_name: String,
}

/// Read-only view over the telemetry ingest spec of one `DynaKube`.
#[derive(Clone, Copy, Debug)]
pub struct TelemetryIngest<'a> {
    spec: Option<&'a TelemetryIngestSpec>,
    name: &'a str,
}

impl<'a> TelemetryIngest<'a> {
    #[must_use]
    pub fn new(spec: Option<&'a TelemetryIngestSpec>, name: &'a str) -> Self {
        Self { spec, name }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.spec.is_some()
    }

    /// Configured protocols, or every known protocol when none are configured.
    #[must_use]
    pub fn protocols(&self) -> Vec<&'a str> {
        match self.spec {
            Some(spec) if !spec.protocols.is_empty() => {
                spec.protocols.iter().map(String::as_str).collect()
            }
            _ => KNOWN_PROTOCOLS.to_vec(),
        }
    }

    #[must_use]
    pub fn service_name(&self) -> String {
        match self.spec {
            Some(spec) if !spec.service_name.is_empty() => spec.service_name.clone(),
            _ => format!("{}-telemetry-ingest", self.name),
        }
    }

    #[must_use]
    pub fn is_custom_tls(&self) -> bool {
        self.spec.is_some_and(|spec| !spec.tls_ref_name.is_empty())
    }

    /// Name of the collector statefulset receiving the telemetry.
    #[must_use]
    pub fn collector_name(&self) -> String {
        format!("{}{EXTENSIONS_COLLECTOR_SUFFIX}", self.name)
    }
}
