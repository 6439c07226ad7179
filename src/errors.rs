// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the DynaKube API and webhooks.
//!
//! This module provides specialized error types for:
//! - Tenant URL parsing
//! - Version conversion of `DynaKube` payloads
//! - Kubernetes API calls made through [`crate::cluster::ClusterClient`]
//! - Hard failures of the pod injection webhook
//! - Startup failures of the HTTPS servers
//!
//! Validation failures are not errors in this sense: validators return reason
//! strings that are accumulated into the admission response.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while deriving the tenant from a `DynaKube` API URL.
///
/// Every variant embeds the offending URL verbatim so the message can be shown
/// to the user unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiUrlError {
    /// The URL could not be parsed at all
    #[error("problem parsing tenant id from url {url}: {reason}")]
    Unparsable {
        /// The URL as written in the spec
        url: String,
        /// Parser message
        reason: String,
    },

    /// The URL has neither an `/e/<tenant>/` path nor a dotted host
    #[error("problem getting tenant id from API URL '{url}'")]
    MissingTenant {
        /// The URL as written in the spec
        url: String,
    },
}

/// Errors produced while parsing a Go-style duration string (`"10m"`, `"1h30m"`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// The string does not follow the `[-+]?(<number><unit>)+` grammar
    #[error("invalid duration '{0}'")]
    Invalid(String),

    /// A segment uses a unit other than ns, us, ms, s, m or h
    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit {
        /// The full input
        input: String,
        /// The unrecognized unit
        unit: String,
    },

    /// The duration is below zero
    #[error("negative duration '{0}'")]
    Negative(String),

    /// The duration does not fit into 64 bits of nanoseconds
    #[error("duration '{0}' is out of range")]
    Overflow(String),
}

/// Errors that can occur while converting a `DynaKube` between served versions.
///
/// These errors are returned as a failed `ConversionReview` and surface as a
/// 5xx error from the API server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The requested or supplied API version is not served
    #[error("unsupported DynaKube apiVersion '{api_version}'")]
    UnsupportedVersion {
        /// The `apiVersion` that was not recognized
        api_version: String,
    },

    /// The payload does not deserialize into the claimed version
    #[error("malformed DynaKube payload for '{api_version}': {reason}")]
    MalformedObject {
        /// The `apiVersion` the payload claimed
        api_version: String,
        /// Deserializer message
        reason: String,
    },

    /// A spec carried in an annotation could not be decoded
    #[error("annotation '{annotation}' does not hold a valid spec: {reason}")]
    EmbeddedAnnotation {
        /// The annotation key
        annotation: String,
        /// Deserializer message
        reason: String,
    },

    /// A feature flag that moves into a typed field holds an unusable value
    #[error("feature flag '{annotation}' has invalid value '{value}'")]
    InvalidMovedFlag {
        /// The annotation key
        annotation: String,
        /// The raw annotation value
        value: String,
    },

    /// The converted object could not be serialized back to JSON
    #[error("failed to serialize converted DynaKube: {reason}")]
    Serialization {
        /// Serializer message
        reason: String,
    },
}

/// Errors returned by Kubernetes API calls.
///
/// "Not found" is never returned through this type by lookup helpers; they
/// return `Ok(None)` instead. "Already exists" is surfaced so that creators can
/// treat it as success.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The API server answered with an error
    #[error("Kubernetes API call '{operation}' failed: {source}")]
    Api {
        /// Short description of the call (e.g. `get secret ns/name`)
        operation: String,
        /// The underlying client error
        #[source]
        source: kube::Error,
    },

    /// The call did not finish before the admission deadline
    #[error("Kubernetes API call '{operation}' timed out")]
    Timeout {
        /// Short description of the call
        operation: String,
    },
}

impl ClusterError {
    /// Wrap a client error with the operation that produced it.
    #[must_use]
    pub fn api(operation: impl Into<String>, source: kube::Error) -> Self {
        Self::Api {
            operation: operation.into(),
            source,
        }
    }

    /// HTTP status code of the API error, if any.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Api {
                source: kube::Error::Api(ae),
                ..
            } => Some(ae.code),
            _ => None,
        }
    }

    /// Returns true if the object already exists (create race).
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Api {
                source: kube::Error::Api(ae),
                ..
            } => ae.code == 409 && ae.reason == "AlreadyExists",
            _ => false,
        }
    }

    /// Returns true if the write lost an optimistic-concurrency race.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Api {
                source: kube::Error::Api(ae),
                ..
            } => ae.code == 409 && ae.reason != "AlreadyExists",
            _ => false,
        }
    }

    /// Returns true if the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }

    /// Returns true if retrying the call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { source, .. } => match source {
                kube::Error::Api(ae) => ae.code == 429 || (500..600).contains(&ae.code),
                kube::Error::Service(_) => true,
                _ => false,
            },
            Self::Timeout { .. } => true,
        }
    }
}

/// Hard failures of the pod injection webhook.
///
/// Intentional skips (missing tenant UUID, unknown code module, ...) are not
/// errors; they are recorded on the pod as annotations.
#[derive(Error, Debug)]
pub enum InjectionError {
    /// The pod namespace could not be read
    #[error("failed to read namespace '{namespace}': {source}")]
    Namespace {
        /// The namespace of the pod
        namespace: String,
        /// Underlying API error
        #[source]
        source: ClusterError,
    },

    /// The DynaKube named by the namespace label could not be read
    #[error("failed to read DynaKube '{namespace}/{name}': {source}")]
    DynaKubeLookup {
        /// DynaKube name from the namespace label
        name: String,
        /// Namespace the DynaKube is expected in
        namespace: String,
        /// Underlying API error
        #[source]
        source: ClusterError,
    },

    /// The per-namespace init secret could not be created
    #[error("failed to ensure init secret in namespace '{namespace}': {source}")]
    InitSecret {
        /// Target namespace
        namespace: String,
        /// Underlying API error
        #[source]
        source: ClusterError,
    },

    /// A bootstrapper secret could not be replicated into the pod namespace
    #[error("failed to replicate secret '{secret}' into namespace '{namespace}': {source}")]
    SecretReplication {
        /// Secret name
        secret: String,
        /// Target namespace
        namespace: String,
        /// Underlying API error
        #[source]
        source: ClusterError,
    },

    /// Data referenced by the DynaKube is unusable
    #[error("invalid injection input: {0}")]
    InvalidInput(String),

    /// The mutated pod could not be turned into a JSON patch
    #[error("failed to build pod patch: {0}")]
    Patch(String),
}

impl InjectionError {
    /// Returns true if the API server should retry the admission request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Namespace { source, .. }
            | Self::DynaKubeLookup { source, .. }
            | Self::InitSecret { source, .. }
            | Self::SecretReplication { source, .. } => source.is_transient(),
            Self::InvalidInput(_) | Self::Patch(_) => false,
        }
    }
}

/// Failures of the webhook and metrics listeners.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A configured certificate or key file does not exist
    #[error("TLS file '{}' does not exist", path.display())]
    MissingTlsFile { path: PathBuf },

    /// The certificate or key could not be loaded
    #[error("failed to load TLS certificate '{}': {source}", cert.display())]
    Tls {
        cert: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A listener failed while serving
    #[error("server on {address} failed: {source}")]
    Serve {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
