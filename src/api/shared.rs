// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leaf records shared by every served `DynaKube` version.
//!
//! These types have kept the same wire shape across all API generations, so the
//! version modules reuse them instead of redefining them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A value given either inline or through a secret reference.
///
/// Used for the proxy URL and the ActiveGate custom properties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValueSource {
    /// Inline value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    /// Name of a secret holding the value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value_from: String,
}

impl ValueSource {
    /// Returns true if neither an inline value nor a secret reference is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.value_from.is_empty()
    }
}

/// Image reference split into repository and tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// Custom image repository
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,

    /// Indicates a tag of the image to use
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

impl ImageRef {
    /// Returns `repository:tag`, or an empty string if either part is missing.
    #[must_use]
    pub fn full(&self) -> String {
        if self.repository.is_empty() || self.tag.is_empty() {
            return String::new();
        }
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Observed image and version of an image-bearing component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    /// Image ID
    #[serde(default, rename = "imageID", skip_serializing_if = "String::is_empty")]
    pub image_id: String,

    /// Image version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Source of the image (tenant-registry, public-registry, custom-image, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Indicates when the last check for a new version was performed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_timestamp: Option<String>,
}

/// Connection information reported by the tenant for a component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// UUID of the tenant
    #[serde(default, rename = "tenantUUID", skip_serializing_if = "String::is_empty")]
    pub tenant_uuid: String,

    /// Comma separated list of endpoints
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoints: String,

    /// Hash of the tenant token
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant_token_hash: String,

    /// Time of the last connection request (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<String>,
}

/// One communication endpoint of the OneAgent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationHostStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    #[serde(default)]
    pub port: u32,
}

/// Health check configuration of the OneAgent image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthcheckStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
}

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `Tokens` or `ActiveGateStatefulSet`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Serde helper for `skip_serializing_if` on plain booleans.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// Serde helper for booleans that default to `true` on the wire.
pub(crate) fn default_true() -> bool {
    true
}

/// Serde helper for `skip_serializing_if` on structs whose default means "unset".
pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}
