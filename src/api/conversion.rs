// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversion between the served `DynaKube` versions.
//!
//! Every non-hub version implements [`HubConversion`]. A conversion between two
//! arbitrary served versions always goes through the hub in two hops:
//! `source -> hub -> destination`. The functions in this module dispatch on the
//! `apiVersion` of raw JSON objects, which is what the conversion webhook and
//! the validating webhook receive.
//!
//! # Example
//!
//! ```rust,no_run
//! use dynakube::api::conversion::convert_object;
//! use serde_json::json;
//!
//! let v1beta4 = json!({
//!     "apiVersion": "dynatrace.com/v1beta4",
//!     "kind": "DynaKube",
//!     "metadata": { "name": "dynakube", "namespace": "dynatrace" },
//!     "spec": { "apiUrl": "https://demo.live.dynatrace.com/api", "kspm": {} }
//! });
//!
//! let hub = convert_object(&v1beta4, "dynatrace.com/v1beta5").unwrap();
//! assert_eq!(hub["spec"]["kspm"]["mappedHostPaths"][0], "/");
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::duration::mount_attempts_to_timeout;
use crate::api::feature_flags::{
    DEFAULT_MAX_FAILED_CSI_MOUNT_ATTEMPTS, MAX_CSI_MOUNT_ATTEMPTS, MAX_CSI_MOUNT_TIMEOUT,
};
use crate::api::latest::DynaKube;
use crate::api::{v1beta1, v1beta2, v1beta4};
use crate::constants::{API_GROUP, HUB_VERSION, V1BETA1, V1BETA2, V1BETA4};
use crate::errors::ConversionError;

/// Lossless mapping between one served version and the hub.
pub trait HubConversion: Sized {
    /// Converts this object into the hub version.
    ///
    /// # Errors
    ///
    /// Returns an error if an annotation carrying a moved field can't be parsed.
    fn to_hub(&self) -> Result<DynaKube, ConversionError>;

    /// Builds this version from a hub object.
    ///
    /// # Errors
    ///
    /// Returns an error if a field can't be embedded into an annotation.
    fn from_hub(hub: &DynaKube) -> Result<Self, ConversionError>;
}

/// Splits `dynatrace.com/<version>` and returns the served version name.
///
/// # Errors
///
/// Returns [`ConversionError::UnsupportedVersion`] for foreign groups and
/// unknown versions.
pub fn served_version(api_version: &str) -> Result<&'static str, ConversionError> {
    let unsupported = || ConversionError::UnsupportedVersion {
        api_version: api_version.to_string(),
    };

    let (group, version) = api_version.split_once('/').ok_or_else(unsupported)?;
    if group != API_GROUP {
        return Err(unsupported());
    }

    [V1BETA1, V1BETA2, V1BETA4, HUB_VERSION]
        .into_iter()
        .find(|served| *served == version)
        .ok_or_else(unsupported)
}

/// Converts a raw object of any served version into the hub version.
///
/// # Errors
///
/// Returns an error if the version is not served, the payload doesn't match the
/// version's schema, or a moved field can't be parsed.
pub fn to_hub(object: &Value) -> Result<DynaKube, ConversionError> {
    let api_version = object
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match served_version(api_version)? {
        V1BETA1 => parse::<v1beta1::DynaKube>(object, api_version)?.to_hub(),
        V1BETA2 => parse::<v1beta2::DynaKube>(object, api_version)?.to_hub(),
        V1BETA4 => parse::<v1beta4::DynaKube>(object, api_version)?.to_hub(),
        _ => parse::<DynaKube>(object, api_version),
    }
}

/// Renders a hub object in the requested `apiVersion`.
///
/// # Errors
///
/// Returns an error if the version is not served or the object can't be
/// serialized.
pub fn from_hub(hub: &DynaKube, api_version: &str) -> Result<Value, ConversionError> {
    match served_version(api_version)? {
        V1BETA1 => render(&v1beta1::DynaKube::from_hub(hub)?),
        V1BETA2 => render(&v1beta2::DynaKube::from_hub(hub)?),
        V1BETA4 => render(&v1beta4::DynaKube::from_hub(hub)?),
        _ => render(hub),
    }
}

/// Converts a raw object into `desired_api_version` through the hub.
///
/// # Errors
///
/// See [`to_hub`] and [`from_hub`].
pub fn convert_object(object: &Value, desired_api_version: &str) -> Result<Value, ConversionError> {
    let hub = to_hub(object)?;
    debug!(
        name = hub.name(),
        namespace = hub.namespace(),
        from = object.get("apiVersion").and_then(serde_json::Value::as_str).unwrap_or_default(),
        to = desired_api_version,
        "Converting DynaKube"
    );
    from_hub(&hub, desired_api_version)
}

fn parse<T: DeserializeOwned>(object: &Value, api_version: &str) -> Result<T, ConversionError> {
    serde_json::from_value(object.clone()).map_err(|e| ConversionError::MalformedObject {
        api_version: api_version.to_string(),
        reason: e.to_string(),
    })
}

fn render<T: Serialize>(object: &T) -> Result<Value, ConversionError> {
    serde_json::to_value(object).map_err(|e| ConversionError::Serialization {
        reason: e.to_string(),
    })
}

/// Removes an annotation, dropping the map once it is empty so that conversion
/// doesn't invent `annotations: {}`.
pub(crate) fn take_annotation(
    annotations: &mut Option<BTreeMap<String, String>>,
    key: &str,
) -> Option<String> {
    let map = annotations.as_mut()?;
    let value = map.remove(key);
    if value.is_some() && map.is_empty() {
        *annotations = None;
    }
    value
}

/// Sets an annotation, creating the map if needed.
pub(crate) fn put_annotation(
    annotations: &mut Option<BTreeMap<String, String>>,
    key: &str,
    value: String,
) {
    annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value);
}

/// Reads a JSON annotation and removes it from the map.
pub(crate) fn take_json_annotation<T: DeserializeOwned>(
    annotations: &mut Option<BTreeMap<String, String>>,
    key: &str,
) -> Result<Option<T>, ConversionError> {
    let Some(raw) = take_annotation(annotations, key) else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| ConversionError::EmbeddedAnnotation {
            annotation: key.to_string(),
            reason: e.to_string(),
        })
}

/// Writes `value` as JSON annotation.
pub(crate) fn put_json_annotation<T: Serialize>(
    annotations: &mut Option<BTreeMap<String, String>>,
    key: &str,
    value: &T,
) -> Result<(), ConversionError> {
    let raw = serde_json::to_string(value).map_err(|e| ConversionError::EmbeddedAnnotation {
        annotation: key.to_string(),
        reason: e.to_string(),
    })?;
    put_annotation(annotations, key, raw);
    Ok(())
}

/// Replaces a non-default `max-csi-mount-attempts` flag of a legacy object with
/// the equivalent `max-csi-mount-timeout`.
pub(crate) fn migrate_csi_mount_attempts(annotations: &mut Option<BTreeMap<String, String>>) {
    let attempts = annotations
        .as_ref()
        .and_then(|map| map.get(MAX_CSI_MOUNT_ATTEMPTS))
        .and_then(|raw| raw.trim().parse::<i64>().ok());

    let Some(attempts) = attempts else {
        return;
    };
    if attempts == DEFAULT_MAX_FAILED_CSI_MOUNT_ATTEMPTS {
        return;
    }

    take_annotation(annotations, MAX_CSI_MOUNT_ATTEMPTS);
    let timeout = mount_attempts_to_timeout(attempts);
    debug!(attempts, timeout = %timeout, "Translating CSI mount attempts into a timeout");
    put_annotation(annotations, MAX_CSI_MOUNT_TIMEOUT, timeout);
}

#[cfg(test)]
#[path = "conversion_tests.rs"]
mod conversion_tests;
