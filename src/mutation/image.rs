// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container image reference parsing.
//!
//! The bootstrapper imprints the image coordinates of every injected
//! container into the agent configuration. References are parsed with
//! [`oci_client::Reference`]; the registry and repository are then reported
//! as written, so Docker Hub defaults (`docker.io`, `library/`) only appear
//! when the reference spells them out.

use std::str::FromStr;

use oci_client::Reference;
use serde::Serialize;
use tracing::debug;

/// Coordinates of a container image, serialized with the attribute keys the
/// bootstrapper reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    /// Registry host, empty for implicit registries
    #[serde(rename = "container_image.registry", skip_serializing_if = "String::is_empty")]
    pub registry: String,
    /// Repository path below the registry
    #[serde(rename = "container_image.repository", skip_serializing_if = "String::is_empty")]
    pub repository: String,
    /// Tag, empty if the reference has none
    #[serde(rename = "container_image.tags", skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Digest (`sha256:...`), empty if the reference has none
    #[serde(rename = "container_image.digest", skip_serializing_if = "String::is_empty")]
    pub digest: String,
}

/// Split an image reference into registry, repository, tag and digest.
///
/// # Examples
///
/// ```rust
/// use dynakube::mutation::image::parse_image;
///
/// let info = parse_image("registry.example.com/team/app:1.0");
/// assert_eq!(info.registry, "registry.example.com");
/// assert_eq!(info.repository, "team/app");
/// assert_eq!(info.tag, "1.0");
/// assert!(info.digest.is_empty());
/// ```
#[must_use]
pub fn parse_image(image: &str) -> ImageInfo {
    if image.is_empty() {
        return ImageInfo::default();
    }

    let reference = match Reference::from_str(image) {
        Ok(reference) => reference,
        Err(e) => {
            debug!(image = %image, error = %e, "Image reference could not be parsed");
            return ImageInfo::default();
        }
    };

    let (registry, written) = match image.strip_prefix(&format!("{}/", reference.registry())) {
        Some(rest) => (reference.registry().to_string(), rest),
        None => (String::new(), image),
    };

    // implicit Docker Hub references get `library/` prepended by the parser
    let repository = if written.starts_with(reference.repository()) {
        reference.repository()
    } else {
        reference
            .repository()
            .strip_prefix(DOCKER_HUB_LIBRARY_PREFIX)
            .unwrap_or(reference.repository())
    };

    ImageInfo {
        registry,
        repository: repository.to_string(),
        tag: written_tag(image, &reference),
        digest: reference.digest().unwrap_or_default().to_string(),
    }
}

const DOCKER_HUB_LIBRARY_PREFIX: &str = "library/";

/// The parsed tag if `image` spells one out; the parser defaults to `latest` otherwise.
fn written_tag(image: &str, reference: &Reference) -> String {
    let name = image.split('@').next().unwrap_or_default();
    let last_segment = name.rsplit('/').next().unwrap_or_default();
    if last_segment.contains(':') {
        reference.tag().unwrap_or_default().to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod image_tests;
