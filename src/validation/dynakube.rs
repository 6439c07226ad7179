// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rules on the top-level fields of a `DynaKube`: API URL, name, images and istio.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::ValidationContext;
use crate::api::feature_flags::{DEPRECATED_FEATURE_FLAGS, MOVED_FEATURE_FLAGS};
use crate::constants::{API_URL_SUFFIX, EXAMPLE_API_URL, MAX_DYNAKUBE_NAME_LENGTH};

pub const ERROR_NO_API_URL: &str = "The DynaKube's specification is missing the API URL or still has the example value set.
Make sure you correctly specify the URL in your custom resource.";

pub const ERROR_INVALID_API_URL: &str = "The DynaKube's specification has an invalid API URL value set.
Make sure you correctly specify the URL in your custom resource, including the scheme and the /api postfix.";

pub const ERROR_THIRD_GEN_API_URL: &str = "The DynaKube's specification has a Dynatrace platform URL (*.apps.dynatrace.com) set as API URL.
Use the environment API URL (e.g. https://<environment-id>.live.dynatrace.com/api) instead.";

pub const ERROR_NO_DNS1035_LABEL: &str = "The DynaKube's name violates DNS-1035.
A DNS-1035 label must consist of lower case alphanumeric characters or '-', start with an alphabetic character, and end with an alphanumeric character (e.g. 'my-name' or 'abc-123', regex used for validation is '[a-z]([-a-z0-9]*[a-z0-9])?').";

pub const ERROR_NO_RESOURCES: &str = "The DynaKube's specification enables istio, but the cluster does not serve the networking.istio.io/v1beta1 API.
Install istio or disable enableIstio.";

pub const WARNING_DEPRECATED_FEATURE_FLAG: &str =
    "The feature flag annotation '{flag}' is deprecated and will be removed in a future release.";

pub const WARNING_MOVED_FEATURE_FLAG: &str =
    "The feature flag annotation '{flag}' is deprecated, use the corresponding field of the DynaKube instead.";

/// Hosts of the third-generation platform, which serve no environment API.
const THIRD_GEN_HOST_SUFFIXES: [&str; 2] = [".apps.dynatrace.com", ".apps.dynatracelabs.com"];

static DNS_1035_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("DNS-1035 label regex is valid")
});

fn is_example_or_empty(api_url: &str) -> bool {
    api_url.is_empty() || api_url == EXAMPLE_API_URL
}

pub fn no_api_url(ctx: &ValidationContext<'_>) -> Option<String> {
    is_example_or_empty(ctx.dynakube.api_url()).then(|| ERROR_NO_API_URL.to_string())
}

pub fn invalid_api_url(ctx: &ValidationContext<'_>) -> Option<String> {
    let api_url = ctx.dynakube.api_url();
    if is_example_or_empty(api_url) {
        return None;
    }

    let valid = Url::parse(api_url).is_ok_and(|parsed| {
        matches!(parsed.scheme(), "http" | "https")
            && parsed.host_str().is_some_and(|host| !host.is_empty())
    }) && api_url.ends_with(API_URL_SUFFIX);

    (!valid).then(|| ERROR_INVALID_API_URL.to_string())
}

pub fn third_gen_api_url(ctx: &ValidationContext<'_>) -> Option<String> {
    let host = ctx.dynakube.api_url_host();
    THIRD_GEN_HOST_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(suffix))
        .then(|| ERROR_THIRD_GEN_API_URL.to_string())
}

pub fn name_violates_dns_1035(ctx: &ValidationContext<'_>) -> Option<String> {
    let name = ctx.dynakube.name();
    (!name.is_empty() && !DNS_1035_LABEL_REGEX.is_match(name))
        .then(|| ERROR_NO_DNS1035_LABEL.to_string())
}

pub fn name_too_long(ctx: &ValidationContext<'_>) -> Option<String> {
    let length = ctx.dynakube.name().len();
    (length > MAX_DYNAKUBE_NAME_LENGTH).then(|| {
        format!(
            "The length limit for the name of a DynaKube is {MAX_DYNAKUBE_NAME_LENGTH}, but {length} was provided."
        )
    })
}

/// Custom images must not point at the tenant registry; those images are
/// pulled by the operator with its own pull secret.
pub fn public_image_for_tenant_registry(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    let host = dk.api_url_host();
    if host.is_empty() {
        return None;
    }

    let one_agent = dk.one_agent();
    let tenant_prefix = format!("{host}/");
    [
        ("oneAgent image", one_agent.custom_image()),
        ("codeModulesImage", one_agent.custom_code_modules_image(true)),
        ("activeGate image", dk.active_gate().custom_image()),
    ]
    .into_iter()
    .find(|(_, image)| image.starts_with(&tenant_prefix))
    .map(|(field, image)| {
        format!(
            "The DynaKube's specification sets the {field} to '{image}', which is served by the Dynatrace environment registry.
Custom images must come from a public or private registry; leave the field empty to use the environment registry."
        )
    })
}

pub fn missing_istio_resources(ctx: &ValidationContext<'_>) -> Option<String> {
    (ctx.dynakube.spec.enable_istio && !ctx.istio_available)
        .then(|| ERROR_NO_RESOURCES.to_string())
}

/// One warning per deprecated feature-flag annotation present on the object.
#[must_use]
pub fn deprecated_feature_flags(ctx: &ValidationContext<'_>) -> Vec<String> {
    let flags = ctx.dynakube.feature_flags();
    let removed = DEPRECATED_FEATURE_FLAGS
        .iter()
        .filter(|flag| flags.is_set(flag))
        .map(|flag| WARNING_DEPRECATED_FEATURE_FLAG.replace("{flag}", flag));
    let moved = MOVED_FEATURE_FLAGS
        .iter()
        .filter(|flag| flags.is_set(flag))
        .map(|flag| WARNING_MOVED_FEATURE_FLAG.replace("{flag}", flag));
    removed.chain(moved).collect()
}

#[cfg(test)]
#[path = "dynakube_tests.rs"]
mod dynakube_tests;
