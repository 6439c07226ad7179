// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ActiveGate rules.

use std::collections::BTreeSet;

use url::Url;

use super::ValidationContext;
use crate::api::latest::activegate::Capability;

pub const ERROR_INVALID_ACTIVEGATE_PROXY_URL: &str = "The DynaKube's specification has an invalid Proxy URL value set.
Make sure you correctly specify the URL in your custom resource.";

pub const WARNING_MISSING_ACTIVEGATE_MEMORY_LIMIT: &str =
    "ActiveGate specification missing memory limits. Can cause excess memory usage.";

fn capability_names<'a>(ctx: &'a ValidationContext<'_>) -> &'a [String] {
    &ctx.dynakube.spec.active_gate.capabilities
}

pub fn invalid_capabilities(ctx: &ValidationContext<'_>) -> Option<String> {
    capability_names(ctx)
        .iter()
        .find(|name| Capability::from_display_name(name).is_none())
        .map(|name| {
            format!(
                "The DynaKube's specification tries to use an invalid capability in ActiveGate section, invalid capability={name}.
Make sure you correctly specify the ActiveGate capabilities in your custom resource."
            )
        })
}

pub fn duplicate_capabilities(ctx: &ValidationContext<'_>) -> Option<String> {
    let mut seen = BTreeSet::new();
    capability_names(ctx)
        .iter()
        .find(|name| !seen.insert(name.as_str()))
        .map(|name| {
            format!(
                "The DynaKube's specification tries to specify duplicate capabilities in the ActiveGate section, duplicate capability={name}.
Make sure you don't duplicate an ActiveGate capability in your custom resource."
            )
        })
}

/// An inline proxy value used by the ActiveGate must parse as a URL.
pub fn invalid_proxy_url(ctx: &ValidationContext<'_>) -> Option<String> {
    let dk = ctx.dynakube;
    if !dk.active_gate().is_enabled() {
        return None;
    }
    let proxy = dk.spec.proxy.as_ref().map_or("", |proxy| proxy.value.as_str());
    if proxy.is_empty() {
        return None;
    }
    Url::parse(proxy)
        .is_err()
        .then(|| ERROR_INVALID_ACTIVEGATE_PROXY_URL.to_string())
}

pub fn missing_memory_limit(ctx: &ValidationContext<'_>) -> Option<String> {
    let active_gate = ctx.dynakube.active_gate();
    (active_gate.is_enabled() && !active_gate.has_memory_limit())
        .then(|| WARNING_MISSING_ACTIVEGATE_MEMORY_LIMIT.to_string())
}

#[cfg(test)]
#[path = "activegate_tests.rs"]
mod activegate_tests;
