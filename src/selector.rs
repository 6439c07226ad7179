// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector matching and label-spec validation.
//!
//! The pod webhook matches a namespace's labels against the app-injection
//! selector of a `DynaKube`, and the validator checks selectors and node
//! selectors of sibling `DynaKube`s for conflicts.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use dynakube::selector::label_selector_matches;
//! use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
//!
//! let selector = LabelSelector {
//!     match_labels: Some(BTreeMap::from([("inject".to_string(), "true".to_string())])),
//!     ..LabelSelector::default()
//! };
//! let labels = BTreeMap::from([("inject".to_string(), "true".to_string())]);
//! assert!(label_selector_matches(&selector, &labels));
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use regex::Regex;

/// Selector operator: the label value is one of the listed values
pub const OPERATOR_IN: &str = "In";

/// Selector operator: the label is absent or its value is not listed
pub const OPERATOR_NOT_IN: &str = "NotIn";

/// Selector operator: the label key is present
pub const OPERATOR_EXISTS: &str = "Exists";

/// Selector operator: the label key is absent
pub const OPERATOR_DOES_NOT_EXIST: &str = "DoesNotExist";

/// Maximum length of a label value and of the name part of a label key
const MAX_LABEL_NAME_LENGTH: usize = 63;

/// Maximum length of the DNS subdomain prefix of a label key
const MAX_LABEL_PREFIX_LENGTH: usize = 253;

static LABEL_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("label name regex is valid")
});

static DNS_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("dns subdomain regex is valid")
});

/// Returns true if the selector has neither labels nor expressions.
#[must_use]
pub fn is_empty_selector(selector: &LabelSelector) -> bool {
    crate::api::latest::oneagent::is_empty_selector(selector)
}

/// Returns true if `labels` satisfy every label and expression of `selector`.
///
/// An empty selector matches everything. An expression with an unknown
/// operator never matches.
#[must_use]
pub fn label_selector_matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    let labels_match = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(key, value)| labels.get(key) == Some(value));

    labels_match
        && selector
            .match_expressions
            .iter()
            .flatten()
            .all(|requirement| requirement_matches(requirement, labels))
}

fn requirement_matches(
    requirement: &LabelSelectorRequirement,
    labels: &BTreeMap<String, String>,
) -> bool {
    let value = labels.get(&requirement.key);
    let values = requirement.values.as_deref().unwrap_or_default();

    match requirement.operator.as_str() {
        OPERATOR_IN => value.is_some_and(|v| values.contains(v)),
        OPERATOR_NOT_IN => value.is_none_or(|v| !values.contains(v)),
        OPERATOR_EXISTS => value.is_some(),
        OPERATOR_DOES_NOT_EXIST => value.is_none(),
        _ => false,
    }
}

/// Returns true if every entry of `selector` is present in `labels`.
#[must_use]
pub fn map_selector_matches(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Two node selectors overlap when either one satisfies the other.
///
/// Nodes matched by the more specific selector are then also matched by the
/// less specific one, so two host agents would land on the same node.
#[must_use]
pub fn node_selectors_overlap(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> bool {
    map_selector_matches(a, b) || map_selector_matches(b, a)
}

/// Validates every key, value and operator of a label selector.
///
/// Returns one message per violation, empty if the selector is valid.
#[must_use]
pub fn validate_label_selector(selector: &LabelSelector) -> Vec<String> {
    let mut errors = Vec::new();

    for (key, value) in selector.match_labels.iter().flatten() {
        errors.extend(validate_label_key(key));
        errors.extend(validate_label_value(value));
    }

    for requirement in selector.match_expressions.iter().flatten() {
        errors.extend(validate_label_key(&requirement.key));
        let values = requirement.values.as_deref().unwrap_or_default();
        match requirement.operator.as_str() {
            OPERATOR_IN | OPERATOR_NOT_IN => {
                if values.is_empty() {
                    errors.push(format!(
                        "values must be non-empty for operator '{}' on key '{}'",
                        requirement.operator, requirement.key
                    ));
                }
            }
            OPERATOR_EXISTS | OPERATOR_DOES_NOT_EXIST => {
                if !values.is_empty() {
                    errors.push(format!(
                        "values must be empty for operator '{}' on key '{}'",
                        requirement.operator, requirement.key
                    ));
                }
            }
            other => errors.push(format!("'{other}' is not a valid label selector operator")),
        }
        for value in values {
            errors.extend(validate_label_value(value));
        }
    }

    errors
}

/// Validates a qualified label key (`[prefix/]name`).
#[must_use]
pub fn validate_label_key(key: &str) -> Option<String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty()
            || prefix.len() > MAX_LABEL_PREFIX_LENGTH
            || !DNS_SUBDOMAIN_REGEX.is_match(prefix)
        {
            return Some(format!(
                "label key '{key}' has an invalid prefix: must be a DNS subdomain of at most {MAX_LABEL_PREFIX_LENGTH} characters"
            ));
        }
    }

    if name.is_empty() || name.len() > MAX_LABEL_NAME_LENGTH || !LABEL_NAME_REGEX.is_match(name) {
        return Some(format!(
            "label key '{key}' is invalid: name must be at most {MAX_LABEL_NAME_LENGTH} alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric character"
        ));
    }

    None
}

/// Validates a label value. The empty value is valid.
#[must_use]
pub fn validate_label_value(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if value.len() > MAX_LABEL_NAME_LENGTH || !LABEL_NAME_REGEX.is_match(value) {
        return Some(format!(
            "label value '{value}' is invalid: must be at most {MAX_LABEL_NAME_LENGTH} alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric character"
        ));
    }
    None
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
