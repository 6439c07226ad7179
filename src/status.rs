// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status helpers for `DynaKube` resources.
//!
//! Controllers collect condition changes in memory with
//! [`update_condition_in_memory`] and persist them in one call with
//! [`update_status`].
//!
//! # Example
//!
//! ```rust
//! use dynakube::status::create_condition;
//!
//! let condition = create_condition("TokenConditionType", "True", "TokenReady", "Token is valid");
//! assert_eq!(condition.status, "True");
//! ```

use chrono::Utc;
use tracing::{debug, warn};

use crate::api::latest::DynaKube;
use crate::api::shared::Condition;
use crate::cluster::ClusterClient;
use crate::errors::ClusterError;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Update or add a condition in place (no API call).
///
/// `lastTransitionTime` is kept when the status value does not change.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Persist the status of a `DynaKube`.
///
/// The status subresource is merge-patched. A conflict means another writer
/// got there first; it is logged and reported as success so the next
/// reconcile retries with fresh data.
///
/// # Errors
///
/// Returns every API error other than a conflict.
pub async fn update_status(client: &dyn ClusterClient, dk: &DynaKube) -> Result<(), ClusterError> {
    let status = dk.status.clone().unwrap_or_default();
    debug!(name = %dk.name(), namespace = %dk.namespace(), phase = %status.phase, "Updating DynaKube status");

    match client
        .patch_dynakube_status(dk.namespace(), dk.name(), &status)
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_conflict() => {
            warn!(
                name = %dk.name(),
                namespace = %dk.namespace(),
                error = %e,
                "Conflict while updating DynaKube status, retrying on next reconcile"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
