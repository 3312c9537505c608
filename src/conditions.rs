// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition builders and condition list operations.
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready", "Healthy")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (`CamelCase`)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last changed
//!
//! Builders return fully formed conditions stamped with the current time. The list
//! operations never touch the API server; persist with the status updaters in
//! [`crate::reconcilers::status`].
//!
//! # Example
//!
//! ```rust
//! use spaces::conditions::{set_conditions, traversed};
//!
//! let mut conditions = Vec::new();
//! set_conditions(&mut conditions, [traversed()]);
//! assert_eq!(conditions[0].reason, "Traversed");
//! ```

use crate::crd::Condition;
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_STATUS_UNKNOWN,
    CONDITION_TYPE_CONTROL_PLANE_PROVISIONED, CONDITION_TYPE_HEALTHY, CONDITION_TYPE_PAUSED,
    CONDITION_TYPE_READY, CONDITION_TYPE_RESTORED, CONDITION_TYPE_SOURCE_SYNCED,
    CONDITION_TYPE_SUPPORTED, REASON_DELETED, REASON_HEALTHY, REASON_INVALID_SPEC,
    REASON_PATCH_ERROR, REASON_PAUSE_COMPLETED, REASON_PAUSE_IN_PROGRESS,
    REASON_PAUSE_RESTARTED, REASON_PAUSE_RESTART_IN_PROGRESS, REASON_PROVISIONED,
    REASON_PROVISIONING_ERROR, REASON_RESTORE_COMPLETED, REASON_RESTORE_FAILED,
    REASON_RESTORE_PENDING, REASON_SOURCE_COMPLETED, REASON_SOURCE_IN_PROGRESS,
    REASON_SUPPORTED, REASON_TRAVERSAL_LIMIT_EXCEEDED, REASON_TRAVERSED, REASON_UNHEALTHY,
    REASON_UNKNOWN, REASON_UNSUPPORTED,
};
use chrono::Utc;

/// Create a new condition stamped with the current time.
///
/// An empty `message` leaves the condition without a message.
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
        reason: reason.to_string(),
        message: (!message.is_empty()).then(|| message.to_string()),
        last_transition_time: Utc::now().to_rfc3339(),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Return the condition of the given type, or an `Unknown` condition if absent.
#[must_use]
pub fn get_condition(conditions: &[Condition], condition_type: &str) -> Condition {
    find_condition(conditions, condition_type)
        .cloned()
        .unwrap_or_else(|| Condition {
            r#type: condition_type.to_string(),
            status: CONDITION_STATUS_UNKNOWN.to_string(),
            reason: REASON_UNKNOWN.to_string(),
            message: None,
            last_transition_time: String::new(),
        })
}

/// Returns true if two conditions carry the same type, status, reason and message.
///
/// `lastTransitionTime` is ignored.
#[must_use]
pub fn condition_equal(a: &Condition, b: &Condition) -> bool {
    a.r#type == b.r#type && a.status == b.status && a.reason == b.reason && a.message == b.message
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// The existing `lastTransitionTime` is kept while the status is unchanged.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            let last_transition_time = if existing.status == condition.status {
                std::mem::take(&mut existing.last_transition_time)
            } else {
                condition.last_transition_time
            };
            *existing = Condition {
                last_transition_time,
                ..condition
            };
        }
        None => conditions.push(condition),
    }
}

/// Apply several conditions with [`set_condition`].
pub fn set_conditions(
    conditions: &mut Vec<Condition>,
    updates: impl IntoIterator<Item = Condition>,
) {
    for condition in updates {
        set_condition(conditions, condition);
    }
}

/// Compare two condition lists ignoring `lastTransitionTime` and ordering.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|n| {
            find_condition(current, &n.r#type).is_some_and(|c| condition_equal(c, n))
        })
}

// ============================================================================
// Override Conditions
// ============================================================================

/// The target object hierarchy has been traversed successfully.
#[must_use]
pub fn traversed() -> Condition {
    create_condition(
        CONDITION_TYPE_READY,
        CONDITION_STATUS_TRUE,
        REASON_TRAVERSED,
        "",
    )
}

/// The target object hierarchy has been cleaned up and the override is ready for
/// garbage collection.
#[must_use]
pub fn deleted() -> Condition {
    create_condition(
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_DELETED,
        "",
    )
}

/// At least one object in the hierarchy has an unresolved patch error.
#[must_use]
pub fn patch_errors(message: &str) -> Condition {
    create_condition(
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_PATCH_ERROR,
        message,
    )
}

/// The walk stopped at the object limit.
#[must_use]
pub fn traversal_limit_exceeded(limit: usize) -> Condition {
    create_condition(
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_TRAVERSAL_LIMIT_EXCEEDED,
        &format!("Hierarchy walk stopped after {limit} objects"),
    )
}

/// The override spec failed validation.
#[must_use]
pub fn invalid_spec(message: &str) -> Condition {
    create_condition(
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_INVALID_SPEC,
        message,
    )
}

// ============================================================================
// ControlPlane Conditions
// ============================================================================

/// The control plane is healthy.
#[must_use]
pub fn healthy() -> Condition {
    create_condition(
        CONDITION_TYPE_HEALTHY,
        CONDITION_STATUS_TRUE,
        REASON_HEALTHY,
        "",
    )
}

/// The control plane is unhealthy.
#[must_use]
pub fn unhealthy() -> Condition {
    create_condition(
        CONDITION_TYPE_HEALTHY,
        CONDITION_STATUS_FALSE,
        REASON_UNHEALTHY,
        "",
    )
}

/// The control plane has been provisioned.
#[must_use]
pub fn control_plane_provisioned() -> Condition {
    create_condition(
        CONDITION_TYPE_CONTROL_PLANE_PROVISIONED,
        CONDITION_STATUS_TRUE,
        REASON_PROVISIONED,
        "",
    )
}

/// The control plane is still being provisioned.
#[must_use]
pub fn control_plane_provision_in_progress() -> Condition {
    create_condition(
        CONDITION_TYPE_CONTROL_PLANE_PROVISIONED,
        CONDITION_STATUS_FALSE,
        REASON_PROVISIONED,
        "",
    )
}

/// Provisioning the control plane failed.
#[must_use]
pub fn control_plane_provisioning_error(err: &dyn std::error::Error) -> Condition {
    create_condition(
        CONDITION_TYPE_CONTROL_PLANE_PROVISIONED,
        CONDITION_STATUS_FALSE,
        REASON_PROVISIONING_ERROR,
        &err.to_string(),
    )
}

/// The control plane is in sync with the given source revision.
#[must_use]
pub fn source_synced(revision: &str) -> Condition {
    create_condition(
        CONDITION_TYPE_SOURCE_SYNCED,
        CONDITION_STATUS_TRUE,
        REASON_SOURCE_COMPLETED,
        &format!("In sync with the revision {revision}"),
    )
}

/// The control plane is still processing resources of the given source revision.
#[must_use]
pub fn source_in_progress(revision: &str) -> Condition {
    create_condition(
        CONDITION_TYPE_SOURCE_SYNCED,
        CONDITION_STATUS_FALSE,
        REASON_SOURCE_IN_PROGRESS,
        &format!("Syncing revision {revision}"),
    )
}

/// Syncing the control plane with its source failed.
#[must_use]
pub fn source_error(err: &dyn std::error::Error) -> Condition {
    create_condition(
        CONDITION_TYPE_SOURCE_SYNCED,
        CONDITION_STATUS_FALSE,
        REASON_SOURCE_IN_PROGRESS,
        &err.to_string(),
    )
}

/// The control plane runs a supported Crossplane version.
#[must_use]
pub fn supported_crossplane_version() -> Condition {
    create_condition(
        CONDITION_TYPE_SUPPORTED,
        CONDITION_STATUS_TRUE,
        REASON_SUPPORTED,
        "",
    )
}

/// The control plane runs an unsupported Crossplane version.
#[must_use]
pub fn unsupported_crossplane_version(message: &str) -> Condition {
    create_condition(
        CONDITION_TYPE_SUPPORTED,
        CONDITION_STATUS_FALSE,
        REASON_UNSUPPORTED,
        message,
    )
}

/// The control plane has been restored from the specified backup.
#[must_use]
pub fn restore_completed() -> Condition {
    create_condition(
        CONDITION_TYPE_RESTORED,
        CONDITION_STATUS_TRUE,
        REASON_RESTORE_COMPLETED,
        "Control plane has been restored from specified backup",
    )
}

/// Restoring the control plane from backup failed.
#[must_use]
pub fn restore_failed(err: &dyn std::error::Error) -> Condition {
    create_condition(
        CONDITION_TYPE_RESTORED,
        CONDITION_STATUS_FALSE,
        REASON_RESTORE_FAILED,
        &err.to_string(),
    )
}

/// The control plane restore is pending. Reported on the `Ready` condition.
#[must_use]
pub fn restore_pending() -> Condition {
    create_condition(
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_RESTORE_PENDING,
        "Control plane restore is pending",
    )
}

/// The control plane is being paused.
#[must_use]
pub fn pause_in_progress() -> Condition {
    create_condition(
        CONDITION_TYPE_PAUSED,
        CONDITION_STATUS_FALSE,
        REASON_PAUSE_IN_PROGRESS,
        "Control plane is being paused",
    )
}

/// The control plane has been paused.
#[must_use]
pub fn pause_completed() -> Condition {
    create_condition(
        CONDITION_TYPE_PAUSED,
        CONDITION_STATUS_TRUE,
        REASON_PAUSE_COMPLETED,
        "Control plane has been paused",
    )
}

/// The control plane is being restarted after a pause.
#[must_use]
pub fn pause_restart_in_progress() -> Condition {
    create_condition(
        CONDITION_TYPE_PAUSED,
        CONDITION_STATUS_FALSE,
        REASON_PAUSE_RESTART_IN_PROGRESS,
        "Control plane is being restarted",
    )
}

/// The control plane has been restarted after a pause.
#[must_use]
pub fn pause_restarted() -> Condition {
    create_condition(
        CONDITION_TYPE_PAUSED,
        CONDITION_STATUS_FALSE,
        REASON_PAUSE_RESTARTED,
        "Control plane has been restarted",
    )
}
