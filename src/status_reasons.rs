// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition types and reasons for Spaces resources.
//!
//! Reasons are programmatic identifiers in `CamelCase` that explain why a condition has
//! a particular status. Builders producing complete conditions live in
//! [`crate::conditions`].
//!
//! # Condition Types
//!
//! Every resource carries a `type: Ready` condition. `ControlPlane` resources also report
//! `Healthy`, `ControlPlaneProvisioned`, `SourceSynced`, `Supported`, `Restored` and
//! `Paused`.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: PatchError
//!       message: "1 of 3 objects failed to patch: XNetwork.example.org network-1"
//!       lastTransitionTime: "2025-01-01T00:00:00Z"
//!   objectRefs:
//!     - apiGroup: example.org/v1alpha1
//!       kind: XNetwork
//!       name: network-1
//!       status: Error
//!       reason: NotFound
//! ```

// ============================================================================
// Condition Status Values
// ============================================================================

/// Condition status `True`.
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status `False`.
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Condition status `Unknown`.
pub const CONDITION_STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// Condition Types
// ============================================================================

/// The encompassing readiness condition carried by every resource.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Whether the control plane is healthy.
pub const CONDITION_TYPE_HEALTHY: &str = "Healthy";

/// Whether the control plane has been provisioned.
pub const CONDITION_TYPE_CONTROL_PLANE_PROVISIONED: &str = "ControlPlaneProvisioned";

/// Whether the control plane is in sync with its source.
pub const CONDITION_TYPE_SOURCE_SYNCED: &str = "SourceSynced";

/// Whether the control plane runs a supported Crossplane version.
pub const CONDITION_TYPE_SUPPORTED: &str = "Supported";

/// Whether the control plane has been restored from a backup.
pub const CONDITION_TYPE_RESTORED: &str = "Restored";

/// Whether the control plane workloads are paused.
pub const CONDITION_TYPE_PAUSED: &str = "Paused";

// ============================================================================
// ControlPlane Reasons
// ============================================================================

/// The control plane is healthy.
pub const REASON_HEALTHY: &str = "HealthyControlPlane";

/// The control plane is unhealthy.
pub const REASON_UNHEALTHY: &str = "UnhealthyControlPlane";

/// The control plane has been (or is being) provisioned.
pub const REASON_PROVISIONED: &str = "Provisioned";

/// Provisioning the control plane failed.
pub const REASON_PROVISIONING_ERROR: &str = "ProvisioningError";

/// The control plane is in sync with the source revision.
pub const REASON_SOURCE_COMPLETED: &str = "Completed";

/// The control plane is still processing the source revision.
pub const REASON_SOURCE_IN_PROGRESS: &str = "InProgress";

/// The control plane runs a supported Crossplane version.
pub const REASON_SUPPORTED: &str = "SupportedCrossplaneVersion";

/// The control plane runs an unsupported Crossplane version.
pub const REASON_UNSUPPORTED: &str = "UnsupportedCrossplaneVersion";

/// The restore from backup has completed.
pub const REASON_RESTORE_COMPLETED: &str = "Completed";

/// The restore from backup has failed.
pub const REASON_RESTORE_FAILED: &str = "Failed";

/// The restore from backup has not started yet.
///
/// Reported on the `Ready` condition rather than `Restored`.
pub const REASON_RESTORE_PENDING: &str = "RestorePending";

/// The control plane workloads are being scaled down.
pub const REASON_PAUSE_IN_PROGRESS: &str = "InProgress";

/// The control plane workloads are scaled down.
pub const REASON_PAUSE_COMPLETED: &str = "Completed";

/// The control plane workloads are being scaled back up.
pub const REASON_PAUSE_RESTART_IN_PROGRESS: &str = "RestartInProgress";

/// The control plane workloads have been scaled back up.
pub const REASON_PAUSE_RESTARTED: &str = "Restarted";

// ============================================================================
// Override Reasons
// ============================================================================

/// Every object in the target hierarchy was patched or deliberately skipped.
///
/// **Usage:** `type: Ready`, `status: "True"`.
pub const REASON_TRAVERSED: &str = "Traversed";

/// The target hierarchy has been unwound and the override may be garbage collected.
///
/// **Usage:** `type: Ready`, `status: "False"`. Terminal.
pub const REASON_DELETED: &str = "Deleted";

/// At least one object in the target hierarchy failed to patch.
///
/// **Usage:** `type: Ready`, `status: "False"`. The message names the failed objects.
pub const REASON_PATCH_ERROR: &str = "PatchError";

/// The walk stopped at the configured object limit before the hierarchy was exhausted.
///
/// **Usage:** `type: Ready`, `status: "False"`.
pub const REASON_TRAVERSAL_LIMIT_EXCEEDED: &str = "TraversalLimitExceeded";

/// The override spec is invalid.
///
/// **Usage:** `type: Ready`, `status: "False"`.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// A condition that has not been observed yet.
pub const REASON_UNKNOWN: &str = "";
