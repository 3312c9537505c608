// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status aggregation.
//!
//! Folds the outcomes of one pass into the override status. `objectRefs` is replaced
//! wholesale on every pass, since the set of objects in a hierarchy can change between
//! passes. The readiness condition summarizes the worst outcome:
//!
//! | Outcomes                                | Ready   | Reason                   |
//! |-----------------------------------------|---------|--------------------------|
//! | any `Error`                             | `False` | `PatchError`             |
//! | walk stopped at the object limit        | `False` | `TraversalLimitExceeded` |
//! | only `Success` / `Skipped`              | `True`  | `Traversed`              |
//! | deletion unwound every object           | `False` | `Deleted`                |

use super::PassOutcome;
use crate::conditions::{deleted, patch_errors, traversal_limit_exceeded, traversed};
use crate::crd::{Condition, Conditioned, InControlPlaneOverrideStatus, ObjectReference};

/// Build the status persisted after a pass.
///
/// Conditions of `previous` are kept, so `lastTransitionTime` survives while readiness
/// is unchanged.
#[must_use]
pub fn aggregate(
    previous: Option<&InControlPlaneOverrideStatus>,
    outcome: PassOutcome,
    generation: Option<i64>,
) -> InControlPlaneOverrideStatus {
    let condition = readiness(&outcome.results, outcome.truncated_at);
    with_condition(previous, outcome.results, condition, generation)
}

/// Build the status persisted after a deletion pass.
///
/// Reports `Deleted` once every object is unwound and falls back to the regular
/// readiness policy otherwise.
#[must_use]
pub fn aggregate_deletion(
    previous: Option<&InControlPlaneOverrideStatus>,
    outcome: PassOutcome,
    generation: Option<i64>,
) -> InControlPlaneOverrideStatus {
    if unwound(&outcome.results) {
        with_condition(previous, outcome.results, deleted(), generation)
    } else {
        aggregate(previous, outcome, generation)
    }
}

/// The readiness condition for the outcomes of one pass.
#[must_use]
pub fn readiness(results: &[ObjectReference], truncated_at: Option<usize>) -> Condition {
    let failed: Vec<&ObjectReference> = results.iter().filter(|r| !r.is_resolved()).collect();

    if let Some(first) = failed.first() {
        return patch_errors(&format!(
            "{} of {} objects failed to patch, first failure: {first}",
            failed.len(),
            results.len()
        ));
    }
    if let Some(limit) = truncated_at {
        return traversal_limit_exceeded(limit);
    }
    traversed()
}

/// Whether a deletion pass released every object of the hierarchy.
///
/// Objects that no longer exist, or whose kind is no longer served, count as released.
#[must_use]
pub fn unwound(results: &[ObjectReference]) -> bool {
    results.iter().all(|r| r.is_resolved() || r.is_absent())
}

fn with_condition(
    previous: Option<&InControlPlaneOverrideStatus>,
    results: Vec<ObjectReference>,
    condition: Condition,
    generation: Option<i64>,
) -> InControlPlaneOverrideStatus {
    let mut status = InControlPlaneOverrideStatus {
        conditions: previous.map(|p| p.conditions.clone()).unwrap_or_default(),
        observed_generation: generation,
        object_refs: results,
    };
    status.set_conditions([condition]);
    status
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod aggregator_tests;
