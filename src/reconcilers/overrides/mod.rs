// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hierarchical override engine.
//!
//! One reconciliation pass propagates a single patch intent across a graph of related
//! objects inside a control plane:
//!
//! 1. [`walker`] discovers the objects to patch, following ownership upwards or
//!    declared resource references downwards.
//! 2. [`executor`] server-side applies the intent to every discovered object.
//! 3. [`classifier`] labels each attempt `Success`, `Skipped` or `Error`.
//! 4. [`aggregator`] folds the outcomes into the override's status and readiness.
//!
//! Passes are sequential and hold no locks. Per-object failures never abort a pass;
//! only a root fetch failure or cancellation does, and neither persists anything.

pub mod aggregator;
pub mod classifier;
pub mod executor;
pub mod store;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

use crate::crd::{ObjectReference, PropagationMode, TypedObjectReference};
use crate::metrics;
use crate::override_errors::TraversalError;
use std::future::Future;
use std::time::Duration;
use store::{ApplyIntent, ObjectStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walker::TraversalLimits;

/// Bounds applied to one reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassSettings {
    /// Upper bound on the number of objects visited.
    pub limits: TraversalLimits,
    /// Timeout of every single fetch and apply.
    pub per_object_timeout: Duration,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            limits: TraversalLimits::default(),
            per_object_timeout: Duration::from_secs(
                crate::constants::DEFAULT_PER_OBJECT_TIMEOUT_SECS,
            ),
        }
    }
}

/// The classified outcome of one complete pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassOutcome {
    /// One outcome per visited object, root first.
    pub results: Vec<ObjectReference>,
    /// Set to the object limit when the walk stopped before exhausting the hierarchy.
    pub truncated_at: Option<usize>,
}

/// Run `future` unless the pass is cancelled first.
///
/// # Errors
///
/// Returns [`TraversalError::Cancelled`] if `cancel` fires before `future` completes.
pub async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, TraversalError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TraversalError::Cancelled),
        output = future => Ok(output),
    }
}

/// Walk the hierarchy rooted at `root`, apply `intent` to every discovered object and
/// classify each attempt.
///
/// `resource_type` labels the metrics recorded for the pass.
///
/// # Errors
///
/// Returns an error if the root cannot be fetched or the pass is cancelled. No
/// partial outcome is returned in either case.
pub async fn run_pass(
    store: &dyn ObjectStore,
    root: &TypedObjectReference,
    mode: PropagationMode,
    intent: &ApplyIntent,
    settings: &PassSettings,
    cancel: &CancellationToken,
    resource_type: &str,
) -> Result<PassOutcome, TraversalError> {
    debug!(target = %root, mode = %mode, "Starting hierarchy walk");

    let hierarchy = walker::walk(
        store,
        root,
        mode,
        &settings.limits,
        settings.per_object_timeout,
        cancel,
    )
    .await?;

    metrics::record_traversal(resource_type, hierarchy.objects.len(), hierarchy.truncated);

    let results = executor::execute(
        store,
        hierarchy.objects,
        intent,
        settings.per_object_timeout,
        cancel,
    )
    .await?;

    for result in &results {
        metrics::record_object_patch(
            resource_type,
            &result.status.to_string(),
            result.reason.as_ref().map(|r| r.as_str()).unwrap_or_default(),
        );
    }

    info!(
        target = %root,
        mode = %mode,
        objects = results.len(),
        truncated = hierarchy.truncated,
        "Hierarchy pass completed"
    );

    Ok(PassOutcome {
        results,
        truncated_at: hierarchy
            .truncated
            .then_some(settings.limits.max_objects()),
    })
}
