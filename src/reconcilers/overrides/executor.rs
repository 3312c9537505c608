// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Patch execution.
//!
//! Applies an intent to each discovered object with server-side apply and hands every
//! attempt to the classifier. The executor performs no interpretation of errors and
//! never retries: the invoking control loop decides when to run the next pass.

use super::cancellable;
use super::classifier::classify;
use super::store::{ApplyIntent, ObjectStore};
use super::walker::VisitedObject;
use crate::crd::{ObjectReference, TypedObjectReference};
use crate::override_errors::{ObjectStoreError, TraversalError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Server-side apply `intent` to one object and return its UID.
///
/// The apply is bounded by `timeout`; a timeout is reported as
/// [`ObjectStoreError::Timeout`].
///
/// # Errors
///
/// Returns the store error verbatim.
pub async fn apply(
    store: &dyn ObjectStore,
    reference: &TypedObjectReference,
    intent: &ApplyIntent,
    timeout: Duration,
) -> Result<String, ObjectStoreError> {
    tokio::time::timeout(timeout, store.apply(reference, intent))
        .await
        .unwrap_or_else(|_| {
            Err(ObjectStoreError::Timeout {
                operation: "apply",
                target: reference.to_string(),
                timeout,
            })
        })
}

/// Apply `intent` to every visited object in order and classify each attempt.
///
/// Objects whose fetch failed during the walk are classified with that error and not
/// applied, since applying would create them.
///
/// # Errors
///
/// Returns [`TraversalError::Cancelled`] if `cancel` fires before every object has
/// been classified.
pub async fn execute(
    store: &dyn ObjectStore,
    objects: Vec<VisitedObject>,
    intent: &ApplyIntent,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<ObjectReference>, TraversalError> {
    let mut results = Vec::with_capacity(objects.len());

    for object in objects {
        if let Some(err) = &object.fetch_error {
            results.push(classify(object.reference, object.uid, Some(err)));
            continue;
        }

        let outcome = cancellable(cancel, apply(store, &object.reference, intent, timeout)).await?;
        let result = match outcome {
            Ok(uid) => classify(object.reference, Some(uid), None),
            Err(err) => classify(object.reference, object.uid, Some(&err)),
        };
        debug!(result = %result, "Classified patch outcome");
        results.push(result);
    }

    Ok(results)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod executor_tests;
