// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Patch outcome classification.
//!
//! Maps the result of one patch attempt into the outcome taxonomy. The checks run in
//! priority order and the first match wins:
//!
//! | Input                                                   | Status    | Reason                |
//! |---------------------------------------------------------|-----------|-----------------------|
//! | no error                                                | `Success` | -                     |
//! | API status with a `FieldManagerConflict` cause          | `Skipped` | `Conflict`            |
//! | `InternalError` matching the undeclared-field message   | `Skipped` | `SchemaMismatch`      |
//! | any other API status                                    | `Error`   | verbatim status reason|
//! | kind no longer served by the control plane              | `Error`   | `NotFound`            |
//! | transport error or timeout                              | `Error`   | unset                 |
//!
//! Every failure records the error text as the outcome message.

use crate::constants::{CAUSE_TYPE_FIELD_MANAGER_CONFLICT, STATUS_REASON_NOT_FOUND};
use crate::crd::{ObjectReference, PatchState, PatchStateReason, TypedObjectReference};
use crate::override_errors::{ApiStatusError, ObjectStoreError};
use regex::Regex;
use std::sync::LazyLock;

/// Message shape of the API server rejecting an apply for a field its schema lacks.
static FIELD_NOT_DECLARED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"failed to create typed patch object.+field not declared in schema")
        .expect("field-not-declared regex is valid")
});

/// Classify one patch attempt.
#[must_use]
pub fn classify(
    reference: TypedObjectReference,
    uid: Option<String>,
    error: Option<&ObjectStoreError>,
) -> ObjectReference {
    match error {
        None => patch_success(reference, uid),
        Some(err) => patch_failure(reference, uid, err),
    }
}

/// Outcome of an object patched successfully.
#[must_use]
pub fn patch_success(reference: TypedObjectReference, uid: Option<String>) -> ObjectReference {
    ObjectReference::new(reference, uid, PatchState::Success)
}

/// Outcome of an object whose patch failed with `err`.
#[must_use]
pub fn patch_failure(
    reference: TypedObjectReference,
    uid: Option<String>,
    err: &ObjectStoreError,
) -> ObjectReference {
    let (status, reason) = match err.api_status() {
        Some(api) if is_field_manager_conflict(api) => {
            (PatchState::Skipped, Some(PatchStateReason::Conflict))
        }
        Some(api) if is_schema_mismatch(api) => {
            (PatchState::Skipped, Some(PatchStateReason::SchemaMismatch))
        }
        Some(api) => (
            PatchState::Error,
            Some(PatchStateReason::from(api.reason.clone())),
        ),
        None if err.is_absent() => (
            PatchState::Error,
            Some(PatchStateReason::from(STATUS_REASON_NOT_FOUND.to_string())),
        ),
        None => (PatchState::Error, None),
    };

    ObjectReference {
        reason,
        message: Some(err.to_string()),
        ..ObjectReference::new(reference, uid, status)
    }
}

/// Another field manager owns a field of the patch.
#[must_use]
pub fn is_field_manager_conflict(status: &ApiStatusError) -> bool {
    status.has_cause(CAUSE_TYPE_FIELD_MANAGER_CONFLICT)
}

/// The object's schema no longer declares a patched field.
///
/// The API server reports this only as an `InternalError`, recognizable by its message.
#[must_use]
pub fn is_schema_mismatch(status: &ApiStatusError) -> bool {
    status.is_internal_error() && FIELD_NOT_DECLARED.is_match(&status.message)
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod classifier_tests;
