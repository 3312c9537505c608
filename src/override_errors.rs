// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the override engine.
//!
//! This module provides:
//! - [`ApiStatusError`]: a structured API server status (code, reason, message, causes)
//! - [`ObjectStoreError`]: failures of a single fetch or apply against a control plane
//! - [`TraversalError`]: pass-level failures that abort a reconciliation pass
//! - [`PatchValidationError`] and [`SpecValidationError`]: invalid override specs
//!
//! Per-object errors never abort a pass. They are classified into the patch outcome
//! taxonomy by [`crate::reconcilers::overrides::classifier`].

use crate::constants::{
    CAUSE_TYPE_FIELD_MANAGER_CONFLICT, STATUS_REASON_CONFLICT, STATUS_REASON_INTERNAL_ERROR,
    STATUS_REASON_NOT_FOUND,
};
use std::time::Duration;
use thiserror::Error;

/// Prefix of the message the API server returns for server-side apply conflicts.
const APPLY_CONFLICT_MESSAGE_PREFIX: &str = "Apply failed with";

/// HTTP status code of a not-found API status.
const HTTP_NOT_FOUND: u16 = 404;

/// HTTP status code of a conflicting write.
const HTTP_CONFLICT: u16 = 409;

/// HTTP status code of an internal server error.
const HTTP_INTERNAL_SERVER_ERROR: u16 = 500;

/// One cause attached to an API status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusCause {
    /// Machine-readable cause type, e.g. `FieldManagerConflict`.
    pub cause_type: String,
    /// Human-readable description of the cause.
    pub message: String,
    /// Field path the cause refers to, if any.
    pub field: String,
}

/// A structured error returned by the Kubernetes API server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiStatusError {
    /// HTTP status code.
    pub code: u16,
    /// Machine-readable status reason, e.g. `NotFound` or `InternalError`.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// Detailed causes, when the server supplied any.
    pub causes: Vec<StatusCause>,
}

impl ApiStatusError {
    /// Build a status error without causes.
    #[must_use]
    pub fn new(code: u16, reason: &str, message: &str) -> Self {
        Self {
            code,
            reason: reason.to_string(),
            message: message.to_string(),
            causes: Vec::new(),
        }
    }

    /// Attach a cause.
    #[must_use]
    pub fn with_cause(mut self, cause_type: &str, message: &str) -> Self {
        self.causes.push(StatusCause {
            cause_type: cause_type.to_string(),
            message: message.to_string(),
            field: String::new(),
        });
        self
    }

    /// A `NotFound` status for the named object.
    #[must_use]
    pub fn not_found(resource: &str, name: &str) -> Self {
        Self::new(
            HTTP_NOT_FOUND,
            STATUS_REASON_NOT_FOUND,
            &format!("{resource} \"{name}\" not found"),
        )
    }

    /// An `InternalError` status with the given message.
    #[must_use]
    pub fn internal(message: &str) -> Self {
        Self::new(
            HTTP_INTERNAL_SERVER_ERROR,
            STATUS_REASON_INTERNAL_ERROR,
            message,
        )
    }

    /// A server-side apply conflict carrying a `FieldManagerConflict` cause.
    #[must_use]
    pub fn apply_conflict(message: &str) -> Self {
        Self::new(HTTP_CONFLICT, STATUS_REASON_CONFLICT, message)
            .with_cause(CAUSE_TYPE_FIELD_MANAGER_CONFLICT, message)
    }

    /// Returns true if any cause has the given type.
    #[must_use]
    pub fn has_cause(&self, cause_type: &str) -> bool {
        self.causes.iter().any(|c| c.cause_type == cause_type)
    }

    /// Returns true for a `NotFound` status.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.reason == STATUS_REASON_NOT_FOUND
    }

    /// Returns true for an `InternalError` status.
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        self.reason == STATUS_REASON_INTERNAL_ERROR
    }
}

/// Errors of a single object operation against a control plane.
#[derive(Error, Debug, Clone)]
pub enum ObjectStoreError {
    /// The API server answered with a structured status.
    #[error(transparent)]
    Api(#[from] ApiStatusError),

    /// The request never produced a structured answer (connection, TLS, decoding).
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation did not complete within the per-object timeout.
    #[error("{operation} of {target} timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// `get` or `apply`
        operation: &'static str,
        /// Display form of the object reference
        target: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Discovery could not map the kind to a served resource.
    #[error("kind '{kind}' is not served in API group '{group}'")]
    UnknownKind {
        /// API group searched
        group: String,
        /// Kind searched for
        kind: String,
    },

    /// More than one resource of the category matches the kind.
    #[error("kind '{kind}' is ambiguous in category '{category}': {}", .candidates.join(", "))]
    AmbiguousKind {
        /// Kind searched for
        kind: String,
        /// Category searched
        category: String,
        /// Matching `group/version` candidates
        candidates: Vec<String>,
    },

    /// The object returned by the API server is unusable.
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl ObjectStoreError {
    /// The structured API status, if the error carries one.
    #[must_use]
    pub fn api_status(&self) -> Option<&ApiStatusError> {
        match self {
            Self::Api(status) => Some(status),
            _ => None,
        }
    }

    /// Returns true for a structured `NotFound` status.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.api_status().is_some_and(ApiStatusError::is_not_found)
    }

    /// Returns true if the object does not exist or its kind is no longer served.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.is_not_found() || matches!(self, Self::UnknownKind { .. })
    }
}

impl From<kube::core::Status> for ApiStatusError {
    fn from(status: kube::core::Status) -> Self {
        let mut causes: Vec<StatusCause> = status
            .details
            .into_iter()
            .flat_map(|details| details.causes)
            .map(|cause| StatusCause {
                cause_type: cause.reason,
                message: cause.message,
                field: cause.field,
            })
            .collect();

        // Statuses relayed without details still identify an apply conflict by message.
        if causes.is_empty()
            && status.code == HTTP_CONFLICT
            && status.message.starts_with(APPLY_CONFLICT_MESSAGE_PREFIX)
        {
            causes.push(StatusCause {
                cause_type: CAUSE_TYPE_FIELD_MANAGER_CONFLICT.to_string(),
                message: status.message.clone(),
                field: String::new(),
            });
        }

        Self {
            code: status.code,
            reason: status.reason,
            message: status.message,
            causes,
        }
    }
}

impl From<kube::Error> for ObjectStoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(status) => Self::Api((*status).into()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Errors that abort a whole reconciliation pass without persisting status.
#[derive(Error, Debug)]
pub enum TraversalError {
    /// The root of the hierarchy could not be fetched.
    #[error("cannot fetch target {target}: {source}")]
    RootFetch {
        /// Display form of the target reference
        target: String,
        /// Underlying store error
        #[source]
        source: ObjectStoreError,
    },

    /// The target could not be resolved to a concrete kind.
    #[error("cannot resolve target {target}: {source}")]
    Resolve {
        /// Display form of the target reference
        target: String,
        /// Underlying store error
        #[source]
        source: ObjectStoreError,
    },

    /// The pass was cancelled before every discovered object was classified.
    #[error("traversal cancelled")]
    Cancelled,

    /// The control plane, or a client for it, is not available.
    #[error("control plane {namespace}/{name} unavailable: {reason}")]
    ControlPlaneUnavailable {
        /// Namespace of the `ControlPlane`
        namespace: String,
        /// Name of the `ControlPlane`
        name: String,
        /// Why no client could be built
        reason: String,
    },
}

impl TraversalError {
    /// Metric label of the error category.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::RootFetch { .. } => "root_fetch",
            Self::Resolve { .. } => "resolve",
            Self::Cancelled => "cancelled",
            Self::ControlPlaneUnavailable { .. } => "control_plane_unavailable",
        }
    }

    /// Returns true if the root of the hierarchy is gone, including when its kind is no
    /// longer served by the control plane.
    #[must_use]
    pub fn is_root_absent(&self) -> bool {
        match self {
            Self::RootFetch { source, .. } => source.is_absent(),
            Self::Resolve { source, .. } => matches!(source, ObjectStoreError::UnknownKind { .. }),
            _ => false,
        }
    }
}

/// Reasons a patch intent is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchValidationError {
    /// Neither `metadata` nor `spec` is set.
    #[error("patch must set at least one of metadata or spec")]
    Empty,

    /// `metadata.annotations` is present but empty.
    #[error("patch metadata must set at least one annotation")]
    NoAnnotations,

    /// More annotations than the allow-list holds.
    #[error("patch metadata sets {count} annotations, at most {max} are allowed")]
    TooManyAnnotations {
        /// Number of annotations in the patch
        count: usize,
        /// Allow-list size
        max: usize,
    },

    /// An annotation outside the allow-list.
    #[error("annotation '{key}' may not be patched")]
    AnnotationNotAllowed {
        /// The rejected key
        key: String,
    },
}

/// Reasons an override or control plane spec is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecValidationError {
    /// The control plane name is empty.
    #[error("control plane name must not be empty")]
    MissingControlPlane,

    /// The target kind is empty.
    #[error("target kind must not be empty")]
    MissingTargetKind,

    /// The target category is not supported.
    #[error("unsupported target category '{category}', only 'managed' is supported")]
    UnsupportedCategory {
        /// The rejected category
        category: String,
    },

    /// Auto-upgrades are disabled without pinning a Crossplane version.
    #[error("\"spec.crossplane.version\" must be set when \"spec.crossplane.autoUpgrade.channel\" is \"None\"")]
    MissingCrossplaneVersion,

    /// The patch is invalid.
    #[error(transparent)]
    Patch(#[from] PatchValidationError),
}

#[cfg(test)]
#[path = "override_errors_tests.rs"]
mod override_errors_tests;
