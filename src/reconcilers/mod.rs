// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for override resources.
//!
//! Each reconciler propagates one override into a control plane with the hierarchical
//! override engine in [`overrides`] and reports the outcome in the override's status.
//!
//! # Reconciliation Architecture
//!
//! 1. **Validate** - Reject invalid specs with an `InvalidSpec` condition
//! 2. **Finalize** - Add the finalizer before any field is claimed in a control plane
//! 3. **Propagate** - Walk the target hierarchy and server-side apply the patch
//! 4. **Status** - Persist the per-object outcomes and the readiness condition
//!
//! On deletion the hierarchy is walked again and every field the override claimed is
//! released before the finalizer is removed.
//!
//! # Available Reconcilers
//!
//! - [`reconcile_in_control_plane_override`] - Propagates an `InControlPlaneOverride`
//! - [`reconcile_configuration_override`] - Propagates a `ConfigurationOverride`
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use spaces::context::Context;
//! use spaces::crd::InControlPlaneOverride;
//! use spaces::reconcilers::reconcile_in_control_plane_override;
//! use std::sync::Arc;
//!
//! async fn reconcile(ctx: Arc<Context>, ovr: InControlPlaneOverride) -> anyhow::Result<()> {
//!     let readiness = reconcile_in_control_plane_override(ctx, ovr).await?;
//!     println!("{readiness:?}");
//!     Ok(())
//! }
//! ```

pub mod configurationoverride;
pub mod finalizers;
pub mod incontrolplaneoverride;
pub mod overrides;
pub mod retry;
pub mod status;

pub use configurationoverride::reconcile_configuration_override;
pub use incontrolplaneoverride::reconcile_in_control_plane_override;

use crate::conditions::find_condition;
use crate::crd::Condition;
use crate::metrics;
use crate::override_errors::TraversalError;
use crate::status_reasons::{CONDITION_STATUS_TRUE, CONDITION_TYPE_READY};
use tracing::error;

/// Where an override stands after a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The whole hierarchy carries the patch.
    Ready,
    /// At least one object is unresolved, or the spec is invalid.
    NotReady,
    /// Every claimed field has been released and the finalizer removed.
    Released,
}

impl Readiness {
    /// Readiness reported by a list of conditions.
    #[must_use]
    pub fn of(conditions: &[Condition]) -> Self {
        if find_condition(conditions, CONDITION_TYPE_READY)
            .is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
        {
            Self::Ready
        } else {
            Self::NotReady
        }
    }
}

/// Result of a deletion pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Deletion<S> {
    /// Every object was released, the status reports `Deleted`.
    Unwound(S),
    /// Some objects still hold fields claimed by the override.
    Pending(S),
    /// The root of the hierarchy no longer exists.
    TargetGone,
}

/// Log and count a pass-level failure before handing it to the controller.
pub(crate) fn pass_failed(kind: &str, namespace: &str, name: &str, err: TraversalError) -> anyhow::Error {
    error!(
        kind,
        namespace,
        name,
        error = %err,
        "Override pass failed, status left unchanged"
    );
    metrics::record_error(kind, err.error_type());
    err.into()
}
