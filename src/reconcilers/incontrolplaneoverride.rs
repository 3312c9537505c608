// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `InControlPlaneOverride` reconciliation logic.
//!
//! Every reconciliation re-walks the target hierarchy inside the control plane,
//! server-side applies the patch to each object and replaces `status.objectRefs` with
//! the outcomes of the pass. A pass-level failure (unreachable control plane, missing
//! root, cancellation) leaves the status untouched and is retried by the controller.

use super::finalizers::{ensure_finalizer, has_finalizer, is_deleting, remove_finalizer};
use super::overrides::aggregator::{aggregate, aggregate_deletion, unwound};
use super::overrides::run_pass;
use super::overrides::store::{ApplyIntent, ObjectStore};
use super::overrides::PassSettings;
use super::status::StatusUpdater;
use super::{pass_failed, Deletion, Readiness};
use crate::conditions::invalid_spec;
use crate::constants::{IN_CONTROL_PLANE_OVERRIDE_FINALIZER, KIND_IN_CONTROL_PLANE_OVERRIDE};
use crate::context::Context;
use crate::crd::{InControlPlaneOverride, InControlPlaneOverrideStatus};
use crate::metrics;
use crate::override_errors::TraversalError;
use anyhow::Result;
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconciles an `InControlPlaneOverride`.
///
/// # Errors
///
/// Returns an error if the control plane is unavailable, the target cannot be fetched,
/// the pass is cancelled, or status and finalizer updates fail.
pub async fn reconcile_in_control_plane_override(
    ctx: Arc<Context>,
    ovr: InControlPlaneOverride,
) -> Result<Readiness> {
    let namespace = ovr.namespace().unwrap_or_default();
    let name = ovr.name_any();

    info!("Reconciling InControlPlaneOverride: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?ovr.metadata.generation,
        control_plane = %ovr.spec.control_plane_name,
        target = %ovr.spec.target,
        mode = %ovr.spec.propagation_mode,
        "Starting InControlPlaneOverride reconciliation"
    );

    if is_deleting(&ovr) {
        return delete_in_control_plane_override(&ctx, &ovr).await;
    }

    let mut updater = StatusUpdater::new(&ovr);

    if let Err(e) = ovr.spec.validate() {
        warn!(namespace = %namespace, name = %name, error = %e, "Invalid InControlPlaneOverride spec");
        metrics::record_error(KIND_IN_CONTROL_PLANE_OVERRIDE, "invalid_spec");
        updater.set_condition(invalid_spec(&e.to_string()));
        updater.set_observed_generation(ovr.metadata.generation);
        updater.apply(&ctx.client).await?;
        return Ok(Readiness::NotReady);
    }

    ensure_finalizer(&ctx.client, &ovr, IN_CONTROL_PLANE_OVERRIDE_FINALIZER).await?;

    let cancel = ctx.shutdown.child_token();
    let status = async {
        let store = ctx
            .object_store(&namespace, &ovr.spec.control_plane_name)
            .await?;
        patch_hierarchy(&store, &ovr, &ctx.settings.pass, &cancel).await
    }
    .await
    .map_err(|e| pass_failed(KIND_IN_CONTROL_PLANE_OVERRIDE, &namespace, &name, e))?;

    let readiness = Readiness::of(&status.conditions);
    updater.set_status(status);
    updater.apply(&ctx.client).await?;

    Ok(readiness)
}

/// Release every field the override claimed, then drop the finalizer.
async fn delete_in_control_plane_override(
    ctx: &Context,
    ovr: &InControlPlaneOverride,
) -> Result<Readiness> {
    let namespace = ovr.namespace().unwrap_or_default();
    let name = ovr.name_any();

    if !has_finalizer(ovr, IN_CONTROL_PLANE_OVERRIDE_FINALIZER) {
        debug!(namespace = %namespace, name = %name, "No finalizer, nothing to release");
        return Ok(Readiness::Released);
    }

    info!("Releasing InControlPlaneOverride: {}/{}", namespace, name);

    let control_plane = &ovr.spec.control_plane_name;
    let control_plane_exists = !control_plane.is_empty()
        && !ovr.spec.target.kind.is_empty()
        && ctx
            .find_control_plane(&namespace, control_plane)
            .await
            .map_err(|e| pass_failed(KIND_IN_CONTROL_PLANE_OVERRIDE, &namespace, &name, e))?
            .is_some();

    let mut updater = StatusUpdater::new(ovr);
    if control_plane_exists {
        let cancel = ctx.shutdown.child_token();
        let deletion = async {
            let store = ctx.object_store(&namespace, control_plane).await?;
            release_hierarchy(&store, ovr, &ctx.settings.pass, &cancel).await
        }
        .await
        .map_err(|e| pass_failed(KIND_IN_CONTROL_PLANE_OVERRIDE, &namespace, &name, e))?;

        match deletion {
            Deletion::Unwound(status) => updater.set_status(status),
            Deletion::Pending(status) => {
                warn!(
                    namespace = %namespace,
                    name = %name,
                    "Not every object released its fields, keeping finalizer"
                );
                updater.set_status(status);
                updater.apply(&ctx.client).await?;
                return Ok(Readiness::NotReady);
            }
            Deletion::TargetGone => {
                info!(namespace = %namespace, name = %name, target = %ovr.spec.target, "Target no longer exists");
                updater.set_deleted(ovr.metadata.generation);
            }
        }
    } else {
        info!(
            namespace = %namespace,
            name = %name,
            control_plane = %control_plane,
            "ControlPlane no longer exists, nothing to release"
        );
        updater.set_deleted(ovr.metadata.generation);
    }

    // Deleted is persisted before the finalizer goes, while the resource still exists.
    updater.apply(&ctx.client).await?;
    remove_finalizer(&ctx.client, ovr, IN_CONTROL_PLANE_OVERRIDE_FINALIZER).await?;
    Ok(Readiness::Released)
}

/// Propagate the override's patch through its target hierarchy and build the new
/// status.
///
/// # Errors
///
/// Returns an error if the root cannot be fetched or the pass is cancelled.
pub async fn patch_hierarchy(
    store: &dyn ObjectStore,
    ovr: &InControlPlaneOverride,
    settings: &PassSettings,
    cancel: &CancellationToken,
) -> Result<InControlPlaneOverrideStatus, TraversalError> {
    let outcome = run_pass(
        store,
        &ovr.spec.target,
        ovr.spec.propagation_mode,
        &ApplyIntent::Patch(ovr.spec.patch.clone()),
        settings,
        cancel,
        KIND_IN_CONTROL_PLANE_OVERRIDE,
    )
    .await?;

    Ok(aggregate(
        ovr.status.as_ref(),
        outcome,
        ovr.metadata.generation,
    ))
}

/// Apply an empty intent to the override's target hierarchy, releasing every field
/// the override's field manager owns.
///
/// # Errors
///
/// Returns an error if the root cannot be fetched for any reason but absence, or the
/// pass is cancelled.
pub async fn release_hierarchy(
    store: &dyn ObjectStore,
    ovr: &InControlPlaneOverride,
    settings: &PassSettings,
    cancel: &CancellationToken,
) -> Result<Deletion<InControlPlaneOverrideStatus>, TraversalError> {
    let outcome = match run_pass(
        store,
        &ovr.spec.target,
        ovr.spec.propagation_mode,
        &ApplyIntent::Release,
        settings,
        cancel,
        KIND_IN_CONTROL_PLANE_OVERRIDE,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) if e.is_root_absent() => return Ok(Deletion::TargetGone),
        Err(e) => return Err(e),
    };

    let released = unwound(&outcome.results);
    let status = aggregate_deletion(ovr.status.as_ref(), outcome, ovr.metadata.generation);

    Ok(if released {
        Deletion::Unwound(status)
    } else {
        Deletion::Pending(status)
    })
}

#[cfg(test)]
#[path = "incontrolplaneoverride_tests.rs"]
mod incontrolplaneoverride_tests;
