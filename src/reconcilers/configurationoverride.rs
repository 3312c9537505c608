// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ConfigurationOverride` reconciliation logic.
//!
//! A `ConfigurationOverride` carries a metadata-only patch and a target whose kind may
//! be qualified by the `managed` category. The target is resolved to a concrete kind
//! first, then the same engine as for `InControlPlaneOverride` runs. Only the readiness
//! condition is kept in status; per-object outcomes are logged and counted.

use super::finalizers::{ensure_finalizer, has_finalizer, is_deleting, remove_finalizer};
use super::overrides::aggregator::{readiness, unwound};
use super::overrides::run_pass;
use super::overrides::store::{ApplyIntent, ObjectStore};
use super::overrides::{PassOutcome, PassSettings};
use super::status::StatusUpdater;
use super::{pass_failed, Deletion, Readiness};
use crate::conditions::{deleted, invalid_spec, set_condition};
use crate::constants::{CONFIGURATION_OVERRIDE_FINALIZER, KIND_CONFIGURATION_OVERRIDE};
use crate::context::Context;
use crate::crd::{
    Condition, ConfigurationOverride, ConfigurationOverrideStatus, PatchIntent,
    TypedObjectReference,
};
use crate::metrics;
use crate::override_errors::TraversalError;
use anyhow::Result;
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconciles a `ConfigurationOverride`.
///
/// # Errors
///
/// Returns an error if the control plane is unavailable, the target cannot be resolved
/// or fetched, the pass is cancelled, or status and finalizer updates fail.
pub async fn reconcile_configuration_override(
    ctx: Arc<Context>,
    ovr: ConfigurationOverride,
) -> Result<Readiness> {
    let namespace = ovr.namespace().unwrap_or_default();
    let name = ovr.name_any();

    info!("Reconciling ConfigurationOverride: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?ovr.metadata.generation,
        control_plane = %ovr.spec.control_plane,
        target = %ovr.spec.target.reference(),
        category = ?ovr.spec.target.category,
        mode = %ovr.spec.propagation_mode,
        "Starting ConfigurationOverride reconciliation"
    );

    if is_deleting(&ovr) {
        return delete_configuration_override(&ctx, &ovr).await;
    }

    let mut updater = StatusUpdater::new(&ovr);

    if let Err(e) = ovr.spec.validate() {
        warn!(namespace = %namespace, name = %name, error = %e, "Invalid ConfigurationOverride spec");
        metrics::record_error(KIND_CONFIGURATION_OVERRIDE, "invalid_spec");
        updater.set_condition(invalid_spec(&e.to_string()));
        updater.set_observed_generation(ovr.metadata.generation);
        updater.apply(&ctx.client).await?;
        return Ok(Readiness::NotReady);
    }

    ensure_finalizer(&ctx.client, &ovr, CONFIGURATION_OVERRIDE_FINALIZER).await?;

    let cancel = ctx.shutdown.child_token();
    let status = async {
        let store = ctx.object_store(&namespace, &ovr.spec.control_plane).await?;
        patch_hierarchy(&store, &ovr, &ctx.settings.pass, &cancel).await
    }
    .await
    .map_err(|e| pass_failed(KIND_CONFIGURATION_OVERRIDE, &namespace, &name, e))?;

    let readiness = Readiness::of(&status.conditions);
    updater.set_status(status);
    updater.apply(&ctx.client).await?;

    Ok(readiness)
}

/// Release every field the override claimed, then drop the finalizer.
async fn delete_configuration_override(
    ctx: &Context,
    ovr: &ConfigurationOverride,
) -> Result<Readiness> {
    let namespace = ovr.namespace().unwrap_or_default();
    let name = ovr.name_any();

    if !has_finalizer(ovr, CONFIGURATION_OVERRIDE_FINALIZER) {
        debug!(namespace = %namespace, name = %name, "No finalizer, nothing to release");
        return Ok(Readiness::Released);
    }

    info!("Releasing ConfigurationOverride: {}/{}", namespace, name);

    let control_plane = &ovr.spec.control_plane;
    let control_plane_exists = !control_plane.is_empty()
        && !ovr.spec.target.kind.is_empty()
        && ctx
            .find_control_plane(&namespace, control_plane)
            .await
            .map_err(|e| pass_failed(KIND_CONFIGURATION_OVERRIDE, &namespace, &name, e))?
            .is_some();

    let mut updater = StatusUpdater::new(ovr);
    if !control_plane_exists {
        info!(
            namespace = %namespace,
            name = %name,
            control_plane = %control_plane,
            "ControlPlane no longer exists, nothing to release"
        );
        updater.set_deleted(ovr.metadata.generation);
        updater.apply(&ctx.client).await?;
        remove_finalizer(&ctx.client, ovr, CONFIGURATION_OVERRIDE_FINALIZER).await?;
        return Ok(Readiness::Released);
    }

    let cancel = ctx.shutdown.child_token();
    let deletion = async {
        let store = ctx.object_store(&namespace, control_plane).await?;
        release_hierarchy(&store, ovr, &ctx.settings.pass, &cancel).await
    }
    .await
    .map_err(|e| pass_failed(KIND_CONFIGURATION_OVERRIDE, &namespace, &name, e))?;

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
            info!(namespace = %namespace, name = %name, "Target no longer exists");
            updater.set_deleted(ovr.metadata.generation);
        }
    }
    updater.apply(&ctx.client).await?;

    remove_finalizer(&ctx.client, ovr, CONFIGURATION_OVERRIDE_FINALIZER).await?;
    Ok(Readiness::Released)
}

/// Resolve the override's target to a concrete kind.
///
/// # Errors
///
/// Returns [`TraversalError::Resolve`] if the kind is unknown or ambiguous.
pub async fn resolve_target(
    store: &dyn ObjectStore,
    ovr: &ConfigurationOverride,
) -> Result<TypedObjectReference, TraversalError> {
    store
        .resolve_target(&ovr.spec.target)
        .await
        .map_err(|source| TraversalError::Resolve {
            target: ovr.spec.target.reference().to_string(),
            source,
        })
}

/// Propagate the override's patch through its target hierarchy and build the new
/// status.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or fetched, or the pass is
/// cancelled.
pub async fn patch_hierarchy(
    store: &dyn ObjectStore,
    ovr: &ConfigurationOverride,
    settings: &PassSettings,
    cancel: &CancellationToken,
) -> Result<ConfigurationOverrideStatus, TraversalError> {
    let root = resolve_target(store, ovr).await?;
    let outcome = run_pass(
        store,
        &root,
        ovr.spec.propagation_mode,
        &ApplyIntent::Patch(PatchIntent::from(&ovr.spec.patch)),
        settings,
        cancel,
        KIND_CONFIGURATION_OVERRIDE,
    )
    .await?;

    log_failures(ovr, &outcome);
    let condition = readiness(&outcome.results, outcome.truncated_at);
    Ok(status_with(ovr, condition))
}

/// Apply an empty intent to the override's target hierarchy, releasing every field
/// the override's field manager owns.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or the root cannot be fetched,
/// for any reason but absence, or if the pass is cancelled.
pub async fn release_hierarchy(
    store: &dyn ObjectStore,
    ovr: &ConfigurationOverride,
    settings: &PassSettings,
    cancel: &CancellationToken,
) -> Result<Deletion<ConfigurationOverrideStatus>, TraversalError> {
    let root = match resolve_target(store, ovr).await {
        Ok(root) => root,
        Err(e) if e.is_root_absent() => return Ok(Deletion::TargetGone),
        Err(e) => return Err(e),
    };
    let outcome = match run_pass(
        store,
        &root,
        ovr.spec.propagation_mode,
        &ApplyIntent::Release,
        settings,
        cancel,
        KIND_CONFIGURATION_OVERRIDE,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) if e.is_root_absent() => return Ok(Deletion::TargetGone),
        Err(e) => return Err(e),
    };

    log_failures(ovr, &outcome);
    if unwound(&outcome.results) {
        Ok(Deletion::Unwound(status_with(ovr, deleted())))
    } else {
        let condition = readiness(&outcome.results, outcome.truncated_at);
        Ok(Deletion::Pending(status_with(ovr, condition)))
    }
}

fn status_with(ovr: &ConfigurationOverride, condition: Condition) -> ConfigurationOverrideStatus {
    let mut status = ConfigurationOverrideStatus {
        conditions: ovr
            .status
            .as_ref()
            .map(|s| s.conditions.clone())
            .unwrap_or_default(),
        observed_generation: ovr.metadata.generation,
    };
    set_condition(&mut status.conditions, condition);
    status
}

// The status has no room for per-object outcomes, so unresolved ones are logged.
fn log_failures(ovr: &ConfigurationOverride, outcome: &PassOutcome) {
    for result in outcome.results.iter().filter(|r| !r.is_resolved()) {
        warn!(
            namespace = %ovr.namespace().unwrap_or_default(),
            name = %ovr.name_any(),
            object = %result,
            "Object not patched"
        );
    }
}

#[cfg(test)]
#[path = "configurationoverride_tests.rs"]
mod configurationoverride_tests;
