// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic override controller implementation.
//!
//! Both override kinds share the same controller loop: watch the kind cluster-wide,
//! run its reconciler, record metrics and requeue based on readiness. Only the
//! reconcile function differs, which [`OverrideKind`] abstracts over.

use crate::constants::{
    ERROR_REQUEUE_DURATION_SECS, KIND_CONFIGURATION_OVERRIDE, KIND_IN_CONTROL_PLANE_OVERRIDE,
};
use crate::context::{Context, Settings};
use crate::crd::{ConfigurationOverride, InControlPlaneOverride};
use crate::metrics;
use crate::reconcilers::status::OverrideResource;
use crate::reconcilers::{
    reconcile_configuration_override, reconcile_in_control_plane_override, Readiness,
};
use anyhow::Result;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::ResourceExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// An override kind that can be run by [`run_override_controller`].
pub trait OverrideKind: OverrideResource + Serialize + Send + Sync + 'static {
    /// The kind, used as metric label.
    const KIND: &'static str;

    /// Reconcile one override.
    fn reconcile(
        context: Arc<Context>,
        resource: Self,
    ) -> impl Future<Output = Result<Readiness>> + Send;
}

impl OverrideKind for InControlPlaneOverride {
    const KIND: &'static str = KIND_IN_CONTROL_PLANE_OVERRIDE;

    fn reconcile(
        context: Arc<Context>,
        resource: Self,
    ) -> impl Future<Output = Result<Readiness>> + Send {
        reconcile_in_control_plane_override(context, resource)
    }
}

impl OverrideKind for ConfigurationOverride {
    const KIND: &'static str = KIND_CONFIGURATION_OVERRIDE;

    fn reconcile(
        context: Arc<Context>,
        resource: Self,
    ) -> impl Future<Output = Result<Readiness>> + Send {
        reconcile_configuration_override(context, resource)
    }
}

/// Requeue action for a completed reconciliation.
///
/// Released overrides are about to disappear and wait for the next change.
#[must_use]
pub fn requeue_action(readiness: Readiness, settings: &Settings) -> Action {
    match readiness {
        Readiness::Ready => Action::requeue(settings.requeue_ready),
        Readiness::NotReady => Action::requeue(settings.requeue_not_ready),
        Readiness::Released => Action::await_change(),
    }
}

/// Error policy for override controllers.
///
/// Returns an action to requeue the resource after a delay when reconciliation fails.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy<T: OverrideKind>(resource: Arc<T>, err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    error!(
        error = %err,
        kind = T::KIND,
        namespace = %resource.namespace().unwrap_or_default(),
        name = %resource.name_any(),
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    metrics::record_reconciliation_requeue(T::KIND, "error");
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

/// Run a generic override controller.
///
/// # Errors
///
/// Returns an error if the controller fails to start or encounters a fatal error.
pub async fn run_override_controller<T: OverrideKind>(context: Arc<Context>) -> Result<()> {
    info!("Starting {} controller", T::KIND);

    let api = Api::<T>::all(context.client.clone());

    Controller::new(api, WatcherConfig::default().any_semantic())
        .run(reconcile_wrapper::<T>, error_policy::<T>, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Generic reconciliation wrapper: timing, metrics and readiness-based requeue.
async fn reconcile_wrapper<T: OverrideKind>(
    resource: Arc<T>,
    context: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let result = T::reconcile(context.clone(), (*resource).clone()).await;
    let duration = start.elapsed();

    match result {
        Ok(readiness) => {
            metrics::record_reconciliation_success(T::KIND, duration);
            info!(
                "Successfully reconciled {}: {}/{}",
                T::KIND,
                resource.namespace().unwrap_or_default(),
                resource.name_any()
            );
            if readiness == Readiness::NotReady {
                metrics::record_reconciliation_requeue(T::KIND, "not_ready");
            }
            debug!(kind = T::KIND, readiness = ?readiness, "Requeueing based on readiness");
            Ok(requeue_action(readiness, &context.settings))
        }
        Err(e) => {
            metrics::record_reconciliation_error(T::KIND, duration);
            error!(
                "Failed to reconcile {} {}/{}: {:#}",
                T::KIND,
                resource.namespace().unwrap_or_default(),
                resource.name_any(),
                e
            );
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "override_controller_tests.rs"]
mod override_controller_tests;
