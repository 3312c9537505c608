// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status persistence for override resources.
//!
//! Reconcilers collect every status change of a pass in a [`StatusUpdater`] and write
//! it with a single merge patch at the end. The patch is skipped when the new status is
//! semantically identical to the current one (ignoring `lastTransitionTime`), so a
//! steady-state reconciliation never triggers another watch event.
//!
//! # Example
//!
//! ```rust,ignore
//! use spaces::conditions::traversed;
//! use spaces::reconcilers::status::StatusUpdater;
//!
//! let mut updater = StatusUpdater::new(&ovr);
//! updater.set_condition(traversed());
//! updater.set_observed_generation(ovr.metadata.generation);
//! updater.apply(&client).await?;
//! ```

use super::retry::retry_api_call;
use crate::conditions::{conditions_equal, deleted, set_condition};
use crate::crd::{
    Condition, Conditioned, ConfigurationOverride, ConfigurationOverrideStatus,
    InControlPlaneOverride, InControlPlaneOverrideStatus,
};
use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

/// Status of an override resource.
pub trait OverrideStatus: Conditioned + Clone + Debug + Default + Serialize {
    /// The generation the status was computed for.
    fn observed_generation(&self) -> Option<i64>;

    /// Record the generation the status was computed for.
    fn set_observed_generation(&mut self, generation: Option<i64>);

    /// Returns true if `self` and `other` differ in anything but transition times.
    fn differs_from(&self, other: &Self) -> bool {
        self.observed_generation() != other.observed_generation()
            || !conditions_equal(self.conditions(), other.conditions())
    }
}

impl OverrideStatus for InControlPlaneOverrideStatus {
    fn observed_generation(&self) -> Option<i64> {
        self.observed_generation
    }

    fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.observed_generation = generation;
    }

    fn differs_from(&self, other: &Self) -> bool {
        self.object_refs != other.object_refs
            || self.observed_generation != other.observed_generation
            || !conditions_equal(&self.conditions, &other.conditions)
    }
}

impl OverrideStatus for ConfigurationOverrideStatus {
    fn observed_generation(&self) -> Option<i64> {
        self.observed_generation
    }

    fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.observed_generation = generation;
    }
}

/// A namespaced override resource with a status subresource.
pub trait OverrideResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned
{
    /// The status type of the resource.
    type Status: OverrideStatus;

    /// The current status, if any was ever written.
    fn current_status(&self) -> Option<&Self::Status>;
}

impl OverrideResource for InControlPlaneOverride {
    type Status = InControlPlaneOverrideStatus;

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }
}

impl OverrideResource for ConfigurationOverride {
    type Status = ConfigurationOverrideStatus;

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }
}

/// Collects status changes for one override and applies them in a single API call.
pub struct StatusUpdater<K: OverrideResource> {
    namespace: String,
    name: String,
    current_status: Option<K::Status>,
    new_status: K::Status,
}

impl<K: OverrideResource> StatusUpdater<K> {
    /// Create an updater seeded with the resource's current status.
    #[must_use]
    pub fn new(resource: &K) -> Self {
        let current_status = resource.current_status().cloned();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: resource.namespace().unwrap_or_default(),
            name: resource.name_any(),
            current_status,
            new_status,
        }
    }

    /// Update or add a condition (in-memory only, no API call).
    pub fn set_condition(&mut self, condition: Condition) {
        set_condition(self.new_status.conditions_mut(), condition);
    }

    /// Replace the whole status (in-memory only, no API call).
    pub fn set_status(&mut self, status: K::Status) {
        self.new_status = status;
    }

    /// Set the observed generation (in-memory only, no API call).
    pub fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.new_status.set_observed_generation(generation);
    }

    /// Mark the override as deleted at `generation` (in-memory only, no API call).
    ///
    /// Used when a deletion finds nothing left to release.
    pub fn set_deleted(&mut self, generation: Option<i64>) {
        self.set_condition(deleted());
        self.set_observed_generation(generation);
    }

    /// The status that [`StatusUpdater::apply`] would write.
    #[must_use]
    pub fn status(&self) -> &K::Status {
        &self.new_status
    }

    /// The status the resource carried when the updater was created.
    #[must_use]
    pub fn previous(&self) -> Option<&K::Status> {
        self.current_status.as_ref()
    }

    /// Returns true if the new status differs semantically from the current one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => current.differs_from(&self.new_status),
        }
    }

    /// Write the collected status with a merge patch on the status subresource.
    ///
    /// Skips the call when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails after retries.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        let kind = K::kind(&());
        if !self.has_changes() {
            debug!(
                kind = %kind,
                namespace = %self.namespace,
                name = %self.name,
                "Status unchanged, skipping update"
            );
            return Ok(());
        }

        let api: Api<K> = Api::namespaced(client.clone(), &self.namespace);
        let params = PatchParams::default();
        let patch = Patch::Merge(json!({ "status": self.new_status }));

        retry_api_call(
            || api.patch_status(&self.name, &params, &patch),
            &format!("patch status of {kind} {}/{}", self.namespace, self.name),
        )
        .await?;

        debug!(
            kind = %kind,
            namespace = %self.namespace,
            name = %self.name,
            conditions = self.new_status.conditions().len(),
            "Updated status"
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
