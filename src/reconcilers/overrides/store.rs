// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to the objects living inside a control plane.
//!
//! [`ObjectStore`] is the only way the override engine reads or writes cluster state.
//! [`KubeObjectStore`] implements it against a control plane API server with dynamic
//! kube-rs APIs, resolving kinds through discovery and writing with server-side apply.

use crate::crd::{split_api_group, PatchIntent, Target, TypedObjectReference};
use crate::override_errors::ObjectStoreError;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::discovery::{ApiCapabilities, Scope};
use kube::{Api, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// What to apply to one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyIntent {
    /// Claim the fields of the patch.
    Patch(PatchIntent),
    /// Claim no fields, releasing everything previously applied by the field manager.
    Release,
}

impl ApplyIntent {
    /// Render the server-side apply body for one object.
    #[must_use]
    pub fn render(&self, api_version: &str, kind: &str, name: &str, namespace: Option<&str>) -> Value {
        match self {
            Self::Patch(patch) => patch.to_apply_object(api_version, kind, name, namespace),
            Self::Release => PatchIntent::release_object(api_version, kind, name, namespace),
        }
    }
}

/// Read and write access to the objects of one control plane.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Resolve a possibly category-qualified target into a concrete reference.
    ///
    /// Targets without a category are returned unchanged.
    async fn resolve_target(&self, target: &Target)
        -> Result<TypedObjectReference, ObjectStoreError>;

    /// Fetch the referenced object.
    async fn get(&self, reference: &TypedObjectReference)
        -> Result<DynamicObject, ObjectStoreError>;

    /// Server-side apply the intent to the referenced object and return its UID.
    async fn apply(
        &self,
        reference: &TypedObjectReference,
        intent: &ApplyIntent,
    ) -> Result<String, ObjectStoreError>;
}

/// Discovery cache key: group, pinned version and kind.
type DiscoveryKey = (String, Option<String>, String);

/// [`ObjectStore`] backed by a control plane API server.
pub struct KubeObjectStore {
    client: Client,
    field_manager: String,
    resources: Mutex<HashMap<DiscoveryKey, (ApiResource, ApiCapabilities)>>,
}

impl KubeObjectStore {
    /// Create a store writing with the given field manager.
    #[must_use]
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// Discover the API resource serving the referenced kind.
    ///
    /// A pinned version is used when the reference carries one, the group's
    /// recommended version otherwise.
    async fn discover(
        &self,
        reference: &TypedObjectReference,
    ) -> Result<(ApiResource, ApiCapabilities), ObjectStoreError> {
        let key = discovery_key(reference);

        let cached = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(found) = cached {
            return Ok(found);
        }

        let (group, version, kind) = &key;
        let found = match version {
            Some(version) => {
                let gvk = GroupVersionKind::gvk(group, version, kind);
                kube::discovery::pinned_kind(&self.client, &gvk)
                    .await
                    .map_err(|e| discovery_error(e, reference))?
            }
            None => kube::discovery::group(&self.client, group)
                .await
                .map_err(|e| discovery_error(e, reference))?
                .recommended_kind(kind)
                .ok_or_else(|| unknown_kind(reference))?,
        };

        debug!(
            group = %group,
            kind = %kind,
            api_version = %found.0.api_version,
            "Discovered API resource"
        );

        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, found.clone());
        Ok(found)
    }

    fn api(
        &self,
        resource: &ApiResource,
        capabilities: &ApiCapabilities,
        namespace: Option<&str>,
    ) -> Api<DynamicObject> {
        match (&capabilities.scope, namespace) {
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), resource),
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, resource)
            }
            (Scope::Namespaced, None) => Api::default_namespaced_with(self.client.clone(), resource),
        }
    }

    /// Resource lists of the core group and of every group's preferred version.
    async fn preferred_resources(&self) -> Result<Vec<APIResourceList>, ObjectStoreError> {
        let mut lists = vec![self.client.list_core_api_resources("v1").await?];
        for group in self.client.list_api_groups().await?.groups {
            let Some(preferred) = group.preferred_version else {
                continue;
            };
            lists.push(
                self.client
                    .list_api_group_resources(&preferred.group_version)
                    .await?,
            );
        }
        Ok(lists)
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn resolve_target(
        &self,
        target: &Target,
    ) -> Result<TypedObjectReference, ObjectStoreError> {
        let reference = target.reference();
        let Some(category) = category_to_resolve(target) else {
            return Ok(reference);
        };

        let lists = self.preferred_resources().await?;
        let candidates = category_candidates(&lists, &reference.kind, category);
        select_candidate(reference, category, candidates)
    }

    async fn get(
        &self,
        reference: &TypedObjectReference,
    ) -> Result<DynamicObject, ObjectStoreError> {
        let (resource, capabilities) = self.discover(reference).await?;
        let api = self.api(&resource, &capabilities, reference.namespace());
        Ok(api.get(&reference.name).await?)
    }

    async fn apply(
        &self,
        reference: &TypedObjectReference,
        intent: &ApplyIntent,
    ) -> Result<String, ObjectStoreError> {
        let (resource, capabilities) = self.discover(reference).await?;
        let namespace = apply_namespace(&capabilities.scope, reference);
        let body = intent.render(&resource.api_version, &resource.kind, &reference.name, namespace);

        // Never forced: conflicts with other field managers must surface.
        let params = PatchParams::apply(&self.field_manager);
        let api = self.api(&resource, &capabilities, namespace);
        let applied = api
            .patch(&reference.name, &params, &Patch::Apply(&body))
            .await?;

        applied.metadata.uid.ok_or_else(|| {
            ObjectStoreError::InvalidObject(format!("applied object {reference} has no UID"))
        })
    }
}

fn discovery_key(reference: &TypedObjectReference) -> DiscoveryKey {
    (
        reference.group().to_string(),
        reference.version().map(ToString::to_string),
        reference.kind.clone(),
    )
}

fn unknown_kind(reference: &TypedObjectReference) -> ObjectStoreError {
    ObjectStoreError::UnknownKind {
        group: reference.group().to_string(),
        kind: reference.kind.clone(),
    }
}

/// Map a discovery failure for `reference`.
///
/// A group, version or kind the API server does not serve maps to
/// [`ObjectStoreError::UnknownKind`]. Discovery answers an unserved pinned version
/// with a `404`.
fn discovery_error(err: kube::Error, reference: &TypedObjectReference) -> ObjectStoreError {
    match err {
        kube::Error::Discovery(_) => unknown_kind(reference),
        kube::Error::Api(status) if status.is_not_found() => unknown_kind(reference),
        other => other.into(),
    }
}

/// The category to resolve the target's kind in, if its group is not already known.
pub(crate) fn category_to_resolve(target: &Target) -> Option<&str> {
    let category = target.category.as_deref()?;
    let (group, _) = split_api_group(target.api_group.as_deref().unwrap_or_default());
    group.is_empty().then_some(category)
}

/// `group/version` of every list serving `kind` as a top-level resource in `category`.
pub(crate) fn category_candidates(
    lists: &[APIResourceList],
    kind: &str,
    category: &str,
) -> Vec<String> {
    lists
        .iter()
        .filter(|list| {
            list.resources.iter().any(|r| {
                !r.name.contains('/')
                    && r.kind == kind
                    && r
                        .categories
                        .as_deref()
                        .is_some_and(|c| c.iter().any(|c| c == category))
            })
        })
        .map(|list| list.group_version.clone())
        .collect()
}

/// Qualify `reference` with the single candidate of its category.
pub(crate) fn select_candidate(
    reference: TypedObjectReference,
    category: &str,
    mut candidates: Vec<String>,
) -> Result<TypedObjectReference, ObjectStoreError> {
    match candidates.len() {
        0 => Err(ObjectStoreError::UnknownKind {
            group: String::new(),
            kind: reference.kind,
        }),
        1 => Ok(TypedObjectReference {
            api_group: candidates.pop(),
            ..reference
        }),
        _ => Err(ObjectStoreError::AmbiguousKind {
            kind: reference.kind,
            category: category.to_string(),
            candidates,
        }),
    }
}

/// Namespace an apply is addressed to. Cluster-scoped kinds ignore the reference's.
pub(crate) fn apply_namespace<'a>(
    scope: &Scope,
    reference: &'a TypedObjectReference,
) -> Option<&'a str> {
    match scope {
        Scope::Cluster => None,
        Scope::Namespaced => reference.namespace(),
    }
}

/// API version recorded for a fetched object, falling back to the reference's
/// `apiGroup` when the object carries no type information.
#[must_use]
pub fn object_api_version(object: &DynamicObject, fallback: &TypedObjectReference) -> Option<String> {
    object
        .types
        .as_ref()
        .map(|t| t.api_version.clone())
        .filter(|v| !v.is_empty())
        .or_else(|| fallback.api_group.clone())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
