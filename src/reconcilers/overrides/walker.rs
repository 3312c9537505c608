// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hierarchy discovery.
//!
//! The walk is breadth-first from the root and returns the root first:
//!
//! - `None` visits only the root.
//! - `Ascending` follows `metadata.ownerReferences` (owner of owner, and so on).
//! - `Descending` follows `spec.resourceRef` and `spec.resourceRefs`.
//!
//! Object graphs are untrusted input. Every visited object is remembered both by its
//! coordinates (group, kind, namespace, name) and by its UID, and an edge leading to
//! either is not followed again. A configurable limit bounds the walk.
//!
//! Objects that cannot be fetched are still returned, together with their fetch error,
//! so that their absence is classified rather than silently skipped.

use super::cancellable;
use super::store::{object_api_version, ObjectStore};
use crate::constants::DEFAULT_MAX_HIERARCHY_OBJECTS;
use crate::crd::{PropagationMode, TypedObjectReference};
use crate::override_errors::{ObjectStoreError, TraversalError};
use kube::api::DynamicObject;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on the size of one walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraversalLimits {
    max_objects: usize,
}

impl TraversalLimits {
    /// Limit a walk to `max_objects` objects, root included. The root is always visited.
    #[must_use]
    pub fn new(max_objects: usize) -> Self {
        Self {
            max_objects: max_objects.max(1),
        }
    }

    /// Maximum number of objects visited, root included.
    #[must_use]
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HIERARCHY_OBJECTS)
    }
}

/// One object discovered by the walk.
#[derive(Debug, Clone)]
pub struct VisitedObject {
    /// Reference to the object. Taken from the fetched object when available.
    pub reference: TypedObjectReference,
    /// UID of the object, if known.
    pub uid: Option<String>,
    /// Why the object could not be fetched. Such objects are never applied.
    pub fetch_error: Option<ObjectStoreError>,
}

/// The result of one walk.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    /// Visited objects in visitation order, root first.
    pub objects: Vec<VisitedObject>,
    /// Whether the walk stopped at the object limit.
    pub truncated: bool,
}

/// Stable identity of an object independent of its API version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Coordinates {
    group: String,
    kind: String,
    namespace: Option<String>,
    name: String,
}

impl From<&TypedObjectReference> for Coordinates {
    fn from(reference: &TypedObjectReference) -> Self {
        Self {
            group: reference.group().to_string(),
            kind: reference.kind.clone(),
            namespace: reference.namespace().map(ToString::to_string),
            name: reference.name.clone(),
        }
    }
}

#[derive(Default)]
struct Visited {
    coordinates: HashSet<Coordinates>,
    uids: HashSet<String>,
}

impl Visited {
    fn contains(&self, reference: &TypedObjectReference, uid: Option<&str>) -> bool {
        self.coordinates.contains(&Coordinates::from(reference))
            || uid.is_some_and(|uid| self.uids.contains(uid))
    }

    fn insert(&mut self, reference: &TypedObjectReference, uid: Option<&str>) {
        self.coordinates.insert(Coordinates::from(reference));
        if let Some(uid) = uid.filter(|uid| !uid.is_empty()) {
            self.uids.insert(uid.to_string());
        }
    }
}

/// An edge leaving a visited object.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    reference: TypedObjectReference,
    uid: Option<String>,
}

/// A reference declared in an object's spec.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeclaredReference {
    #[serde(default)]
    api_version: String,
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

/// Discover the objects of the hierarchy rooted at `root`.
///
/// Every fetch is bounded by `timeout`.
///
/// # Errors
///
/// Returns [`TraversalError::RootFetch`] if the root cannot be fetched and
/// [`TraversalError::Cancelled`] if `cancel` fires during the walk.
pub async fn walk(
    store: &dyn ObjectStore,
    root: &TypedObjectReference,
    mode: PropagationMode,
    limits: &TraversalLimits,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Hierarchy, TraversalError> {
    let root_object = cancellable(cancel, fetch(store, root, timeout))
        .await?
        .map_err(|source| TraversalError::RootFetch {
            target: root.to_string(),
            source,
        })?;

    let mut visited = Visited::default();
    let root_reference = reference_of(&root_object, root);
    let root_uid = root_object.metadata.uid.clone();
    visited.insert(root, None);
    visited.insert(&root_reference, root_uid.as_deref());

    let mut hierarchy = Hierarchy {
        objects: vec![VisitedObject {
            reference: root_reference,
            uid: root_uid,
            fetch_error: None,
        }],
        truncated: false,
    };

    let mut queue = VecDeque::new();
    if mode != PropagationMode::None {
        queue.push_back(root_object);
    }

    'walk: while let Some(object) = queue.pop_front() {
        for edge in edges(&object, mode) {
            if visited.contains(&edge.reference, edge.uid.as_deref()) {
                debug!(reference = %edge.reference, "Skipping already visited object");
                continue;
            }
            if hierarchy.objects.len() >= limits.max_objects() {
                warn!(
                    root = %root,
                    limit = limits.max_objects(),
                    "Hierarchy walk reached the object limit"
                );
                hierarchy.truncated = true;
                break 'walk;
            }

            match cancellable(cancel, fetch(store, &edge.reference, timeout)).await? {
                Ok(child) => {
                    let reference = reference_of(&child, &edge.reference);
                    let uid = child.metadata.uid.clone();
                    if visited.contains(&reference, uid.as_deref()) {
                        debug!(reference = %reference, "Skipping already visited object");
                        visited.insert(&edge.reference, None);
                        continue;
                    }
                    visited.insert(&edge.reference, None);
                    visited.insert(&reference, uid.as_deref());
                    hierarchy.objects.push(VisitedObject {
                        reference,
                        uid,
                        fetch_error: None,
                    });
                    queue.push_back(child);
                }
                Err(err) => {
                    debug!(reference = %edge.reference, error = %err, "Cannot fetch object");
                    visited.insert(&edge.reference, edge.uid.as_deref());
                    hierarchy.objects.push(VisitedObject {
                        reference: edge.reference,
                        uid: edge.uid,
                        fetch_error: Some(err),
                    });
                }
            }
        }
    }

    Ok(hierarchy)
}

/// Fetch one object, bounded by `timeout`.
async fn fetch(
    store: &dyn ObjectStore,
    reference: &TypedObjectReference,
    timeout: Duration,
) -> Result<DynamicObject, ObjectStoreError> {
    tokio::time::timeout(timeout, store.get(reference))
        .await
        .unwrap_or_else(|_| {
            Err(ObjectStoreError::Timeout {
                operation: "get",
                target: reference.to_string(),
                timeout,
            })
        })
}

/// Reference to a fetched object, completed from the reference it was fetched with.
fn reference_of(object: &DynamicObject, fetched_with: &TypedObjectReference) -> TypedObjectReference {
    TypedObjectReference {
        api_group: object_api_version(object, fetched_with),
        kind: object
            .types
            .as_ref()
            .map(|t| t.kind.clone())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| fetched_with.kind.clone()),
        name: object
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| fetched_with.name.clone()),
        namespace: object.metadata.namespace.clone().filter(|ns| !ns.is_empty()),
    }
}

/// Edges leaving `object` in the direction of `mode`.
///
/// Owner references and declared references without a namespace inherit the
/// namespace of `object`. Cluster-scoped kinds ignore it.
fn edges(object: &DynamicObject, mode: PropagationMode) -> Vec<Edge> {
    let namespace = object.metadata.namespace.as_deref();
    match mode {
        PropagationMode::None => Vec::new(),
        PropagationMode::Ascending => object
            .metadata
            .owner_references
            .iter()
            .flatten()
            .map(|owner| Edge {
                reference: TypedObjectReference::new(
                    &owner.api_version,
                    &owner.kind,
                    &owner.name,
                    namespace,
                ),
                uid: Some(owner.uid.clone()).filter(|uid| !uid.is_empty()),
            })
            .collect(),
        PropagationMode::Descending => declared_references(object)
            .into_iter()
            .map(|declared| Edge {
                reference: TypedObjectReference::new(
                    &declared.api_version,
                    &declared.kind,
                    &declared.name,
                    declared.namespace.as_deref().or(namespace),
                ),
                uid: None,
            })
            .collect(),
    }
}

/// References declared in `spec.resourceRef` and `spec.resourceRefs`.
///
/// Malformed entries and entries without a name are ignored.
fn declared_references(object: &DynamicObject) -> Vec<DeclaredReference> {
    let Some(spec) = object.data.get("spec") else {
        return Vec::new();
    };

    let single = spec.get("resourceRef").into_iter();
    let many = spec
        .get("resourceRefs")
        .and_then(|refs| refs.as_array())
        .into_iter()
        .flatten();

    single
        .chain(many)
        .filter_map(|value| match DeclaredReference::deserialize(value) {
            Ok(declared) => Some(declared),
            Err(err) => {
                debug!(error = %err, "Ignoring malformed resource reference");
                None
            }
        })
        .filter(|declared| !declared.name.is_empty() && !declared.kind.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod walker_tests;
