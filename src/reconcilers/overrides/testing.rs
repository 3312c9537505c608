// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] used by the engine tests.

use super::store::{ApplyIntent, ObjectStore};
use crate::crd::{Target, TypedObjectReference};
use crate::override_errors::ObjectStoreError;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DynamicObject, TypeMeta};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

type Key = (String, String, Option<String>, String);

fn key(reference: &TypedObjectReference) -> Key {
    (
        reference.group().to_string(),
        reference.kind.clone(),
        reference.namespace().map(ToString::to_string),
        reference.name.clone(),
    )
}

/// Build an object with the given coordinates and UID.
pub fn object(
    api_version: &str,
    kind: &str,
    namespace: Option<&str>,
    name: &str,
    uid: &str,
) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        }),
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(ToString::to_string),
            uid: Some(uid.to_string()),
            ..ObjectMeta::default()
        },
        data: json!({}),
    }
}

/// Add an owner reference to `object`.
pub fn owned_by(mut object: DynamicObject, owner: &DynamicObject) -> DynamicObject {
    let (api_version, kind) = type_of(owner);
    object
        .metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .push(OwnerReference {
            api_version,
            kind,
            name: owner.metadata.name.clone().unwrap_or_default(),
            uid: owner.metadata.uid.clone().unwrap_or_default(),
            ..OwnerReference::default()
        });
    object
}

/// Declare `spec.resourceRef` pointing at `child`.
pub fn with_resource_ref(mut object: DynamicObject, child: &DynamicObject) -> DynamicObject {
    object.data["spec"]["resourceRef"] = declared(child);
    object
}

/// Declare `spec.resourceRefs` pointing at `children`.
pub fn with_resource_refs(mut object: DynamicObject, children: &[&DynamicObject]) -> DynamicObject {
    object.data["spec"]["resourceRefs"] = Value::Array(children.iter().map(|c| declared(c)).collect());
    object
}

fn type_of(object: &DynamicObject) -> (String, String) {
    object
        .types
        .as_ref()
        .map(|t| (t.api_version.clone(), t.kind.clone()))
        .unwrap_or_default()
}

fn declared(object: &DynamicObject) -> Value {
    let (api_version, kind) = type_of(object);
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "name": object.metadata.name,
    })
}

/// Reference to an object built with [`object`].
pub fn reference_to(object: &DynamicObject) -> TypedObjectReference {
    let (api_version, kind) = type_of(object);
    TypedObjectReference::new(
        &api_version,
        &kind,
        object.metadata.name.as_deref().unwrap_or_default(),
        object.metadata.namespace.as_deref(),
    )
}

/// An in-memory object store.
///
/// Lookups of a namespaced reference fall back to a cluster-scoped object of the same
/// name, mirroring how a real store ignores namespaces of cluster-scoped kinds.
#[derive(Default)]
pub struct FakeStore {
    objects: HashMap<Key, DynamicObject>,
    get_errors: HashMap<Key, ObjectStoreError>,
    apply_errors: HashMap<Key, ObjectStoreError>,
    resolved: HashMap<String, TypedObjectReference>,
    apply_delay: Option<Duration>,
    /// Every apply received, in order.
    pub applied: Mutex<Vec<(TypedObjectReference, Value)>>,
    /// Number of fetches received.
    pub gets: Mutex<usize>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, object: DynamicObject) -> Self {
        self.objects.insert(key(&reference_to(&object)), object);
        self
    }

    pub fn with_get_error(mut self, reference: &TypedObjectReference, err: ObjectStoreError) -> Self {
        self.get_errors.insert(key(reference), err);
        self
    }

    pub fn with_apply_error(
        mut self,
        reference: &TypedObjectReference,
        err: ObjectStoreError,
    ) -> Self {
        self.apply_errors.insert(key(reference), err);
        self
    }

    pub fn with_resolved(mut self, kind: &str, reference: TypedObjectReference) -> Self {
        self.resolved.insert(kind.to_string(), reference);
        self
    }

    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    pub fn applied_names(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.name.clone())
            .collect()
    }

    fn lookup<'a, T>(map: &'a HashMap<Key, T>, reference: &TypedObjectReference) -> Option<&'a T> {
        let exact = key(reference);
        map.get(&exact).or_else(|| {
            let (group, kind, _, name) = exact;
            map.get(&(group, kind, None, name))
        })
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn resolve_target(
        &self,
        target: &Target,
    ) -> Result<TypedObjectReference, ObjectStoreError> {
        if target.category.is_none() {
            return Ok(target.reference());
        }
        self.resolved
            .get(&target.kind)
            .cloned()
            .map(|resolved| TypedObjectReference {
                name: target.name.clone(),
                namespace: target.namespace.clone(),
                ..resolved
            })
            .ok_or_else(|| ObjectStoreError::UnknownKind {
                group: String::new(),
                kind: target.kind.clone(),
            })
    }

    async fn get(
        &self,
        reference: &TypedObjectReference,
    ) -> Result<DynamicObject, ObjectStoreError> {
        *self.gets.lock().unwrap() += 1;
        if let Some(err) = Self::lookup(&self.get_errors, reference) {
            return Err(err.clone());
        }
        Self::lookup(&self.objects, reference).cloned().ok_or_else(|| {
            ObjectStoreError::Api(crate::override_errors::ApiStatusError::not_found(
                &reference.kind.to_lowercase(),
                &reference.name,
            ))
        })
    }

    async fn apply(
        &self,
        reference: &TypedObjectReference,
        intent: &ApplyIntent,
    ) -> Result<String, ObjectStoreError> {
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        let body = intent.render(
            reference.api_group.as_deref().unwrap_or_default(),
            &reference.kind,
            &reference.name,
            reference.namespace(),
        );
        self.applied
            .lock()
            .unwrap()
            .push((reference.clone(), body));

        if let Some(err) = Self::lookup(&self.apply_errors, reference) {
            return Err(err.clone());
        }
        Self::lookup(&self.objects, reference)
            .and_then(|o| o.metadata.uid.clone())
            .ok_or_else(|| {
                ObjectStoreError::Api(crate::override_errors::ApiStatusError::not_found(
                    &reference.kind.to_lowercase(),
                    &reference.name,
                ))
            })
    }
}
