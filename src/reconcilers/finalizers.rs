// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for namespaced override resources.
//!
//! An override owns fields inside a control plane, so it must not disappear before it
//! has released them. Reconcilers add their finalizer before the first pass and remove
//! it only once the deletion pass unwound the whole hierarchy.
//!
//! # Example
//!
//! ```rust,ignore
//! use spaces::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//!
//! ensure_finalizer(&client, &ovr, FINALIZER).await?;
//! if ovr.metadata.deletion_timestamp.is_some() {
//!     // release owned fields, then:
//!     remove_finalizer(&client, &ovr, FINALIZER).await?;
//! }
//! ```

use super::retry::retry_api_call;
use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::info;

/// Returns true if `resource` carries `finalizer`.
#[must_use]
pub fn has_finalizer<T: ResourceExt>(resource: &T, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// Returns true if `resource` is being deleted.
#[must_use]
pub fn is_deleting<T: ResourceExt>(resource: &T) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Finalizers of `resource` with `finalizer` added, or `None` if already present.
#[must_use]
pub fn with_finalizer<T: ResourceExt>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizers of `resource` with `finalizer` removed, or `None` if absent.
#[must_use]
pub fn without_finalizer<T: ResourceExt>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if !has_finalizer(resource, finalizer) {
        return None;
    }
    Some(
        resource
            .finalizers()
            .iter()
            .filter(|f| *f != finalizer)
            .cloned()
            .collect(),
    )
}

/// Add a finalizer to a resource if not already present.
///
/// # Errors
///
/// Returns an error if the API patch fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
{
    let Some(finalizers) = with_finalizer(resource, finalizer) else {
        return Ok(());
    };

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    info!(finalizer, namespace = %namespace, name = %name, kind = %T::kind(&()), "Adding finalizer");

    patch_finalizers::<T>(client, &namespace, &name, finalizers).await
}

/// Remove a finalizer from a resource if present.
///
/// # Errors
///
/// Returns an error if the API patch fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
{
    let Some(finalizers) = without_finalizer(resource, finalizer) else {
        return Ok(());
    };

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    info!(finalizer, namespace = %namespace, name = %name, kind = %T::kind(&()), "Removing finalizer");

    patch_finalizers::<T>(client, &namespace, &name, finalizers).await
}

async fn patch_finalizers<T>(
    client: &Client,
    namespace: &str,
    name: &str,
    finalizers: Vec<String>,
) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let params = PatchParams::default();
    let patch = Patch::Merge(json!({ "metadata": { "finalizers": finalizers } }));
    retry_api_call(
        || api.patch(name, &params, &patch),
        &format!("patch finalizers of {} {namespace}/{name}", T::kind(&())),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
