// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the override controllers.
//!
//! All controllers receive an `Arc<Context>` that contains:
//! - Kubernetes client of the host cluster
//! - Reflector store of `ControlPlane` resources
//! - Controller settings (field manager, pass bounds, requeue intervals)
//!
//! Overrides act on objects living inside a control plane, so every pass needs a client
//! for that control plane. [`Context::control_plane_client`] builds one from the
//! kubeconfig in the control plane's connection secret.

use crate::constants::{
    DEFAULT_FIELD_MANAGER, DEFAULT_REQUEUE_NOT_READY_SECS, DEFAULT_REQUEUE_READY_SECS,
    KUBECONFIG_IN_CLUSTER_KEY, KUBECONFIG_KEY,
};
use crate::crd::ControlPlane;
use crate::override_errors::TraversalError;
use crate::reconcilers::overrides::store::KubeObjectStore;
use crate::reconcilers::overrides::PassSettings;
use crate::reconcilers::retry::retry_api_call;
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Api, Client, Config};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Controller settings, resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Field manager used for server-side apply inside control planes.
    pub field_manager: String,
    /// Bounds of every reconciliation pass.
    pub pass: PassSettings,
    /// Requeue interval for overrides whose hierarchy is fully traversed.
    pub requeue_ready: Duration,
    /// Requeue interval for overrides that are not ready yet.
    pub requeue_not_ready: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            pass: PassSettings::default(),
            requeue_ready: Duration::from_secs(DEFAULT_REQUEUE_READY_SECS),
            requeue_not_ready: Duration::from_secs(DEFAULT_REQUEUE_NOT_READY_SECS),
        }
    }
}

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client of the host cluster
    pub client: Client,

    /// Reflector stores for cross-resource lookups
    pub stores: Stores,

    /// Controller settings
    pub settings: Settings,

    /// Cancelled on shutdown; every pass runs under a child token
    pub shutdown: CancellationToken,
}

/// Reflector stores populated by dedicated watch tasks.
#[derive(Clone)]
pub struct Stores {
    /// `ControlPlane` resources of the host cluster
    pub control_planes: Store<ControlPlane>,
}

impl Stores {
    /// Get a `ControlPlane` by name and namespace from the store.
    #[must_use]
    pub fn get_control_plane(&self, name: &str, namespace: &str) -> Option<Arc<ControlPlane>> {
        self.control_planes
            .get(&ObjectRef::new(name).within(namespace))
    }
}

impl Context {
    /// Create a context with a fresh shutdown token.
    #[must_use]
    pub fn new(client: Client, stores: Stores, settings: Settings) -> Self {
        Self {
            client,
            stores,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Look up a `ControlPlane`, falling back to the API server when the store has not
    /// caught up yet.
    ///
    /// Returns `Ok(None)` if the control plane does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::ControlPlaneUnavailable`] if the control plane cannot
    /// be read.
    pub async fn find_control_plane(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<ControlPlane>>, TraversalError> {
        if let Some(ctp) = self.stores.get_control_plane(name, namespace) {
            return Ok(Some(ctp));
        }

        debug!(namespace, name, "ControlPlane not in store, reading from API");
        let api: Api<ControlPlane> = Api::namespaced(self.client.clone(), namespace);
        let ctp = retry_api_call(|| api.get_opt(name), &format!("get ControlPlane {namespace}/{name}"))
            .await
            .map_err(|e| unavailable(namespace, name, e.to_string()))?;
        Ok(ctp.map(Arc::new))
    }

    /// Look up a `ControlPlane` that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::ControlPlaneUnavailable`] if the control plane does not
    /// exist or cannot be read.
    pub async fn control_plane(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<ControlPlane>, TraversalError> {
        self.find_control_plane(namespace, name)
            .await?
            .ok_or_else(|| unavailable(namespace, name, "ControlPlane not found".to_string()))
    }

    /// Build a client for the API server of the named control plane.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::ControlPlaneUnavailable`] if the control plane, its
    /// connection secret or the kubeconfig inside it cannot be used.
    pub async fn control_plane_client(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Client, TraversalError> {
        let ctp = self.control_plane(namespace, name).await?;
        let secret_ref = ctp.connection_secret();
        let secret_namespace = if secret_ref.namespace.is_empty() {
            namespace
        } else {
            secret_ref.namespace.as_str()
        };

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), secret_namespace);
        let secret = retry_api_call(
            || secrets.get(&secret_ref.name),
            &format!("get connection secret {secret_namespace}/{}", secret_ref.name),
        )
        .await
        .map_err(|e| unavailable(namespace, name, e.to_string()))?;

        let kubeconfig = kubeconfig_from_secret(&secret)
            .map_err(|reason| unavailable(namespace, name, reason))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| unavailable(namespace, name, format!("invalid kubeconfig: {e}")))?;

        Client::try_from(config)
            .map_err(|e| unavailable(namespace, name, format!("cannot build client: {e}")))
    }

    /// Build an object store writing into the named control plane.
    ///
    /// # Errors
    ///
    /// See [`Context::control_plane_client`].
    pub async fn object_store(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<KubeObjectStore, TraversalError> {
        let client = self.control_plane_client(namespace, name).await?;
        Ok(KubeObjectStore::new(client, &self.settings.field_manager))
    }
}

/// Parse the kubeconfig held by a control plane connection secret.
///
/// The in-cluster kubeconfig is preferred over the external one.
///
/// # Errors
///
/// Returns a human-readable reason if neither key is present or the content is not a
/// valid kubeconfig.
pub fn kubeconfig_from_secret(secret: &Secret) -> Result<Kubeconfig, String> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let data = secret
        .data
        .as_ref()
        .ok_or_else(|| format!("connection secret {name} has no data"))?;

    let bytes = data
        .get(KUBECONFIG_IN_CLUSTER_KEY)
        .or_else(|| data.get(KUBECONFIG_KEY))
        .ok_or_else(|| {
            format!(
                "connection secret {name} has neither '{KUBECONFIG_IN_CLUSTER_KEY}' nor '{KUBECONFIG_KEY}'"
            )
        })?;

    let yaml = std::str::from_utf8(&bytes.0)
        .map_err(|e| format!("kubeconfig in {name} is not valid UTF-8: {e}"))?;
    Kubeconfig::from_yaml(yaml).map_err(|e| format!("cannot parse kubeconfig in {name}: {e}"))
}

fn unavailable(namespace: &str, name: &str, reason: String) -> TraversalError {
    TraversalError::ControlPlaneUnavailable {
        namespace: namespace.to_string(),
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
