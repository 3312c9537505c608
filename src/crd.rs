// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for Spaces.
//!
//! This module defines the Kubernetes Custom Resource Definitions served under the
//! `spaces.upbound.io` API group.
//!
//! # Resource Types
//!
//! ## Control Planes
//!
//! - [`ControlPlane`] - A managed Crossplane instance (`v1beta1`)
//!
//! ## Overrides
//!
//! - [`InControlPlaneOverride`] - Configuration override applied to an object hierarchy
//!   living inside a `ControlPlane` (`v1alpha1`)
//! - [`ConfigurationOverride`] - Earlier, metadata-only form of the same override whose
//!   target may be qualified by a category (`v1alpha1`)
//!
//! # Example: Pausing a Claim Hierarchy
//!
//! ```rust
//! use spaces::crd::{
//!     InControlPlaneOverrideSpec, Metadata, PatchIntent, PropagationMode, TypedObjectReference,
//! };
//! use std::collections::BTreeMap;
//!
//! let spec = InControlPlaneOverrideSpec {
//!     control_plane_name: "ctp1".to_string(),
//!     target: TypedObjectReference {
//!         api_group: Some("example.org".to_string()),
//!         kind: "XNetwork".to_string(),
//!         name: "network-1".to_string(),
//!         namespace: None,
//!     },
//!     propagation_mode: PropagationMode::Descending,
//!     patch: PatchIntent {
//!         metadata: Some(Metadata {
//!             annotations: Some(BTreeMap::from([(
//!                 "crossplane.io/paused".to_string(),
//!                 "true".to_string(),
//!             )])),
//!         }),
//!         spec: None,
//!     },
//! };
//! assert!(spec.patch.validate().is_ok());
//! ```

use crate::conditions::{get_condition, set_conditions};
use crate::constants::{
    ALLOWED_PATCH_ANNOTATIONS, CATEGORY_MANAGED, DEFAULT_CONNECTION_SECRET_PREFIX,
    STATUS_REASON_NOT_FOUND,
};
use crate::override_errors::{PatchValidationError, SpecValidationError};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Common Types
// ============================================================================

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Synced, Healthy.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    pub reason: String,

    /// Human-readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    pub last_transition_time: String,
}

/// Status types that carry a list of conditions.
///
/// Implemented by every status in this module so that condition lookups and updates
/// behave the same for all Spaces resources.
pub trait Conditioned {
    /// The conditions currently recorded.
    fn conditions(&self) -> &[Condition];

    /// Mutable access to the recorded conditions.
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    /// Return the condition of the given type, or an `Unknown` condition if absent.
    fn get_condition(&self, condition_type: &str) -> Condition {
        get_condition(self.conditions(), condition_type)
    }

    /// Set the supplied conditions, replacing any existing conditions of the same type.
    ///
    /// A condition identical to the existing one (ignoring `lastTransitionTime`) is a no-op.
    fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        set_conditions(self.conditions_mut(), conditions);
    }
}

/// A typed reference to a Kubernetes object.
///
/// `apiGroup` holds either a bare group (`example.org`), a full API version
/// (`example.org/v1`) or nothing at all for the core group. `namespace` is empty for
/// cluster-scoped kinds.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypedObjectReference {
    /// API group (optionally with version) of the referenced object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    /// Kind of the referenced object.
    #[schemars(length(min = 1))]
    pub kind: String,

    /// Name of the referenced object.
    pub name: String,

    /// Namespace of the referenced object, empty for cluster-scoped objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TypedObjectReference {
    /// Build a reference from an `apiVersion` (`group/version` or `v1`), kind, name and
    /// optional namespace. Empty namespaces are normalized to `None`.
    #[must_use]
    pub fn new(api_version: &str, kind: &str, name: &str, namespace: Option<&str>) -> Self {
        Self {
            api_group: (!api_version.is_empty()).then(|| api_version.to_string()),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace
                .filter(|ns| !ns.is_empty())
                .map(ToString::to_string),
        }
    }

    /// The API group without any version suffix. The core group is the empty string.
    #[must_use]
    pub fn group(&self) -> &str {
        split_api_group(self.api_group.as_deref().unwrap_or_default()).0
    }

    /// The API version, if `apiGroup` carries one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        split_api_group(self.api_group.as_deref().unwrap_or_default()).1
    }

    /// The namespace, treating an empty string like an absent namespace.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

impl fmt::Display for TypedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = self.group();
        if group.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}.{}", self.kind, group)?;
        }
        match self.namespace() {
            Some(ns) => write!(f, " {ns}/{}", self.name),
            None => write!(f, " {}", self.name),
        }
    }
}

/// Split an `apiGroup` value into its group and optional version.
///
/// `example.org/v1` yields `("example.org", Some("v1"))`, `v1` yields `("", Some("v1"))`
/// and `example.org` yields `("example.org", None)`.
#[must_use]
pub fn split_api_group(api_group: &str) -> (&str, Option<&str>) {
    if let Some((group, version)) = api_group.split_once('/') {
        return (group, Some(version));
    }
    if is_core_version(api_group) {
        return ("", Some(api_group));
    }
    (api_group, None)
}

fn is_core_version(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty()
        && rest.starts_with(|c: char| c.is_ascii_digit())
        && rest.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A reference to a local object of the given kind in an optional API group.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypedLocalObjectReference {
    /// API group of the referenced object, defaults to `spaces.upbound.io`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    /// Kind of the referenced object.
    pub kind: String,

    /// Name of the referenced object.
    pub name: String,
}

// ============================================================================
// Override Types
// ============================================================================

/// PropagationMode denotes the traversal direction on an object's hierarchy.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PropagationMode {
    /// No traversal, only the target object is visited.
    #[default]
    None,
    /// Traverse upwards following `metadata.ownerReferences`.
    Ascending,
    /// Traverse downwards following `spec.resourceRef` and `spec.resourceRefs`.
    Descending,
}

impl fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            Self::None => "None",
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        };
        f.write_str(mode)
    }
}

/// Metadata represents the Kube object metadata carried by a patch.
///
/// Only the `crossplane.io/paused` and `spaces.upbound.io/force-reconcile-at`
/// annotations may be patched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Annotations to set on every object in the target hierarchy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// An action Crossplane is allowed to take on a managed resource.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ManagementAction {
    /// Observe the external resource.
    Observe,
    /// Create the external resource.
    Create,
    /// Update the external resource.
    Update,
    /// Delete the external resource.
    Delete,
    /// Late-initialize the managed resource from the external resource.
    LateInitialize,
    /// All of the above.
    #[serde(rename = "*")]
    All,
}

/// ObjectSpec represents the patchable part of a Kube object's spec.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    /// Management policies of a Crossplane managed resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_policies: Option<Vec<ManagementAction>>,
}

/// A configuration patch which is serialized into JSON to obtain the fully specified
/// intent used with server-side apply.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatchIntent {
    /// Metadata fragment of the patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Spec fragment of the patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ObjectSpec>,
}

impl PatchIntent {
    /// Validate the patch.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `metadata` nor `spec` is set, if the annotation map
    /// is empty or holds more than two entries, or if it holds an annotation outside the
    /// allow-list.
    pub fn validate(&self) -> Result<(), PatchValidationError> {
        if self.metadata.is_none() && self.spec.is_none() {
            return Err(PatchValidationError::Empty);
        }

        let Some(annotations) = self
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.as_ref())
        else {
            return Ok(());
        };

        if annotations.is_empty() {
            return Err(PatchValidationError::NoAnnotations);
        }
        if annotations.len() > ALLOWED_PATCH_ANNOTATIONS.len() {
            return Err(PatchValidationError::TooManyAnnotations {
                count: annotations.len(),
                max: ALLOWED_PATCH_ANNOTATIONS.len(),
            });
        }
        if let Some(key) = annotations
            .keys()
            .find(|k| !ALLOWED_PATCH_ANNOTATIONS.contains(&k.as_str()))
        {
            return Err(PatchValidationError::AnnotationNotAllowed { key: key.clone() });
        }

        Ok(())
    }

    /// Render the fully specified server-side apply intent for one object.
    #[must_use]
    pub fn to_apply_object(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Value {
        let mut object = Self::release_object(api_version, kind, name, namespace);

        if let Some(annotations) = self
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.as_ref())
        {
            object["metadata"]["annotations"] = json!(annotations);
        }
        if let Some(policies) = self
            .spec
            .as_ref()
            .and_then(|s| s.management_policies.as_ref())
        {
            object["spec"] = json!({ "managementPolicies": policies });
        }

        object
    }

    /// Render an intent that claims no fields.
    ///
    /// Applying it with the same field manager releases every field previously applied
    /// by that manager.
    #[must_use]
    pub fn release_object(
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Value {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!(name));
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            metadata.insert("namespace".to_string(), json!(ns));
        }

        json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": metadata,
        })
    }
}

/// PatchState denotes the result of the patch operation on one target object.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum PatchState {
    /// The object has been patched.
    Success,
    /// The object was skipped, the reason is recorded alongside.
    Skipped,
    /// Patching the object failed with a (possibly transient) error.
    Error,
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Success => "Success",
            Self::Skipped => "Skipped",
            Self::Error => "Error",
        };
        f.write_str(state)
    }
}

/// PatchStateReason denotes why a patch operation was skipped or failed.
///
/// Serialized as a plain string: `Conflict`, `SchemaMismatch`, or the verbatim API
/// status reason (e.g. `NotFound`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum PatchStateReason {
    /// Another field manager owns a field in the patch.
    Conflict,
    /// The object's schema no longer declares a patched field.
    SchemaMismatch,
    /// Any other API status reason, recorded verbatim.
    Api(String),
}

impl PatchStateReason {
    /// String form of the reason.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Conflict => "Conflict",
            Self::SchemaMismatch => "SchemaMismatch",
            Self::Api(reason) => reason,
        }
    }
}

impl From<String> for PatchStateReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Conflict" => Self::Conflict,
            "SchemaMismatch" => Self::SchemaMismatch,
            _ => Self::Api(value),
        }
    }
}

impl From<PatchStateReason> for String {
    fn from(value: PatchStateReason) -> Self {
        match value {
            PatchStateReason::Api(reason) => reason,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PatchStateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of an applied patch to an object in the target hierarchy.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version (or group) of the patch target object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    /// Kind of the patch target object.
    pub kind: String,

    /// Name of the patch target object.
    pub name: String,

    /// Namespace of the patch target object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Metadata UID of the patch target object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Outcome of the patch operation.
    pub status: PatchState,

    /// Why the object was skipped or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub reason: Option<PatchStateReason>,

    /// Optional detail message describing the observed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ObjectReference {
    /// Build an outcome record for the given target.
    #[must_use]
    pub fn new(target: TypedObjectReference, uid: Option<String>, status: PatchState) -> Self {
        Self {
            api_group: target.api_group,
            kind: target.kind,
            name: target.name,
            namespace: target.namespace,
            uid,
            status,
            reason: None,
            message: None,
        }
    }

    /// The typed reference this outcome was recorded for.
    #[must_use]
    pub fn target(&self) -> TypedObjectReference {
        TypedObjectReference {
            api_group: self.api_group.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }

    /// Returns true if the patch failed because the object is gone.
    ///
    /// Objects whose kind the control plane no longer serves are recorded the same way.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.status == PatchState::Error
            && self
                .reason
                .as_ref()
                .is_some_and(|r| r.as_str() == STATUS_REASON_NOT_FOUND)
    }

    /// Returns true for the outcomes a pass treats as resolved (`Success` or `Skipped`).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, PatchState::Success | PatchState::Skipped)
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, UID: '{}', Status: {}, Reason: '{}', Message: '{}'",
            self.target(),
            self.uid.as_deref().unwrap_or_default(),
            self.status,
            self.reason.as_ref().map(PatchStateReason::as_str).unwrap_or_default(),
            self.message.as_deref().unwrap_or_default(),
        )
    }
}

/// `InControlPlaneOverride` status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InControlPlaneOverrideStatus {
    /// Conditions of the resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// The generation observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Patch outcome for every object visited in the last pass, target object first.
    ///
    /// Always serialized so that a merge patch replaces the previous list.
    #[serde(default)]
    pub object_refs: Vec<ObjectReference>,
}

impl Conditioned for InControlPlaneOverrideStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

/// `InControlPlaneOverride` represents resource configuration overrides in a
/// `ControlPlane`. The override can be applied on single objects as well as on
/// claim/XR object hierarchies.
///
/// # Example
///
/// ```yaml
/// apiVersion: spaces.upbound.io/v1alpha1
/// kind: InControlPlaneOverride
/// metadata:
///   name: pause-network
///   namespace: default
/// spec:
///   controlPlaneName: ctp1
///   target:
///     apiGroup: example.org
///     kind: XNetwork
///     name: network-1
///   propagationMode: Descending
///   patch:
///     metadata:
///       annotations:
///         crossplane.io/paused: "true"
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "spaces.upbound.io",
    version = "v1alpha1",
    kind = "InControlPlaneOverride",
    namespaced,
    category = "spaces",
    doc = "InControlPlaneOverride represents resource configuration overrides in a ControlPlane. The specified override can be applied on single objects as well as claim/XR object hierarchies."
)]
#[kube(status = "InControlPlaneOverrideStatus")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InControlPlaneOverrideSpec {
    /// Name of the target `ControlPlane` where the overrides will be applied.
    #[schemars(length(min = 1))]
    pub control_plane_name: String,

    /// The target object, root of the hierarchy.
    pub target: TypedObjectReference,

    /// Traversal direction on the target object's hierarchy.
    #[serde(default)]
    pub propagation_mode: PropagationMode,

    /// The configuration patch.
    pub patch: PatchIntent,
}

impl InControlPlaneOverrideSpec {
    /// Validate the spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane name or target kind is empty, or if the
    /// patch is invalid.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.control_plane_name.is_empty() {
            return Err(SpecValidationError::MissingControlPlane);
        }
        if self.target.kind.is_empty() {
            return Err(SpecValidationError::MissingTargetKind);
        }
        self.patch.validate()?;
        Ok(())
    }
}

/// A `ConfigurationOverride` target: a typed reference whose kind may be qualified by a
/// category when it is ambiguous.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// API group (optionally with version) of the target object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    /// Kind of the target object.
    pub kind: String,

    /// Name of the target object.
    pub name: String,

    /// Namespace of the target object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Category filter used to disambiguate the kind. Only `managed` is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Target {
    /// The target as a plain typed reference, dropping the category.
    #[must_use]
    pub fn reference(&self) -> TypedObjectReference {
        TypedObjectReference {
            api_group: self.api_group.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

impl From<TypedObjectReference> for Target {
    fn from(reference: TypedObjectReference) -> Self {
        Self {
            api_group: reference.api_group,
            kind: reference.kind,
            name: reference.name,
            namespace: reference.namespace,
            category: None,
        }
    }
}

/// Patch carried by a `ConfigurationOverride` (metadata only).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationPatch {
    /// Metadata fragment of the patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl From<&ConfigurationPatch> for PatchIntent {
    fn from(patch: &ConfigurationPatch) -> Self {
        Self {
            metadata: patch.metadata.clone(),
            spec: None,
        }
    }
}

/// `ConfigurationOverride` status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationOverrideStatus {
    /// Conditions of the resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// The generation observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Conditioned for ConfigurationOverrideStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

/// `ConfigurationOverride` applies a metadata patch to an object hierarchy in a
/// `ControlPlane`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "spaces.upbound.io",
    version = "v1alpha1",
    kind = "ConfigurationOverride",
    namespaced,
    category = "spaces",
    doc = "ConfigurationOverride applies a metadata patch to an object hierarchy in a ControlPlane."
)]
#[kube(status = "ConfigurationOverrideStatus")]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationOverrideSpec {
    /// Name of the target `ControlPlane`.
    #[schemars(length(min = 1))]
    pub control_plane: String,

    /// The target object, root of the hierarchy.
    pub target: Target,

    /// Traversal direction on the target object's hierarchy.
    #[serde(default)]
    pub propagation_mode: PropagationMode,

    /// The configuration patch.
    pub patch: ConfigurationPatch,
}

impl ConfigurationOverrideSpec {
    /// Validate the spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane name or target kind is empty, if the
    /// category is anything but `managed`, or if the patch is invalid.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.control_plane.is_empty() {
            return Err(SpecValidationError::MissingControlPlane);
        }
        if self.target.kind.is_empty() {
            return Err(SpecValidationError::MissingTargetKind);
        }
        if let Some(category) = self
            .target
            .category
            .as_deref()
            .filter(|c| *c != CATEGORY_MANAGED)
        {
            return Err(SpecValidationError::UnsupportedCategory {
                category: category.to_string(),
            });
        }
        PatchIntent::from(&self.patch).validate()?;
        Ok(())
    }
}

// ============================================================================
// ControlPlane Types
// ============================================================================

/// What happens to the external resource when the managed resource is deleted.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Delete the external resource.
    #[default]
    Delete,
    /// Orphan the external resource.
    Orphan,
}

/// Channel for Crossplane upgrades.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum CrossplaneUpgradeChannel {
    /// Disables auto-upgrades and keeps the control plane at its current version.
    None,
    /// Upgrades to the latest supported patch release of the current minor version.
    Patch,
    /// Upgrades to the latest supported patch release on minor version N-1.
    #[default]
    Stable,
    /// Upgrades to the latest supported patch release on the latest minor version.
    Rapid,
}

/// Auto upgrade policy for Crossplane.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossplaneAutoUpgradeSpec {
    /// Upgrade channel, `Stable` by default.
    #[serde(default = "default_upgrade_channel")]
    pub channel: Option<CrossplaneUpgradeChannel>,
}

impl Default for CrossplaneAutoUpgradeSpec {
    fn default() -> Self {
        Self {
            channel: default_upgrade_channel(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_upgrade_channel() -> Option<CrossplaneUpgradeChannel> {
    Some(CrossplaneUpgradeChannel::Stable)
}

/// Configuration for Crossplane.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossplaneSpec {
    /// Version of Universal Crossplane to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Auto upgrade configuration for Crossplane.
    #[serde(
        default,
        rename = "autoUpgrade",
        skip_serializing_if = "Option::is_none"
    )]
    pub auto_upgrade: Option<CrossplaneAutoUpgradeSpec>,
}

/// A reference to a secret in an arbitrary namespace.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the secret.
    pub name: String,

    /// Namespace of the secret. Defaults to the namespace of the referencing resource.
    #[serde(default)]
    pub namespace: String,
}

/// Metadata applied to a published connection secret.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSecretMetadata {
    /// Labels of the connection secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Annotations of the connection secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Type of the connection secret.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
}

/// A reference to a secret store config.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfigReference {
    /// Name of the store config.
    #[serde(default = "default_store_config")]
    pub name: String,
}

fn default_store_config() -> String {
    "default".to_string()
}

/// Where and how connection details are published.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishConnectionDetailsTo {
    /// Name of the connection secret.
    pub name: String,

    /// Metadata of the connection secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConnectionSecretMetadata>,

    /// Secret store config to publish with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<StoreConfigReference>,
}

/// Details about the backup to restore a control plane from.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Restore {
    /// Source `Backup` or `BackupSchedule` to restore from. Immutable.
    pub source: TypedLocalObjectReference,

    /// Time at which the control plane was restored, set by the system (RFC3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// Which controllers of a control plane are paused.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PausedControllers {
    /// Restart (scale up) all Crossplane and provider workloads.
    #[default]
    None,
    /// Pause (scale down) all Crossplane and provider workloads.
    AllCrossplane,
}

/// Reconciliation policies on Crossplane and the workloads of a control plane.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationPolicy {
    /// Whether the control plane controllers are paused.
    #[serde(default)]
    pub paused_controllers: PausedControllers,
}

fn default_management_policies() -> Vec<ManagementAction> {
    vec![ManagementAction::All]
}

/// `ControlPlane` defines a managed Crossplane instance.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "spaces.upbound.io",
    version = "v1beta1",
    kind = "ControlPlane",
    namespaced,
    shortname = "ctp",
    shortname = "ctps",
    category = "spaces",
    doc = "ControlPlane defines a managed Crossplane instance."
)]
#[kube(status = "ControlPlaneStatus")]
#[kube(
    printcolumn = r#"{"name":"Crossplane","type":"string","jsonPath":".spec.crossplane.version"}"#
)]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(
    printcolumn = r#"{"name":"Healthy","type":"string","jsonPath":".status.conditions[?(@.type=='Healthy')].status"}"#
)]
#[kube(printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#)]
#[kube(
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneSpec {
    /// Namespace and name of a Secret the connection details are written to.
    ///
    /// Deprecated: use Hub or Upbound identities instead.
    #[serde(
        default,
        rename = "writeConnectionSecretToRef",
        skip_serializing_if = "Option::is_none"
    )]
    pub write_connection_secret_to_reference: Option<SecretReference>,

    /// Connection secret config the connection details are published to.
    ///
    /// Deprecated: use Hub or Upbound identities instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_connection_details_to: Option<PublishConnectionDetailsTo>,

    /// Actions Crossplane is allowed to take on the managed and external resources.
    #[serde(default = "default_management_policies")]
    pub management_policies: Vec<ManagementAction>,

    /// What happens to the external resource when this resource is deleted.
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,

    /// Configuration for Crossplane.
    #[serde(default)]
    pub crossplane: CrossplaneSpec,

    /// Restore configuration of the control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<Restore>,

    /// Reconciliation policies on Crossplane and the control plane workloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_policy: Option<ReconciliationPolicy>,
}

impl Default for ControlPlaneSpec {
    fn default() -> Self {
        Self {
            write_connection_secret_to_reference: None,
            publish_connection_details_to: None,
            management_policies: default_management_policies(),
            deletion_policy: DeletionPolicy::default(),
            crossplane: CrossplaneSpec::default(),
            restore: None,
            reconciliation_policy: None,
        }
    }
}

/// Validate a `ControlPlane` spec.
///
/// # Errors
///
/// Returns an error if auto-upgrades are disabled (`None` channel) without pinning a
/// Crossplane version.
pub fn validate_control_plane_spec(spec: &ControlPlaneSpec) -> Result<(), SpecValidationError> {
    let channel_none = spec
        .crossplane
        .auto_upgrade
        .as_ref()
        .and_then(|a| a.channel)
        == Some(CrossplaneUpgradeChannel::None);
    let version_empty = spec.crossplane.version.as_deref().unwrap_or_default().is_empty();

    if channel_none && version_empty {
        return Err(SpecValidationError::MissingCrossplaneVersion);
    }
    Ok(())
}

/// `ControlPlane` status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneStatus {
    /// Conditions of the resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// The generation observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Human-readable message about why the control plane is in this condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Identifier of the control plane.
    #[serde(
        default,
        rename = "controlPlaneID",
        skip_serializing_if = "Option::is_none"
    )]
    pub control_plane_id: Option<String>,

    /// Identifier of the host cluster running the control plane.
    #[serde(
        default,
        rename = "hostClusterID",
        skip_serializing_if = "Option::is_none"
    )]
    pub host_cluster_id: Option<String>,
}

impl Conditioned for ControlPlaneStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl ControlPlane {
    /// Return the condition of the given type, or an `Unknown` condition if absent.
    #[must_use]
    pub fn get_condition(&self, condition_type: &str) -> Condition {
        get_condition(
            self.status
                .as_ref()
                .map(|s| s.conditions.as_slice())
                .unwrap_or_default(),
            condition_type,
        )
    }

    /// Set conditions on this `ControlPlane`'s status.
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.status
            .get_or_insert_with(ControlPlaneStatus::default)
            .set_conditions(conditions);
    }

    /// Deletion policy of this `ControlPlane`.
    #[must_use]
    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.spec.deletion_policy
    }

    /// Management policies of this `ControlPlane`.
    #[must_use]
    pub fn management_policies(&self) -> &[ManagementAction] {
        &self.spec.management_policies
    }

    /// Replace the management policies of this `ControlPlane`.
    pub fn set_management_policies(&mut self, policies: Vec<ManagementAction>) {
        self.spec.management_policies = policies;
    }

    /// Connection details publishing config of this `ControlPlane`.
    #[must_use]
    pub fn publish_connection_details_to(&self) -> Option<&PublishConnectionDetailsTo> {
        self.spec.publish_connection_details_to.as_ref()
    }

    /// Replace the connection details publishing config.
    pub fn set_publish_connection_details_to(&mut self, to: Option<PublishConnectionDetailsTo>) {
        self.spec.publish_connection_details_to = to;
    }

    /// Connection secret reference, with the namespace defaulted to this
    /// `ControlPlane`'s namespace.
    #[must_use]
    pub fn write_connection_secret_to_reference(&self) -> Option<SecretReference> {
        let reference = self.spec.write_connection_secret_to_reference.as_ref()?;
        let namespace = if reference.namespace.is_empty() {
            self.metadata.namespace.clone().unwrap_or_default()
        } else {
            reference.namespace.clone()
        };
        Some(SecretReference {
            name: reference.name.clone(),
            namespace,
        })
    }

    /// Replace the connection secret reference.
    pub fn set_write_connection_secret_to_reference(&mut self, reference: Option<SecretReference>) {
        self.spec.write_connection_secret_to_reference = reference;
    }

    /// Name of the secret holding this control plane's kubeconfig.
    #[must_use]
    pub fn connection_secret_name(&self) -> String {
        self.connection_secret().name
    }

    /// Name and namespace of the secret holding this control plane's kubeconfig.
    ///
    /// Falls back to `kubeconfig-<name>` in the `ControlPlane`'s namespace when no
    /// connection secret reference is set.
    #[must_use]
    pub fn connection_secret(&self) -> SecretReference {
        self.write_connection_secret_to_reference()
            .unwrap_or_else(|| SecretReference {
                name: format!(
                    "{DEFAULT_CONNECTION_SECRET_PREFIX}{}",
                    self.metadata.name.clone().unwrap_or_default()
                ),
                namespace: self.metadata.namespace.clone().unwrap_or_default(),
            })
    }
}
