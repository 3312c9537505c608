// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Spaces APIs and the override controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Spaces CRDs
pub const API_GROUP: &str = "spaces.upbound.io";

/// API version of the `ControlPlane` CRD
pub const API_VERSION_V1BETA1: &str = "v1beta1";

/// API version of the override CRDs
pub const API_VERSION_V1ALPHA1: &str = "v1alpha1";

/// Kind name for `ControlPlane` resource
pub const KIND_CONTROL_PLANE: &str = "ControlPlane";

/// Kind name for `InControlPlaneOverride` resource
pub const KIND_IN_CONTROL_PLANE_OVERRIDE: &str = "InControlPlaneOverride";

/// Kind name for `ConfigurationOverride` resource
pub const KIND_CONFIGURATION_OVERRIDE: &str = "ConfigurationOverride";

/// Category every Spaces resource is registered under
pub const CATEGORY_SPACES: &str = "spaces";

/// Only category accepted on a `ConfigurationOverride` target
pub const CATEGORY_MANAGED: &str = "managed";

// ============================================================================
// Annotation and Label Keys
// ============================================================================

/// Annotation pausing reconciliation of a Crossplane resource
pub const ANNOTATION_PAUSED: &str = "crossplane.io/paused";

/// Annotation forcing a reconciliation at the given timestamp
pub const ANNOTATION_FORCE_RECONCILE_AT: &str = "spaces.upbound.io/force-reconcile-at";

/// Annotations an override patch is allowed to carry
pub const ALLOWED_PATCH_ANNOTATIONS: [&str; 2] = [ANNOTATION_PAUSED, ANNOTATION_FORCE_RECONCILE_AT];

/// Key for the message shown in the message column in kubectl
pub const CONDITION_MESSAGE_ANNOTATION_KEY: &str = "internal.spaces.upbound.io/message";

/// Label marking a namespace as a control plane group (value `"true"`)
pub const CONTROL_PLANE_GROUP_LABEL_KEY: &str = "spaces.upbound.io/group";

/// Label protecting a group from deletion via the Spaces API
pub const CONTROL_PLANE_GROUP_PROTECTION_KEY: &str = "spaces.upbound.io/group-deletion-protection";

/// Selects the kube control plane composition of a `ControlPlane` (alpha)
pub const KUBE_COMPOSITION_ANNOTATION: &str = "internal.spaces.upbound.io/kube-composition";

/// Inline map of feature gates enabled for a `ControlPlane`
pub const FEATURES_ANNOTATION: &str = "internal.spaces.upbound.io/features";

/// Tier limits applied to a `ControlPlane` by the account gate
pub const TIER_LIMITS_ANNOTATION: &str = "internal.spaces.upbound.io/tier-limits";

// ============================================================================
// Connection Secret Constants
// ============================================================================

/// Connection secret key holding the kubeconfig used by in-cluster workloads
pub const KUBECONFIG_IN_CLUSTER_KEY: &str = "kubeconfig-incluster";

/// Connection secret key holding the external kubeconfig
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Prefix of the default connection secret name (`kubeconfig-<controlplane>`)
pub const DEFAULT_CONNECTION_SECRET_PREFIX: &str = "kubeconfig-";

// ============================================================================
// Override Engine Constants
// ============================================================================

/// Field manager used for server-side apply inside control planes
pub const DEFAULT_FIELD_MANAGER: &str = "spaces-override-controller";

/// Finalizer placed on `InControlPlaneOverride` resources
pub const IN_CONTROL_PLANE_OVERRIDE_FINALIZER: &str =
    "incontrolplaneoverride.spaces.upbound.io/finalizer";

/// Finalizer placed on `ConfigurationOverride` resources
pub const CONFIGURATION_OVERRIDE_FINALIZER: &str =
    "configurationoverride.spaces.upbound.io/finalizer";

/// Default upper bound on the number of objects visited in one hierarchy walk
pub const DEFAULT_MAX_HIERARCHY_OBJECTS: usize = 512;

/// Default timeout for a single object fetch or apply (10 seconds)
pub const DEFAULT_PER_OBJECT_TIMEOUT_SECS: u64 = 10;

/// API status reason for a missing object
pub const STATUS_REASON_NOT_FOUND: &str = "NotFound";

/// API status reason for a server-side internal error
pub const STATUS_REASON_INTERNAL_ERROR: &str = "InternalError";

/// API status reason for a conflicting write
pub const STATUS_REASON_CONFLICT: &str = "Conflict";

/// Status cause type reported for server-side apply field manager conflicts
pub const CAUSE_TYPE_FIELD_MANAGER_CONFLICT: &str = "FieldManagerConflict";

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue interval for ready resources (5 minutes)
pub const DEFAULT_REQUEUE_READY_SECS: u64 = 300;

/// Requeue interval for resources that are not ready yet (30 seconds)
pub const DEFAULT_REQUEUE_NOT_READY_SECS: u64 = 30;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
