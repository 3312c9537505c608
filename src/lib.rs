// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Spaces - Control Plane Override Controller
//!
//! Spaces manages Crossplane control planes on a host cluster. This crate provides the
//! Spaces API types and the controller that propagates configuration overrides into the
//! object hierarchies living inside those control planes.
//!
//! ## Overview
//!
//! An override names a target object in a control plane, a propagation direction and a
//! small patch (the `crossplane.io/paused` annotation, the force-reconcile annotation or
//! management policies). The controller:
//!
//! - Walks the target's hierarchy up through owner references or down through resource
//!   references
//! - Server-side applies the patch to every visited object with a dedicated field manager
//! - Records a per-object outcome and a `Ready` condition in the override's status
//! - Releases every claimed field again when the override is deleted
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for `ControlPlane` and the overrides
//! - [`reconcilers`] - Reconciliation logic and the hierarchical override engine
//! - [`override_controller`] - Generic controller loop shared by both override kinds
//! - [`context`] - Shared context, reflector stores and control plane clients
//! - [`conditions`] - Status condition builders
//! - [`override_errors`] - Error taxonomy of override passes
//!
//! ## Example
//!
//! ```rust,no_run
//! use spaces::crd::{
//!     InControlPlaneOverride, InControlPlaneOverrideSpec, Metadata, PatchIntent,
//!     PropagationMode, TypedObjectReference,
//! };
//! use std::collections::BTreeMap;
//!
//! let ovr = InControlPlaneOverride::new(
//!     "pause-network",
//!     InControlPlaneOverrideSpec {
//!         control_plane_name: "ctp1".to_string(),
//!         target: TypedObjectReference::new("example.org/v1", "XNetwork", "network-1", None),
//!         propagation_mode: PropagationMode::Descending,
//!         patch: PatchIntent {
//!             metadata: Some(Metadata {
//!                 annotations: Some(BTreeMap::from([(
//!                     "crossplane.io/paused".to_string(),
//!                     "true".to_string(),
//!                 )])),
//!             }),
//!             spec: None,
//!         },
//!     },
//! );
//! ```

pub mod conditions;
pub mod constants;
pub mod context;
pub mod crd;
pub mod metrics;
pub mod override_controller;
pub mod override_errors;
pub mod reconcilers;
pub mod status_reasons;
