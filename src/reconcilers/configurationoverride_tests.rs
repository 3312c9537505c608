// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `configurationoverride.rs`

#[cfg(test)]
mod tests {
    use super::super::{patch_hierarchy, release_hierarchy, resolve_target};
    use crate::constants::{ANNOTATION_FORCE_RECONCILE_AT, CATEGORY_MANAGED};
    use crate::crd::{
        Conditioned, ConfigurationOverride, ConfigurationOverrideSpec, ConfigurationPatch,
        Metadata, PropagationMode, Target, TypedObjectReference,
    };
    use crate::override_errors::{ObjectStoreError, TraversalError};
    use crate::reconcilers::overrides::testing::{object, owned_by, FakeStore};
    use crate::reconcilers::overrides::PassSettings;
    use crate::reconcilers::Deletion;
    use crate::status_reasons::{
        CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY, REASON_DELETED,
        REASON_PATCH_ERROR,
    };
    use kube::api::DynamicObject;
    use std::collections::BTreeMap;
    use tokio_util::sync::CancellationToken;

    const FORCED_AT: &str = "2025-06-01T00:00:00Z";

    fn bucket() -> DynamicObject {
        object("s3.aws.upbound.io/v1beta1", "Bucket", None, "bucket-1", "uid-bucket")
    }

    fn storage() -> DynamicObject {
        object("example.org/v1", "XStorage", None, "storage-1", "uid-storage")
    }

    /// bucket is owned by storage
    fn store() -> FakeStore {
        FakeStore::new()
            .with(owned_by(bucket(), &storage()))
            .with(storage())
            .with_resolved(
                "Bucket",
                TypedObjectReference::new("s3.aws.upbound.io/v1beta1", "Bucket", "", None),
            )
    }

    fn force_reconcile(mode: PropagationMode) -> ConfigurationOverride {
        let mut ovr = ConfigurationOverride::new(
            "force-bucket",
            ConfigurationOverrideSpec {
                control_plane: "ctp1".to_string(),
                target: Target {
                    api_group: None,
                    kind: "Bucket".to_string(),
                    name: "bucket-1".to_string(),
                    namespace: None,
                    category: Some(CATEGORY_MANAGED.to_string()),
                },
                propagation_mode: mode,
                patch: ConfigurationPatch {
                    metadata: Some(Metadata {
                        annotations: Some(BTreeMap::from([(
                            ANNOTATION_FORCE_RECONCILE_AT.to_string(),
                            FORCED_AT.to_string(),
                        )])),
                    }),
                },
            },
        );
        ovr.metadata.namespace = Some("default".to_string());
        ovr.metadata.generation = Some(1);
        ovr
    }

    #[tokio::test]
    async fn test_resolve_target_by_category() {
        let store = store();
        let ovr = force_reconcile(PropagationMode::None);

        let root = resolve_target(&store, &ovr).await.unwrap();

        assert_eq!(root.group(), "s3.aws.upbound.io");
        assert_eq!(root.kind, "Bucket");
        assert_eq!(root.name, "bucket-1");
    }

    #[tokio::test]
    async fn test_resolve_unknown_kind_fails_the_pass() {
        let store = FakeStore::new();
        let ovr = force_reconcile(PropagationMode::None);

        let err = patch_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            TraversalError::Resolve {
                source: ObjectStoreError::UnknownKind { .. },
                ..
            }
        ));
        assert_eq!(*store.gets.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_patch_ascends_to_owner() {
        let store = store();
        let ovr = force_reconcile(PropagationMode::Ascending);

        let status = patch_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.applied_names(), vec!["bucket-1", "storage-1"]);
        assert_eq!(status.observed_generation, Some(1));
        assert_eq!(
            status.get_condition(CONDITION_TYPE_READY).status,
            CONDITION_STATUS_TRUE
        );

        let applied = store.applied.lock().unwrap();
        assert_eq!(
            applied[0].1["metadata"]["annotations"][ANNOTATION_FORCE_RECONCILE_AT],
            FORCED_AT
        );
    }

    #[tokio::test]
    async fn test_failed_object_makes_override_not_ready() {
        let store = store().with_apply_error(
            &TypedObjectReference::new("example.org/v1", "XStorage", "storage-1", None),
            ObjectStoreError::Transport("connection reset by peer".to_string()),
        );
        let ovr = force_reconcile(PropagationMode::Ascending);

        let status = patch_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let ready = status.get_condition(CONDITION_TYPE_READY);
        assert_eq!(ready.status, CONDITION_STATUS_FALSE);
        assert_eq!(ready.reason, REASON_PATCH_ERROR);
        assert_eq!(status.conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_release_reports_deleted() {
        let store = store();
        let ovr = force_reconcile(PropagationMode::Ascending);

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let Deletion::Unwound(status) = deletion else {
            panic!("expected the hierarchy to be unwound, got {deletion:?}");
        };
        assert_eq!(
            status.get_condition(CONDITION_TYPE_READY).reason,
            REASON_DELETED
        );
        assert_eq!(store.applied_names(), vec!["bucket-1", "storage-1"]);
    }

    #[tokio::test]
    async fn test_release_of_missing_target() {
        let store = FakeStore::new().with_resolved(
            "Bucket",
            TypedObjectReference::new("s3.aws.upbound.io/v1beta1", "Bucket", "", None),
        );
        let ovr = force_reconcile(PropagationMode::None);

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(deletion, Deletion::TargetGone);
    }

    #[tokio::test]
    async fn test_release_when_category_no_longer_serves_kind() {
        let store = FakeStore::new();
        let ovr = force_reconcile(PropagationMode::Ascending);

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(deletion, Deletion::TargetGone);
        assert_eq!(*store.gets.lock().unwrap(), 0);
        assert!(store.applied_names().is_empty());
    }
}
