// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `incontrolplaneoverride.rs`

#[cfg(test)]
mod tests {
    use super::super::{patch_hierarchy, release_hierarchy};
    use crate::constants::ANNOTATION_PAUSED;
    use crate::crd::{
        Conditioned, InControlPlaneOverride, InControlPlaneOverrideSpec, Metadata, PatchIntent,
        PatchState, PropagationMode,
    };
    use crate::override_errors::{ApiStatusError, ObjectStoreError};
    use crate::reconcilers::overrides::testing::{
        object, reference_to, with_resource_ref, FakeStore,
    };
    use crate::reconcilers::overrides::PassSettings;
    use crate::reconcilers::Deletion;
    use crate::status_reasons::{
        CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY, REASON_DELETED,
        REASON_PATCH_ERROR, REASON_TRAVERSED,
    };
    use kube::api::DynamicObject;
    use std::collections::BTreeMap;
    use tokio_util::sync::CancellationToken;

    fn vpc() -> DynamicObject {
        object("ec2.aws.upbound.io/v1beta1", "VPC", None, "vpc", "uid-vpc")
    }

    fn network() -> DynamicObject {
        object("example.org/v1", "XNetwork", None, "network", "uid-xr")
    }

    /// claim -> network -> vpc
    fn chain() -> (DynamicObject, FakeStore) {
        let xr = with_resource_ref(network(), &vpc());
        let claim = with_resource_ref(
            object("example.org/v1", "Network", Some("default"), "claim", "uid-claim"),
            &xr,
        );
        let store = FakeStore::new().with(claim.clone()).with(xr).with(vpc());
        (claim, store)
    }

    fn pause_override(target: &DynamicObject) -> InControlPlaneOverride {
        let mut ovr = InControlPlaneOverride::new(
            "pause-network",
            InControlPlaneOverrideSpec {
                control_plane_name: "ctp1".to_string(),
                target: reference_to(target),
                propagation_mode: PropagationMode::Descending,
                patch: PatchIntent {
                    metadata: Some(Metadata {
                        annotations: Some(BTreeMap::from([(
                            ANNOTATION_PAUSED.to_string(),
                            "true".to_string(),
                        )])),
                    }),
                    spec: None,
                },
            },
        );
        ovr.metadata.namespace = Some("default".to_string());
        ovr.metadata.generation = Some(4);
        ovr
    }

    #[tokio::test]
    async fn test_patch_hierarchy_pauses_every_object() {
        let (claim, store) = chain();
        let ovr = pause_override(&claim);

        let status = patch_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(status.observed_generation, Some(4));
        assert_eq!(status.object_refs.len(), 3);
        assert_eq!(status.object_refs[0].name, "claim");
        assert!(status
            .object_refs
            .iter()
            .all(|r| r.status == PatchState::Success));

        let ready = status.get_condition(CONDITION_TYPE_READY);
        assert_eq!(ready.status, CONDITION_STATUS_TRUE);
        assert_eq!(ready.reason, REASON_TRAVERSED);

        let applied = store.applied.lock().unwrap();
        assert_eq!(applied.len(), 3);
        assert!(applied
            .iter()
            .all(|(_, body)| body["metadata"]["annotations"][ANNOTATION_PAUSED] == "true"));
    }

    #[tokio::test]
    async fn test_release_hierarchy_unwinds_with_empty_intent() {
        let (claim, store) = chain();
        let ovr = pause_override(&claim);

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
        let ready = status.get_condition(CONDITION_TYPE_READY);
        assert_eq!(ready.status, CONDITION_STATUS_FALSE);
        assert_eq!(ready.reason, REASON_DELETED);

        let applied = store.applied.lock().unwrap();
        assert_eq!(applied.len(), 3);
        assert!(applied
            .iter()
            .all(|(_, body)| body["metadata"].get("annotations").is_none()));
    }

    #[tokio::test]
    async fn test_release_treats_vanished_objects_as_released() {
        let (claim, store) = chain();
        let store = store.with_apply_error(
            &reference_to(&vpc()),
            ObjectStoreError::Api(ApiStatusError::not_found("vpcs", "vpc")),
        );
        let ovr = pause_override(&claim);

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(deletion, Deletion::Unwound(_)));
    }

    #[tokio::test]
    async fn test_release_pending_while_an_object_fails() {
        let (claim, store) = chain();
        let store = store.with_apply_error(
            &reference_to(&network()),
            ObjectStoreError::Transport("connection reset by peer".to_string()),
        );
        let ovr = pause_override(&claim);

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let Deletion::Pending(status) = deletion else {
            panic!("expected a pending deletion, got {deletion:?}");
        };
        assert_eq!(status.object_refs[1].status, PatchState::Error);
        assert_eq!(
            status.get_condition(CONDITION_TYPE_READY).reason,
            REASON_PATCH_ERROR
        );
    }

    #[tokio::test]
    async fn test_release_of_missing_target() {
        let store = FakeStore::new();
        let ovr = pause_override(&network());

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(deletion, Deletion::TargetGone);
        assert!(store.applied_names().is_empty());
    }

    #[tokio::test]
    async fn test_release_of_target_whose_kind_is_no_longer_served() {
        let (claim, store) = chain();
        let store = store.with_get_error(
            &reference_to(&claim),
            ObjectStoreError::UnknownKind {
                group: "example.org".to_string(),
                kind: "Network".to_string(),
            },
        );
        let ovr = pause_override(&claim);

        let deletion = release_hierarchy(
            &store,
            &ovr,
            &PassSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(deletion, Deletion::TargetGone);
        assert!(store.applied_names().is_empty());
    }

    #[tokio::test]
    async fn test_release_counts_unserved_child_kind_as_released() {
        let (claim, store) = chain();
        let store = store.with_get_error(
            &reference_to(&vpc()),
            ObjectStoreError::UnknownKind {
                group: "ec2.aws.upbound.io".to_string(),
                kind: "VPC".to_string(),
            },
        );
        let ovr = pause_override(&claim);

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
        let vpc_result = &status.object_refs[2];
        assert_eq!(vpc_result.name, "vpc");
        assert_eq!(vpc_result.status, PatchState::Error);
        assert!(vpc_result.is_absent());
        assert_eq!(store.applied_names(), vec!["claim", "network"]);
    }

    #[tokio::test]
    async fn test_patch_hierarchy_cancelled_before_start() {
        let (claim, store) = chain();
        let ovr = pause_override(&claim);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = patch_hierarchy(&store, &ovr, &PassSettings::default(), &cancel).await;

        assert!(matches!(
            result,
            Err(crate::override_errors::TraversalError::Cancelled)
        ));
        assert!(store.applied_names().is_empty());
    }
}
