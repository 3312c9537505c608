// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `executor.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{Metadata, PatchIntent, PatchState, PatchStateReason};
    use crate::override_errors::{ApiStatusError, ObjectStoreError, TraversalError};
    use crate::reconcilers::overrides::executor::{apply, execute};
    use crate::reconcilers::overrides::store::ApplyIntent;
    use crate::reconcilers::overrides::testing::{object, reference_to, FakeStore};
    use crate::reconcilers::overrides::walker::VisitedObject;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pause() -> ApplyIntent {
        ApplyIntent::Patch(PatchIntent {
            metadata: Some(Metadata {
                annotations: Some(BTreeMap::from([(
                    "crossplane.io/paused".to_string(),
                    "true".to_string(),
                )])),
            }),
            spec: None,
        })
    }

    fn visited(object: &kube::api::DynamicObject) -> VisitedObject {
        VisitedObject {
            reference: reference_to(object),
            uid: object.metadata.uid.clone(),
            fetch_error: None,
        }
    }

    #[tokio::test]
    async fn test_apply_returns_uid() {
        let xr = object("example.org/v1", "XNetwork", None, "network", "uid-xr");
        let store = FakeStore::new().with(xr.clone());

        let uid = apply(&store, &reference_to(&xr), &pause(), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(uid, "uid-xr");
        let applied = store.applied.lock().unwrap();
        assert_eq!(
            applied[0].1,
            json!({
                "apiVersion": "example.org/v1",
                "kind": "XNetwork",
                "metadata": {
                    "name": "network",
                    "annotations": {"crossplane.io/paused": "true"}
                }
            })
        );
    }

    #[tokio::test]
    async fn test_reapplying_same_intent_succeeds_with_same_body() {
        let xr = object("example.org/v1", "XNetwork", None, "network", "uid-xr");
        let store = FakeStore::new().with(xr.clone());

        let first = apply(&store, &reference_to(&xr), &pause(), TIMEOUT).await;
        let second = apply(&store, &reference_to(&xr), &pause(), TIMEOUT).await;

        assert_eq!(first.unwrap(), second.unwrap());
        let applied = store.applied.lock().unwrap();
        assert_eq!(applied[0].1, applied[1].1);
    }

    #[tokio::test]
    async fn test_apply_times_out() {
        let xr = object("example.org/v1", "XNetwork", None, "network", "uid-xr");
        let store = FakeStore::new()
            .with(xr.clone())
            .with_apply_delay(Duration::from_millis(500));

        let err = apply(
            &store,
            &reference_to(&xr),
            &pause(),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ObjectStoreError::Timeout { operation: "apply", .. }));
    }

    #[tokio::test]
    async fn test_execute_classifies_every_object_in_order() {
        let claim = object("example.org/v1", "Network", Some("default"), "claim", "uid-claim");
        let xr = object("example.org/v1", "XNetwork", None, "network", "uid-xr");
        let vpc = object("ec2.aws.upbound.io/v1beta1", "VPC", None, "vpc", "uid-vpc");
        let store = FakeStore::new()
            .with(claim.clone())
            .with(xr.clone())
            .with(vpc.clone())
            .with_apply_error(
                &reference_to(&xr),
                ObjectStoreError::Api(ApiStatusError::apply_conflict("Apply failed with 1 conflict")),
            )
            .with_apply_error(
                &reference_to(&vpc),
                ObjectStoreError::Transport("connection reset".to_string()),
            );

        let results = execute(
            &store,
            vec![visited(&claim), visited(&xr), visited(&vpc)],
            &pause(),
            TIMEOUT,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, PatchState::Success);
        assert_eq!(results[1].status, PatchState::Skipped);
        assert_eq!(results[1].reason, Some(PatchStateReason::Conflict));
        assert_eq!(results[2].status, PatchState::Error);
        assert!(results[2].reason.is_none());
        assert_eq!(store.applied_names(), vec!["claim", "network", "vpc"]);
    }

    #[tokio::test]
    async fn test_execute_does_not_apply_absent_objects() {
        let gone = object("ec2.aws.upbound.io/v1beta1", "VPC", None, "gone", "uid-gone");
        let store = FakeStore::new();
        let absent = VisitedObject {
            reference: reference_to(&gone),
            uid: None,
            fetch_error: Some(ObjectStoreError::Api(ApiStatusError::not_found(
                "vpcs", "gone",
            ))),
        };

        let results = execute(
            &store,
            vec![absent],
            &pause(),
            TIMEOUT,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(results[0].is_absent());
        assert!(store.applied_names().is_empty());
    }

    #[tokio::test]
    async fn test_execute_release_sends_empty_intent() {
        let xr = object("example.org/v1", "XNetwork", None, "network", "uid-xr");
        let store = FakeStore::new().with(xr.clone());

        let results = execute(
            &store,
            vec![visited(&xr)],
            &ApplyIntent::Release,
            TIMEOUT,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(results[0].status, PatchState::Success);
        let applied = store.applied.lock().unwrap();
        assert_eq!(
            applied[0].1,
            json!({
                "apiVersion": "example.org/v1",
                "kind": "XNetwork",
                "metadata": {"name": "network"}
            })
        );
    }

    #[tokio::test]
    async fn test_execute_cancelled_returns_no_results() {
        let xr = object("example.org/v1", "XNetwork", None, "network", "uid-xr");
        let store = FakeStore::new().with(xr.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = execute(&store, vec![visited(&xr)], &pause(), TIMEOUT, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, TraversalError::Cancelled));
        assert!(store.applied_names().is_empty());
    }
}
