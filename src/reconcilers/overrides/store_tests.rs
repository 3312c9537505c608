// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        ManagementAction, Metadata, ObjectSpec, PatchIntent, Target, TypedObjectReference,
    };
    use crate::override_errors::ObjectStoreError;
    use crate::reconcilers::overrides::store::{
        apply_namespace, category_candidates, category_to_resolve, discovery_error,
        discovery_key, object_api_version, select_candidate, ApplyIntent,
    };
    use crate::reconcilers::overrides::testing::object;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
    use kube::discovery::Scope;
    use kube::error::DiscoveryError;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_patch_for_namespaced_object() {
        let intent = ApplyIntent::Patch(PatchIntent {
            metadata: Some(Metadata {
                annotations: Some(BTreeMap::from([(
                    "crossplane.io/paused".to_string(),
                    "true".to_string(),
                )])),
            }),
            spec: Some(ObjectSpec {
                management_policies: Some(vec![ManagementAction::Observe]),
            }),
        });

        let body = intent.render("example.org/v1", "Network", "claim", Some("default"));

        assert_eq!(
            body,
            json!({
                "apiVersion": "example.org/v1",
                "kind": "Network",
                "metadata": {
                    "name": "claim",
                    "namespace": "default",
                    "annotations": {"crossplane.io/paused": "true"}
                },
                "spec": {"managementPolicies": ["Observe"]}
            })
        );
    }

    #[test]
    fn test_render_release_claims_no_fields() {
        let body = ApplyIntent::Release.render("example.org/v1", "XNetwork", "network", None);

        assert_eq!(
            body,
            json!({
                "apiVersion": "example.org/v1",
                "kind": "XNetwork",
                "metadata": {"name": "network"}
            })
        );
    }

    #[test]
    fn test_render_drops_empty_namespace() {
        let body = ApplyIntent::Release.render("v1", "ConfigMap", "cm", Some(""));

        assert!(body["metadata"].get("namespace").is_none());
    }

    #[test]
    fn test_object_api_version_prefers_object_type() {
        let vpc = object("ec2.aws.upbound.io/v1beta1", "VPC", None, "vpc", "uid-vpc");
        let fallback = TypedObjectReference::new("ec2.aws.upbound.io", "VPC", "vpc", None);

        assert_eq!(
            object_api_version(&vpc, &fallback).as_deref(),
            Some("ec2.aws.upbound.io/v1beta1")
        );
    }

    #[test]
    fn test_object_api_version_falls_back_to_reference() {
        let mut vpc = object("ec2.aws.upbound.io/v1beta1", "VPC", None, "vpc", "uid-vpc");
        vpc.types = None;
        let fallback = TypedObjectReference::new("ec2.aws.upbound.io", "VPC", "vpc", None);

        assert_eq!(
            object_api_version(&vpc, &fallback).as_deref(),
            Some("ec2.aws.upbound.io")
        );
    }

    fn resource(name: &str, kind: &str, categories: &[&str]) -> APIResource {
        APIResource {
            name: name.to_string(),
            kind: kind.to_string(),
            categories: (!categories.is_empty())
                .then(|| categories.iter().map(ToString::to_string).collect()),
            ..Default::default()
        }
    }

    fn list(group_version: &str, resources: Vec<APIResource>) -> APIResourceList {
        APIResourceList {
            group_version: group_version.to_string(),
            resources,
        }
    }

    fn served() -> Vec<APIResourceList> {
        vec![
            list(
                "v1",
                vec![
                    resource("configmaps", "ConfigMap", &["all"]),
                    resource("pods", "Pod", &["all"]),
                ],
            ),
            list(
                "s3.aws.upbound.io/v1beta1",
                vec![
                    resource("buckets", "Bucket", &["crossplane", "managed", "aws"]),
                    resource("buckets/status", "Bucket", &["managed"]),
                ],
            ),
            list(
                "storage.gcp.upbound.io/v1beta1",
                vec![resource("buckets", "Bucket", &["crossplane", "managed", "gcp"])],
            ),
            list(
                "ec2.aws.upbound.io/v1beta1",
                vec![
                    resource("vpcs", "VPC", &["crossplane", "managed", "aws"]),
                    resource("vpcs/status", "Subnet", &["managed"]),
                ],
            ),
            list(
                "example.org/v1",
                vec![resource("xnetworks", "XNetwork", &["composite"])],
            ),
        ]
    }

    fn category_target(api_group: Option<&str>, category: Option<&str>) -> Target {
        Target {
            api_group: api_group.map(ToString::to_string),
            kind: "Bucket".to_string(),
            name: "bucket-1".to_string(),
            namespace: None,
            category: category.map(ToString::to_string),
        }
    }

    #[test]
    fn test_category_to_resolve() {
        assert_eq!(category_to_resolve(&category_target(None, None)), None);
        assert_eq!(
            category_to_resolve(&category_target(None, Some("managed"))),
            Some("managed")
        );
        assert_eq!(
            category_to_resolve(&category_target(Some(""), Some("managed"))),
            Some("managed")
        );
        assert_eq!(
            category_to_resolve(&category_target(Some("s3.aws.upbound.io"), Some("managed"))),
            None
        );
        assert_eq!(
            category_to_resolve(&category_target(
                Some("s3.aws.upbound.io/v1beta1"),
                Some("managed")
            )),
            None
        );
    }

    #[test]
    fn test_category_candidates_single() {
        assert_eq!(
            category_candidates(&served(), "VPC", "managed"),
            vec!["ec2.aws.upbound.io/v1beta1"]
        );
    }

    #[test]
    fn test_category_candidates_many() {
        assert_eq!(
            category_candidates(&served(), "Bucket", "managed"),
            vec!["s3.aws.upbound.io/v1beta1", "storage.gcp.upbound.io/v1beta1"]
        );
    }

    #[test]
    fn test_category_candidates_none() {
        assert!(category_candidates(&served(), "XNetwork", "managed").is_empty());
        assert!(category_candidates(&served(), "Queue", "managed").is_empty());
        assert!(category_candidates(&[], "Bucket", "managed").is_empty());
    }

    #[test]
    fn test_category_candidates_ignore_subresources() {
        // Only the status subresource of vpcs carries the Subnet kind.
        assert!(category_candidates(&served(), "Subnet", "managed").is_empty());
    }

    #[test]
    fn test_category_candidates_in_core_group() {
        assert_eq!(category_candidates(&served(), "ConfigMap", "all"), vec!["v1"]);
    }

    #[test]
    fn test_select_single_candidate_keeps_name_and_namespace() {
        let reference = TypedObjectReference::new("", "Bucket", "bucket-1", Some("default"));

        let resolved = select_candidate(
            reference,
            "managed",
            vec!["s3.aws.upbound.io/v1beta1".to_string()],
        )
        .unwrap();

        assert_eq!(resolved.group(), "s3.aws.upbound.io");
        assert_eq!(resolved.version(), Some("v1beta1"));
        assert_eq!(resolved.name, "bucket-1");
        assert_eq!(resolved.namespace(), Some("default"));
    }

    #[test]
    fn test_select_without_candidates_is_unknown_kind() {
        let reference = TypedObjectReference::new("", "Bucket", "bucket-1", None);

        let err = select_candidate(reference, "managed", vec![]).unwrap_err();

        assert!(matches!(err, ObjectStoreError::UnknownKind { ref kind, .. } if kind == "Bucket"));
    }

    #[test]
    fn test_select_ambiguous_candidates() {
        let reference = TypedObjectReference::new("", "Bucket", "bucket-1", None);
        let candidates = category_candidates(&served(), "Bucket", "managed");

        let err = select_candidate(reference, "managed", candidates).unwrap_err();

        let ObjectStoreError::AmbiguousKind {
            kind,
            category,
            candidates,
        } = err
        else {
            panic!("expected an ambiguous kind, got {err:?}");
        };
        assert_eq!(kind, "Bucket");
        assert_eq!(category, "managed");
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_apply_namespace_follows_scope() {
        let namespaced = TypedObjectReference::new("example.org/v1", "Network", "claim", Some("default"));
        let unset = TypedObjectReference::new("example.org/v1", "Network", "claim", Some(""));

        assert_eq!(apply_namespace(&Scope::Namespaced, &namespaced), Some("default"));
        assert_eq!(apply_namespace(&Scope::Cluster, &namespaced), None);
        assert_eq!(apply_namespace(&Scope::Namespaced, &unset), None);
    }

    #[test]
    fn test_discovery_key_separates_pinned_versions() {
        let pinned = TypedObjectReference::new("ec2.aws.upbound.io/v1beta1", "VPC", "a", None);
        let other_name = TypedObjectReference::new("ec2.aws.upbound.io/v1beta1", "VPC", "b", Some("ns"));
        let recommended = TypedObjectReference::new("ec2.aws.upbound.io", "VPC", "a", None);
        let core = TypedObjectReference::new("v1", "ConfigMap", "cm", Some("default"));

        assert_eq!(
            discovery_key(&pinned),
            (
                "ec2.aws.upbound.io".to_string(),
                Some("v1beta1".to_string()),
                "VPC".to_string()
            )
        );
        assert_eq!(discovery_key(&pinned), discovery_key(&other_name));
        assert_ne!(discovery_key(&pinned), discovery_key(&recommended));
        assert_eq!(
            discovery_key(&core),
            (String::new(), Some("v1".to_string()), "ConfigMap".to_string())
        );
    }

    #[test]
    fn test_discovery_failures_mean_unserved_kind() {
        let reference = TypedObjectReference::new("example.org", "XNetwork", "network", None);

        let missing_group = discovery_error(
            kube::Error::Discovery(DiscoveryError::MissingApiGroup("example.org".to_string())),
            &reference,
        );
        let missing_kind = discovery_error(
            kube::Error::Discovery(DiscoveryError::MissingKind("XNetwork".to_string())),
            &reference,
        );
        let unserved_version = discovery_error(
            kube::Error::Api(
                kube::core::Status::failure("the server could not find the requested resource", "NotFound")
                    .with_code(404)
                    .boxed(),
            ),
            &reference,
        );

        for err in [missing_group, missing_kind, unserved_version] {
            assert!(
                matches!(
                    err,
                    ObjectStoreError::UnknownKind { ref group, ref kind }
                        if group == "example.org" && kind == "XNetwork"
                ),
                "unexpected error {err:?}"
            );
            assert!(err.is_absent());
        }
    }

    #[test]
    fn test_other_discovery_failures_are_kept() {
        let reference = TypedObjectReference::new("example.org", "XNetwork", "network", None);

        let err = discovery_error(
            kube::Error::Api(
                kube::core::Status::failure("forbidden", "Forbidden")
                    .with_code(403)
                    .boxed(),
            ),
            &reference,
        );

        assert_eq!(err.api_status().map(|s| s.code), Some(403));
        assert!(!err.is_absent());
    }
}
