//! Tests for API version schemas.

use super::*;

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

mod version_tests {
    use super::*;

    /// Verify accepted spellings of each version.
    #[test]
    fn test_parse_versions() {
        assert_eq!("1".parse::<ApiVersion>().unwrap(), ApiVersion::V1);
        assert_eq!("1.0".parse::<ApiVersion>().unwrap(), ApiVersion::V1);
        assert_eq!("1.1".parse::<ApiVersion>().unwrap(), ApiVersion::V1_1);
        assert_eq!("v1.1".parse::<ApiVersion>().unwrap(), ApiVersion::V1_1);
        assert_eq!("2".parse::<ApiVersion>().unwrap(), ApiVersion::V2);
        assert_eq!("2.0".parse::<ApiVersion>().unwrap(), ApiVersion::V2);
    }

    /// Verify unknown versions are rejected with UnsupportedVersion.
    #[test]
    fn test_parse_unknown_version() {
        for raw in ["3", "0.9", "", "two"] {
            let err = raw.parse::<ApiVersion>().unwrap_err();
            assert!(matches!(err, ZaqarError::UnsupportedVersion { .. }), "{}", raw);
        }
    }

    /// Verify labels and ordering.
    #[test]
    fn test_labels_and_ordering() {
        assert_eq!(ApiVersion::V1.label(), "v1");
        assert_eq!(ApiVersion::V1_1.label(), "v1.1");
        assert_eq!(ApiVersion::V2.label(), "v2");
        assert!(ApiVersion::V1 < ApiVersion::V1_1);
        assert!(ApiVersion::V1_1 < ApiVersion::V2);
        assert_eq!(ApiVersion::V2.schema().label(), "v2");
    }
}

mod schema_tests {
    use super::*;

    /// Verify v1.1 drops the separate metadata operations and adds its own.
    #[test]
    fn test_v1_1_table_is_derived_from_v1() {
        let v1 = ApiVersion::V1.schema();
        let v1_1 = ApiVersion::V1_1.schema();

        assert!(v1.is_supported("queue_get_metadata"));
        assert!(v1.is_supported("queue_set_metadata"));
        assert!(!v1_1.is_supported("queue_get_metadata"));
        assert!(!v1_1.is_supported("queue_set_metadata"));

        for op in ["queue_get", "queue_update", "message_pop", "flavor_update", "flavor_list"] {
            assert!(!v1.is_supported(op), "{} should not be in v1", op);
            assert!(v1_1.is_supported(op), "{} should be in v1.1", op);
        }
    }

    /// Verify v2 keeps everything from v1.1 and adds the v2 operations.
    #[test]
    fn test_v2_table_is_superset_of_v1_1() {
        let v1_1 = ApiVersion::V1_1.schema();
        let v2 = ApiVersion::V2.schema();

        for op in v1_1.operations() {
            assert!(v2.is_supported(op.name), "{} missing from v2", op.name);
        }
        for op in [
            "queue_purge",
            "signed_url_create",
            "subscription_create",
            "subscription_get",
            "subscription_update",
            "subscription_delete",
            "subscription_list",
            "ping",
            "homedoc",
        ] {
            assert!(v2.is_supported(op), "{} missing from v2", op);
        }
    }

    /// Verify health is admin-only before v2.
    #[test]
    fn test_health_admin_flag() {
        assert!(ApiVersion::V1.schema().get_schema("health").unwrap().admin);
        assert!(ApiVersion::V1_1.schema().get_schema("health").unwrap().admin);
        assert!(!ApiVersion::V2.schema().get_schema("health").unwrap().admin);
    }

    /// Verify wire details of a few representative operations.
    #[test]
    fn test_operation_descriptors() {
        let v2 = ApiVersion::V2.schema();

        let create = v2.get_schema("queue_create").unwrap();
        assert_eq!(create.reference, "queues/{queue_name}");
        assert_eq!(create.method, Method::PUT);
        assert_eq!(create.required, vec!["queue_name"]);

        let exists = v2.get_schema("queue_exists").unwrap();
        assert_eq!(exists.method, Method::HEAD);

        let homedoc = v2.get_schema("homedoc").unwrap();
        assert_eq!(homedoc.reference, "");

        let update = v2.get_schema("claim_update").unwrap();
        assert_eq!(update.method, Method::PATCH);
        assert_eq!(update.reference, "queues/{queue_name}/claims/{claim_id}");
    }

    /// Verify every required parameter is also a declared property.
    #[test]
    fn test_required_is_subset_of_properties() {
        for version in [ApiVersion::V1, ApiVersion::V1_1, ApiVersion::V2] {
            for op in version.schema().operations() {
                for required in &op.required {
                    assert!(op.accepts(required), "{}:{} not declared", op.name, required);
                }
            }
        }
    }

    /// Verify an unknown operation is reported by name.
    #[test]
    fn test_unknown_operation() {
        let err = ApiVersion::V1.schema().get_schema("queue_purge").unwrap_err();
        match err {
            ZaqarError::InvalidOperation { message } => {
                assert_eq!(message, "queue_purge is not a valid operation")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

mod validate_tests {
    use super::*;

    /// Verify valid parameter sets pass.
    #[test]
    fn test_validate_accepts_declared_params() {
        let v2 = ApiVersion::V2.schema();

        assert!(v2
            .validate("queue_create", &params(json!({ "queue_name": "q1" })))
            .unwrap());
        assert!(v2
            .validate(
                "message_list",
                &params(json!({ "queue_name": "q1", "echo": true, "limit": 5 }))
            )
            .unwrap());
        assert!(v2
            .validate(
                "message_get_many",
                &params(json!({ "queue_name": "q1", "ids": ["a", "b"] }))
            )
            .unwrap());
        assert!(v2.validate("ping", &Map::new()).unwrap());
    }

    /// Verify missing required, wrong types and undeclared params fail without erroring.
    #[test]
    fn test_validate_rejects_bad_params() {
        let v2 = ApiVersion::V2.schema();

        assert!(!v2.validate("queue_create", &Map::new()).unwrap());
        assert!(!v2
            .validate("queue_create", &params(json!({ "queue_name": 42 })))
            .unwrap());
        assert!(!v2
            .validate(
                "message_list",
                &params(json!({ "queue_name": "q1", "limit": "many" }))
            )
            .unwrap());
        assert!(!v2
            .validate(
                "queue_create",
                &params(json!({ "queue_name": "q1", "colour": "blue" }))
            )
            .unwrap());
    }

    /// Verify validation of an unknown operation is an error, not `false`.
    #[test]
    fn test_validate_unknown_operation() {
        let err = ApiVersion::V1
            .schema()
            .validate("ping", &Map::new())
            .unwrap_err();
        assert!(matches!(err, ZaqarError::InvalidOperation { .. }));
    }

    /// Verify cached validators give the same answer on repeated calls.
    #[test]
    fn test_validate_is_repeatable() {
        let v1 = ApiVersion::V1.schema();
        let good = params(json!({ "queue_name": "q1" }));
        for _ in 0..3 {
            assert!(v1.validate("queue_get_stats", &good).unwrap());
            assert!(!v1.validate("queue_get_stats", &Map::new()).unwrap());
        }
    }
}
