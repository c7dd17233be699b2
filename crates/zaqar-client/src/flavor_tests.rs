//! Tests for the flavor resource.

use super::*;
use crate::test_support::{body_of, client_with, RecordingTransport};

/// Verify v2 flavors are written with their pool list.
#[tokio::test]
async fn test_create_v2() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);
    let spec = FlavorSpec {
        pool_list: vec!["p1".to_string(), "p2".to_string()],
        ..Default::default()
    };

    let flavor = client.flavor("f1", spec).await.unwrap();

    assert_eq!(flavor.pool_list(), ["p1".to_string(), "p2".to_string()]);
    let sent = transport.last();
    assert_eq!(sent.operation, "flavor_create");
    assert_eq!(body_of(&sent), json!({ "pool_list": ["p1", "p2"] }));
}

/// Verify v1.1 loads an existing flavor without creating it.
#[tokio::test]
async fn test_existing_v1_1() {
    let transport = RecordingTransport::new();
    transport.reply(200, Some(json!({ "name": "f1", "pool": "g1", "capabilities": { "durable": true } })));
    let client = client_with(&transport, ApiVersion::V1_1);

    let flavor = client.flavor("f1", FlavorSpec::default()).await.unwrap();

    assert_eq!(flavor.pool(), Some("g1"));
    assert_eq!(flavor.capabilities()["durable"], true);
    assert_eq!(transport.requests().len(), 1);
}

/// Verify v1.1 creates a missing flavor.
#[tokio::test]
async fn test_missing_v1_1_is_created() {
    let transport = RecordingTransport::new();
    transport.fail(404);
    let client = client_with(&transport, ApiVersion::V1_1);
    let spec = FlavorSpec {
        pool: Some("g1".to_string()),
        ..Default::default()
    };

    client.flavor("f1", spec).await.unwrap();

    let sent = transport.requests();
    assert_eq!(sent[0].operation, "flavor_get");
    assert_eq!(sent[1].operation, "flavor_create");
    assert_eq!(body_of(&sent[1]), json!({ "pool": "g1", "capabilities": {} }));
}

/// Verify flavors are not available on v1.
#[tokio::test]
async fn test_requires_v1_1() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V1);

    assert!(client.flavor("f1", FlavorSpec::default()).await.is_err());
    assert!(client.flavors(Map::new()).await.is_err());
    assert!(transport.requests().is_empty());
}

/// Verify update applies the sent fields locally.
#[tokio::test]
async fn test_update() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);
    let mut flavor = client.flavor_ref("f1");
    let mut data = Map::new();
    data.insert("pool_list".to_string(), json!(["p3"]));

    flavor.update(data).await.unwrap();

    assert_eq!(flavor.pool_list(), ["p3".to_string()]);
    assert_eq!(transport.last().operation, "flavor_update");
}
