//! Tests for the pool resource.

use super::*;
use crate::test_support::{body_of, client_with, RecordingTransport};

fn spec() -> PoolSpec {
    let mut options = Map::new();
    options.insert("max_retry_sleep".to_string(), json!(1));
    PoolSpec {
        uri: "mongodb://localhost:27017".to_string(),
        weight: 10,
        group: Some("g1".to_string()),
        flavor: Some("f1".to_string()),
        options,
    }
}

/// Verify v2 pools are created with their flavor.
#[tokio::test]
async fn test_create_v2() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);

    let pool = client.pool("p1", spec()).await.unwrap();

    assert_eq!(pool.name(), "p1");
    let sent = transport.last();
    assert_eq!(sent.operation, "pool_create");
    assert_eq!(sent.params["pool_name"], "p1");
    assert_eq!(
        body_of(&sent),
        json!({
            "uri": "mongodb://localhost:27017",
            "weight": 10,
            "options": { "max_retry_sleep": 1 },
            "flavor": "f1"
        })
    );
}

/// Verify older versions send the group instead.
#[tokio::test]
async fn test_create_v1_1_group() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V1_1);

    client.pool("p1", spec()).await.unwrap();

    let body = body_of(&transport.last());
    assert_eq!(body["group"], "g1");
    assert!(body.get("flavor").is_none());
}

/// Verify update changes the local fields after the server accepted them.
#[tokio::test]
async fn test_update() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);
    let mut pool = client.pool_ref("p1");
    let mut data = Map::new();
    data.insert("weight".to_string(), json!(20));

    pool.update(data).await.unwrap();

    assert_eq!(pool.weight(), Some(20));
    assert_eq!(body_of(&transport.last()), json!({ "weight": 20 }));
}

/// Verify get refreshes the local fields.
#[tokio::test]
async fn test_get() {
    let transport = RecordingTransport::new();
    transport.reply(
        200,
        Some(json!({ "name": "p1", "uri": "redis://r", "weight": 3, "options": {} })),
    );
    let client = client_with(&transport, ApiVersion::V2);
    let mut pool = client.pool_ref("p1");

    pool.get().await.unwrap();

    assert_eq!(pool.uri(), Some("redis://r"));
    assert_eq!(pool.weight(), Some(3));
}

/// Verify pools are listed from the pools key.
#[tokio::test]
async fn test_list() {
    let transport = RecordingTransport::new();
    transport.reply(
        200,
        Some(json!({
            "links": [],
            "pools": [{ "name": "p1", "uri": "mongodb://a", "weight": 1, "group": "g" }]
        })),
    );
    let client = client_with(&transport, ApiVersion::V1_1);

    let pools = client.pools(Map::new()).await.unwrap().try_collect().await.unwrap();

    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].group(), Some("g"));
}
