//! Tests for the subscription resource.

use super::*;
use crate::api::ApiVersion;
use crate::test_support::{body_of, client_with, RecordingTransport};

/// Verify creation takes the returned id and then loads the subscription.
#[tokio::test]
async fn test_create_then_get() {
    let transport = RecordingTransport::new();
    transport
        .reply(201, Some(json!({ "subscription_id": "s1" })))
        .reply(
            200,
            Some(json!({
                "id": "s1",
                "source": "q1",
                "subscriber": "http://example.com/hook",
                "ttl": 3600,
                "age": 5,
                "confirmed": false,
                "options": { "format": "json" }
            })),
        );
    let client = client_with(&transport, ApiVersion::V2);

    let subscription = client
        .subscription("q1", SubscriptionSpec::new("http://example.com/hook"))
        .await
        .unwrap();

    assert_eq!(subscription.id(), Some("s1"));
    assert_eq!(subscription.ttl(), 3600);
    assert_eq!(subscription.age(), Some(5));
    assert_eq!(subscription.confirmed(), Some(false));
    assert_eq!(subscription.options()["format"], "json");

    let sent = transport.requests();
    assert_eq!(sent[0].operation, "subscription_create");
    assert_eq!(
        body_of(&sent[0]),
        json!({ "subscriber": "http://example.com/hook", "ttl": 60, "options": {} })
    );
    assert_eq!(sent[1].params["subscription_id"], "s1");
}

/// Verify subscriptions require v2.
#[tokio::test]
async fn test_requires_v2() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V1_1);

    let err = client
        .subscription("q1", SubscriptionSpec::new("mailto:ops@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ZaqarError::UnsupportedVersion { .. }));
}

/// Verify listing entries map their source to the queue name.
#[tokio::test]
async fn test_list_entries() {
    let transport = RecordingTransport::new();
    transport.reply(
        200,
        Some(json!({
            "links": [],
            "subscriptions": [{
                "id": "s1",
                "source": "q1",
                "subscriber": "http://example.com/hook",
                "ttl": 60,
                "age": 1,
                "confirmed": true,
                "options": {}
            }]
        })),
    );
    let client = client_with(&transport, ApiVersion::V2);

    let subscriptions = client
        .subscriptions("q1", Map::new())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].queue_name(), "q1");
    assert_eq!(subscriptions[0].confirmed(), Some(true));
}

/// Verify update and delete address the subscription id.
#[tokio::test]
async fn test_update_and_delete() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);
    let mut subscription = client.subscription_ref("q1", "s1");
    let mut data = Map::new();
    data.insert("ttl".to_string(), json!(120));

    subscription.update(data).await.unwrap();
    subscription.delete().await.unwrap();

    assert_eq!(subscription.ttl(), 120);
    let sent = transport.requests();
    assert_eq!(sent[0].operation, "subscription_update");
    assert_eq!(body_of(&sent[0]), json!({ "ttl": 120 }));
    assert_eq!(sent[1].operation, "subscription_delete");
    assert_eq!(sent[1].params["subscription_id"], "s1");
}

/// Verify a subscription without an id cannot be deleted.
#[tokio::test]
async fn test_delete_without_id() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);
    let subscription = Subscription::new(client, "q1", SubscriptionSpec::default());

    assert!(matches!(
        subscription.delete().await,
        Err(ZaqarError::InvalidOperation { .. })
    ));
}
