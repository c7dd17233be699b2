//! Tests for the message resource.

use super::*;
use crate::api::ApiVersion;
use crate::test_support::{client_with, RecordingTransport};
use serde_json::json;

/// Verify id and claim id are parsed from the href.
#[test]
fn test_ids_from_href() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);

    let message = Message::from_value(
        client,
        "q1",
        json!({
            "href": "/v2/queues/q1/messages/50b68a50d6f5b8c8a7c62b01?claim_id=a28ee94e",
            "ttl": 800,
            "age": 790,
            "body": { "event": "ActivateAccount" }
        }),
    )
    .unwrap();

    assert_eq!(message.id(), "50b68a50d6f5b8c8a7c62b01");
    assert_eq!(message.claim_id(), Some("a28ee94e"));
    assert_eq!(message.ttl(), Some(800));
    assert_eq!(message.age(), Some(790));
    assert_eq!(message.body()["event"], "ActivateAccount");
    assert_eq!(message.claim_count(), 0);
}

/// Verify an explicit id wins over the href.
#[test]
fn test_explicit_id() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);

    let message = Message::from_value(
        client,
        "q1",
        json!({
            "id": "m1",
            "href": "/v2/queues/q1/messages/other",
            "body": "hi",
            "claim_count": 2,
            "checksum": "MD5:abc"
        }),
    )
    .unwrap();

    assert_eq!(message.id(), "m1");
    assert!(message.claim_id().is_none());
    assert_eq!(message.claim_count(), 2);
    assert_eq!(message.checksum(), Some("MD5:abc"));
}

/// Verify a message without any identifier is rejected.
#[test]
fn test_missing_id() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);

    let err = Message::from_value(client, "q1", json!({ "body": {} })).unwrap_err();

    assert!(matches!(err, ZaqarError::UnexpectedResponse { .. }));
}

/// Verify delete passes the claim id of a claimed message.
#[tokio::test]
async fn test_delete_with_claim() {
    let transport = RecordingTransport::new();
    let client = client_with(&transport, ApiVersion::V2);
    let message = Message::from_value(
        client,
        "q1",
        json!({ "href": "/v2/queues/q1/messages/m1?claim_id=c1", "body": null }),
    )
    .unwrap();

    message.delete().await.unwrap();

    let sent = transport.last();
    assert_eq!(sent.operation, "message_delete");
    assert_eq!(sent.params["message_id"], "m1");
    assert_eq!(sent.params["claim_id"], "c1");
    assert!(sent.headers.contains_key("Client-ID"));
}
