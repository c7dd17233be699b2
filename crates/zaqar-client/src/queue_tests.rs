//! Tests for the queue resource.

use super::*;
use crate::test_support::{body_of, client_with, RecordingTransport};

fn meta(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

mod metadata_patch_tests {
    use super::*;

    /// Verify keys are replaced, added and removed.
    #[test]
    fn test_patch_replace_all() {
        let current = meta(json!({ "a": 1, "b": 2 }));
        let new = meta(json!({ "a": 10, "c": 3 }));

        let changes = metadata_patch(&current, &new);

        assert_eq!(
            changes,
            vec![
                json!({ "op": "replace", "path": "/metadata/a", "value": 10 }),
                json!({ "op": "add", "path": "/metadata/c", "value": 3 }),
                json!({ "op": "remove", "path": "/metadata/b" }),
            ]
        );
    }

    /// Verify identical metadata still produces replace operations only.
    #[test]
    fn test_patch_same_keys() {
        let current = meta(json!({ "a": 1 }));

        let changes = metadata_patch(&current, &current);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["op"], "replace");
    }
}

mod metadata_tests {
    use super::*;

    /// Verify v1 sets then caches metadata.
    #[tokio::test]
    async fn test_v1_set_and_cache() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V1);
        let mut queue = client.queue_ref("q1");

        let result = queue.metadata(Some(meta(json!({ "a": 1 }))), false).await.unwrap();

        assert_eq!(result, meta(json!({ "a": 1 })));
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].operation, "queue_set_metadata");
        assert_eq!(body_of(&sent[0]), json!({ "a": 1 }));
    }

    /// Verify force_reload bypasses the cache.
    #[tokio::test]
    async fn test_v1_force_reload() {
        let transport = RecordingTransport::new();
        transport.reply(204, None).reply(200, Some(json!({ "a": 2 })));
        let client = client_with(&transport, ApiVersion::V1);
        let mut queue = client.queue_ref("q1");

        let result = queue.metadata(Some(meta(json!({ "a": 1 }))), true).await.unwrap();

        assert_eq!(result, meta(json!({ "a": 2 })));
        assert_eq!(transport.last().operation, "queue_get_metadata");
    }

    /// Verify v1.1 refuses to change metadata.
    #[tokio::test]
    async fn test_v1_1_set_is_invalid() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V1_1);
        let mut queue = client.queue_ref("q1");

        let err = queue.metadata(Some(meta(json!({ "a": 1 }))), false).await.unwrap_err();

        assert!(matches!(err, ZaqarError::InvalidOperation { .. }));
        assert!(transport.requests().is_empty());
    }

    /// Verify v2 fetches the current metadata and sends a patch.
    #[tokio::test]
    async fn test_v2_patch() {
        let transport = RecordingTransport::new();
        transport
            .reply(200, Some(json!({ "a": 1, "b": 2 })))
            .reply(200, Some(json!({ "a": 5 })));
        let client = client_with(&transport, ApiVersion::V2);
        let mut queue = client.queue_ref("q1");

        let result = queue.metadata(Some(meta(json!({ "a": 5 }))), false).await.unwrap();

        assert_eq!(result, meta(json!({ "a": 5 })));
        let sent = transport.requests();
        assert_eq!(sent[0].operation, "queue_get");
        assert_eq!(sent[1].operation, "queue_update");
        assert_eq!(
            body_of(&sent[1]),
            json!([
                { "op": "replace", "path": "/metadata/a", "value": 5 },
                { "op": "remove", "path": "/metadata/b" }
            ])
        );
        assert_eq!(sent.len(), 2);
    }

    /// Verify a cached read does not hit the server.
    #[tokio::test]
    async fn test_cached_read() {
        let transport = RecordingTransport::new();
        transport.reply(200, Some(json!({ "a": 1 })));
        let client = client_with(&transport, ApiVersion::V2);
        let mut queue = client.queue_ref("q1");

        queue.metadata(None, false).await.unwrap();
        let again = queue.metadata(None, false).await.unwrap();

        assert_eq!(again, meta(json!({ "a": 1 })));
        assert_eq!(transport.requests().len(), 1);
    }

    /// Verify empty new metadata on v2 sends no patch and keeps the cache.
    #[tokio::test]
    async fn test_v2_empty_update_is_noop() {
        let transport = RecordingTransport::new();
        transport.reply(200, Some(json!({ "a": 1, "b": 2 })));
        let client = client_with(&transport, ApiVersion::V2);
        let mut queue = client.queue_ref("q1");
        queue.metadata(None, false).await.unwrap();

        let result = queue.metadata(Some(Map::new()), false).await.unwrap();

        assert_eq!(result, meta(json!({ "a": 1, "b": 2 })));
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent.iter().all(|r| r.operation != "queue_update"));
    }
}

mod message_tests {
    use super::*;

    /// Verify a single message is wrapped into a batch envelope.
    #[tokio::test]
    async fn test_post_single_v2() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V2);
        let queue = client.queue_ref("q1");

        queue.post(json!({ "body": "hi", "ttl": 60 })).await.unwrap();

        assert_eq!(
            body_of(&transport.last()),
            json!({ "messages": [{ "body": "hi", "ttl": 60 }] })
        );
    }

    /// Verify v1 posts the bare array.
    #[tokio::test]
    async fn test_post_v1() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V1);
        let queue = client.queue_ref("q1");

        queue.post(json!([{ "body": 1, "ttl": 60 }])).await.unwrap();

        assert_eq!(body_of(&transport.last()), json!([{ "body": 1, "ttl": 60 }]));
    }

    /// Verify single message lookup is refused from v2 on.
    #[tokio::test]
    async fn test_message_unavailable_on_v2() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V2);

        let err = client.queue_ref("q1").message("m1").await.unwrap_err();

        assert_eq!(err.to_string(), "Unavailable on versions >= 2");
    }

    /// Verify single message lookup on v1.1.
    #[tokio::test]
    async fn test_message_v1_1() {
        let transport = RecordingTransport::new();
        transport.reply(200, Some(json!({ "href": "/v1.1/queues/q1/messages/m1", "body": 3 })));
        let client = client_with(&transport, ApiVersion::V1_1);

        let message = client.queue_ref("q1").message("m1").await.unwrap();

        assert_eq!(message.id(), "m1");
        assert_eq!(message.queue_name(), "q1");
    }

    /// Verify listing passes parameters and yields messages.
    #[tokio::test]
    async fn test_messages_listing() {
        let transport = RecordingTransport::new();
        transport.reply(
            200,
            Some(json!({
                "links": [],
                "messages": [{ "href": "/v2/queues/q1/messages/m1", "body": { "id": 0 } }]
            })),
        );
        let client = client_with(&transport, ApiVersion::V2);
        let mut params = Map::new();
        params.insert("echo".to_string(), json!(true));

        let messages = client
            .queue_ref("q1")
            .messages(params)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body(), &json!({ "id": 0 }));
        assert_eq!(transport.last().params["echo"], true);
    }

    /// Verify pop requires v1.1 and returns the popped messages.
    #[tokio::test]
    async fn test_pop() {
        let transport = RecordingTransport::new();
        let v1 = client_with(&transport, ApiVersion::V1);
        assert!(matches!(
            v1.queue_ref("q1").pop(1).await,
            Err(ZaqarError::UnsupportedVersion { .. })
        ));

        transport.reply(200, Some(json!({ "messages": [{ "id": "m1", "body": 1 }] })));
        let client = client_with(&transport, ApiVersion::V2);

        let popped = client.queue_ref("q1").pop(1).await.unwrap().try_collect().await.unwrap();

        assert_eq!(popped[0].id(), "m1");
        assert_eq!(transport.last().params["pop"], 1);
    }
}

mod v2_tests {
    use super::*;

    /// Verify purge sends the requested resource types.
    #[tokio::test]
    async fn test_purge() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V2);
        let types = vec!["messages".to_string(), "subscriptions".to_string()];

        client.queue_ref("q1").purge(Some(types.as_slice())).await.unwrap();

        assert_eq!(
            body_of(&transport.last()),
            json!({ "resource_types": ["messages", "subscriptions"] })
        );
    }

    /// Verify signed URLs are parsed from the response.
    #[tokio::test]
    async fn test_signed_url() {
        let transport = RecordingTransport::new();
        transport.reply(
            200,
            Some(json!({
                "paths": ["/v2/queues/q1/messages"],
                "methods": ["GET"],
                "expires": "2026-10-16T12:00:00",
                "signature": "sig",
                "project": "p1"
            })),
        );
        let client = client_with(&transport, ApiVersion::V2);
        let options = SignedUrlOptions {
            ttl_seconds: Some(600),
            methods: Some(vec!["GET".to_string()]),
            ..Default::default()
        };

        let signed = client.queue_ref("q1").signed_url(&options).await.unwrap();

        assert_eq!(signed.signature, "sig");
        assert_eq!(signed.project, "p1");
        assert_eq!(signed.paths, vec!["/v2/queues/q1/messages"]);
        assert_eq!(
            body_of(&transport.last()),
            json!({ "ttl_seconds": 600, "methods": ["GET"] })
        );
    }

    /// Verify v2-only operations are refused on older versions.
    #[tokio::test]
    async fn test_v2_only_operations() {
        let transport = RecordingTransport::new();
        let client = client_with(&transport, ApiVersion::V1_1);
        let queue = client.queue_ref("q1");

        assert!(queue.purge(None).await.is_err());
        assert!(queue.signed_url(&SignedUrlOptions::default()).await.is_err());
        assert!(queue.subscriptions(Map::new()).await.is_err());
        assert!(transport.requests().is_empty());
    }
}

/// Verify exists maps a missing queue to false.
#[tokio::test]
async fn test_exists() {
    let transport = RecordingTransport::new();
    transport.fail(404);
    let client = client_with(&transport, ApiVersion::V2);

    assert!(!client.queue_ref("q1").exists().await.unwrap());
    assert_eq!(transport.last().operation, "queue_exists");
}
