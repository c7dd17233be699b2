//! Tests for the websocket transport against an in-process server.

use super::*;
use crate::api::ApiVersion;
use crate::config::{AuthBackendKind, AuthOptions, AuthSettings};
use crate::error::TransportErrorKind;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Accept one connection, record every envelope, and answer with `replies` in order.
async fn start_server(replies: Vec<Value>) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        for reply in replies {
            let received = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break serde_json::from_str::<Value>(&text).unwrap(),
                    Some(Ok(_)) => continue,
                    _ => return,
                }
            };
            let _ = tx.send(received);
            ws.send(Message::Text(reply.to_string())).await.unwrap();
        }
        // Drain until the client closes.
        while let Some(Ok(_)) = ws.next().await {}
    });

    (format!("ws://{}", addr), rx)
}

fn ok(status: u16, body: Option<Value>) -> Value {
    let mut reply = json!({ "headers": { "status": status } });
    if let Some(body) = body {
        reply["body"] = body;
    }
    reply
}

fn queue_request(endpoint: &str, operation: &str, content: Option<Value>) -> Request {
    let mut request = Request::new(endpoint, Some(ApiVersion::V2));
    request.operation = operation.to_string();
    request.content = content.map(|c| c.to_string());
    request
}

/// Verify the first send authenticates, then sends the request envelope.
#[tokio::test]
async fn test_send_authenticates_first() {
    let (endpoint, mut received) = start_server(vec![
        ok(200, None),
        ok(201, Some(json!({ "created": true }))),
    ])
    .await;
    let transport = WebsocketTransport::new("ws-token", Some("tenant-1".to_string()));

    let response = transport
        .send(queue_request(
            &endpoint,
            "queue_create",
            Some(json!({ "queue_name": "foo" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status_code, Some(201));
    assert_eq!(response.deserialized_content(), Some(&json!({ "created": true })));

    let auth = received.recv().await.unwrap();
    assert_eq!(auth["action"], "authenticate");
    assert_eq!(auth["headers"]["X-Auth-Token"], "ws-token");
    assert_eq!(auth["headers"]["X-Project-ID"], "tenant-1");
    let client_id = auth["headers"]["Client-ID"].as_str().unwrap().to_string();
    assert!(Uuid::parse_str(&client_id).is_ok());

    let create = received.recv().await.unwrap();
    assert_eq!(create["action"], "queue_create");
    assert_eq!(create["body"], json!({ "queue_name": "foo" }));
    assert_eq!(create["headers"]["Client-ID"], client_id.as_str());

    transport.close().await.unwrap();
    assert!(!transport.is_connected().await);
}

/// Verify request parameters are merged into the body.
#[tokio::test]
async fn test_params_are_merged_into_body() {
    let (endpoint, mut received) = start_server(vec![ok(200, None), ok(200, Some(json!({})))]).await;
    let transport = WebsocketTransport::new("t", None);

    let mut request = queue_request(&endpoint, "message_list", None);
    request.set_param("queue_name", "q1");
    request.set_param("echo", true);
    transport.send(request).await.unwrap();

    let _auth = received.recv().await.unwrap();
    let list = received.recv().await.unwrap();
    assert_eq!(list["body"], json!({ "queue_name": "q1", "echo": true }));
    assert!(list["headers"].get("X-Project-ID").is_none());
}

/// Verify a non-object body cannot carry parameters.
#[tokio::test]
async fn test_params_with_array_body_are_rejected() {
    let (endpoint, _received) = start_server(vec![ok(200, None)]).await;
    let transport = WebsocketTransport::new("t", None);

    let mut request = queue_request(&endpoint, "message_post", Some(json!([{ "ttl": 60 }])));
    request.set_param("queue_name", "q1");

    let err = transport.send(request).await.unwrap_err();

    assert!(matches!(err, ZaqarError::UnsupportedParameters { .. }));
}

/// Verify error replies map to transport errors with the websocket title.
#[tokio::test]
async fn test_error_reply_is_mapped() {
    let (endpoint, _received) = start_server(vec![
        ok(200, None),
        ok(404, Some(json!({ "error": "Queue fizbit does not exist" }))),
    ])
    .await;
    let transport = WebsocketTransport::new("t", None);

    let err = transport
        .send(queue_request(&endpoint, "queue_get_stats", None))
        .await
        .unwrap_err();

    let error = err.transport().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::ResourceNotFound);
    assert_eq!(error.title.as_deref(), Some("Websocket Transport Error"));
    assert_eq!(error.description.as_deref(), Some("Queue fizbit does not exist"));
    assert!(transport.is_connected().await);
}

/// Verify a connection closed by the server is dropped and the next send reconnects.
#[tokio::test]
async fn test_reconnects_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        // First connection: authenticate, then hang up on the request.
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        let _auth = ws.next().await;
        ws.send(Message::Text(ok(200, None).to_string())).await.unwrap();
        let _request = ws.next().await;
        let _ = ws.close(None).await;

        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        let _auth = ws.next().await;
        ws.send(Message::Text(ok(200, None).to_string())).await.unwrap();
        let _request = ws.next().await;
        ws.send(Message::Text(ok(200, Some(json!({ "ok": true }))).to_string()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });
    let transport = WebsocketTransport::new("t", None);

    let err = transport
        .send(queue_request(&endpoint, "queue_list", None))
        .await
        .unwrap_err();

    assert!(matches!(err, ZaqarError::UnexpectedResponse { .. } | ZaqarError::WebSocket(_)));
    assert!(!transport.is_connected().await);

    let response = transport
        .send(queue_request(&endpoint, "queue_list", None))
        .await
        .unwrap();

    assert_eq!(response.deserialized_content(), Some(&json!({ "ok": true })));
    assert!(transport.is_connected().await);
    transport.close().await.unwrap();
}

/// Verify only socket failures count as a lost connection.
#[test]
fn test_is_connection_lost() {
    let closed = ZaqarError::UnexpectedResponse {
        message: CONNECTION_CLOSED.to_string(),
    };
    let no_status = ZaqarError::UnexpectedResponse {
        message: "websocket reply has no status header".to_string(),
    };
    let socket = ZaqarError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);

    assert!(is_connection_lost(&closed));
    assert!(is_connection_lost(&socket));
    assert!(!is_connection_lost(&no_status));
    assert!(!is_connection_lost(&ZaqarError::invalid_operation("nope")));
}

/// Verify a server push can be read after the connection is open.
#[tokio::test]
async fn test_recv_reads_pushed_envelope() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        let _auth = ws.next().await;
        ws.send(Message::Text(ok(200, None).to_string())).await.unwrap();
        let push = json!({ "body": { "event": "message.post" }, "headers": { "status": 200 } });
        ws.send(Message::Text(push.to_string())).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });
    let transport = WebsocketTransport::new("t", None);

    assert!(transport.recv().await.is_err());

    let pushed = transport
        .scoped(|ws| async move {
            ws.open(&endpoint).await?;
            ws.recv().await
        })
        .await
        .unwrap();

    assert_eq!(pushed["body"]["event"], "message.post");
    assert!(!transport.is_connected().await);
}

/// Verify construction from config requires a token.
#[test]
fn test_from_config_requires_token() {
    let conf = ClientConfig::default().with_auth_opts(AuthOptions::new(
        AuthBackendKind::Keystone,
        AuthSettings::default(),
    ));

    let err = WebsocketTransport::from_config(&conf).err().expect("missing token");
    assert!(matches!(
        err,
        ZaqarError::Auth(AuthError::MissingOption { .. })
    ));

    let conf = ClientConfig::default().with_auth_opts(AuthOptions::new(
        AuthBackendKind::Keystone,
        AuthSettings {
            auth_token: Some("tok".to_string()),
            ..Default::default()
        },
    ));
    assert!(WebsocketTransport::from_config(&conf).is_ok());
}
