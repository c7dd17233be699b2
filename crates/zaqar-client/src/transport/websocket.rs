use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{error_for_status, Transport};
use crate::config::ClientConfig;
use crate::error::{AuthError, ZaqarError};
use crate::request::Request;
use crate::response::Response;

const ERROR_TITLE: &str = "Websocket Transport Error";
const CONNECTION_CLOSED: &str = "websocket connection closed by server";

struct Connection {
    client_id: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// Sends requests over a single websocket connection.
///
/// The connection is opened by the first request. Opening it sends an
/// `authenticate` action carrying the configured token. Every request is one
/// JSON envelope `{action, headers, body}` answered by exactly one envelope
/// whose `headers.status` carries the status code. Concurrent senders are
/// serialized, so replies cannot be interleaved.
pub struct WebsocketTransport {
    token: String,
    project_id: Option<String>,
    connection: Mutex<Option<Connection>>,
}

impl WebsocketTransport {
    pub fn new(token: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            project_id,
            connection: Mutex::new(None),
        }
    }

    /// Build from client configuration; an auth token is required.
    pub fn from_config(conf: &ClientConfig) -> Result<Self, ZaqarError> {
        let options = &conf.auth_opts.options;
        let token = options
            .auth_token
            .clone()
            .ok_or_else(|| AuthError::MissingOption {
                option: "os_auth_token".to_string(),
            })?;
        Ok(Self::new(token, conf.auth_opts.project_id().map(str::to_string)))
    }

    /// Connect to `endpoint` unless already connected.
    pub async fn open(&self, endpoint: &str) -> Result<(), ZaqarError> {
        let mut slot = self.connection.lock().await;
        if slot.is_none() {
            *slot = Some(self.connect(endpoint).await?);
        }
        Ok(())
    }

    /// Close the connection. A later send reconnects.
    pub async fn close(&self) -> Result<(), ZaqarError> {
        let mut slot = self.connection.lock().await;
        if let Some(mut conn) = slot.take() {
            debug!(client_id = %conn.client_id, "Closing messaging websocket");
            conn.stream.close(None).await?;
        }
        Ok(())
    }

    /// Run `f` with this transport and close the connection afterwards,
    /// whether or not `f` succeeded.
    pub async fn scoped<'a, F, Fut, T>(&'a self, f: F) -> Result<T, ZaqarError>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = Result<T, ZaqarError>> + 'a,
    {
        let result = f(self).await;
        let closed = self.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Read the next envelope the server pushes, e.g. a subscription notification.
    pub async fn recv(&self) -> Result<Value, ZaqarError> {
        let mut slot = self.connection.lock().await;
        let conn = slot
            .as_mut()
            .ok_or_else(|| ZaqarError::invalid_operation("websocket transport is not connected"))?;
        read_envelope(conn).await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    async fn connect(&self, endpoint: &str) -> Result<Connection, ZaqarError> {
        info!(endpoint = endpoint, "Instantiating messaging websocket client");
        let (stream, _) = connect_async(endpoint).await?;
        let mut conn = Connection {
            client_id: Uuid::new_v4().to_string(),
            stream,
        };

        let mut auth = Request::new(endpoint, None);
        auth.operation = "authenticate".to_string();
        auth.headers
            .insert("X-Auth-Token".to_string(), self.token.clone());
        self.exchange(&mut conn, auth).await?;

        Ok(conn)
    }

    fn envelope(&self, conn: &Connection, request: &Request) -> Result<Value, ZaqarError> {
        let mut headers: Map<String, Value> = request
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        headers.insert("Client-ID".to_string(), json!(conn.client_id));
        if let Some(project_id) = &self.project_id {
            headers.insert("X-Project-ID".to_string(), json!(project_id));
        }

        let mut body = match &request.content {
            Some(content) => Some(serde_json::from_str::<Value>(content)?),
            None => None,
        };

        // Parameters travel inside the body; there is no query string here.
        if !request.params.is_empty() {
            let object = body.get_or_insert_with(|| Value::Object(Map::new()));
            let Value::Object(fields) = object else {
                return Err(ZaqarError::UnsupportedParameters {
                    operation: request.operation.clone(),
                    message: "parameters cannot be merged into a non-object body".to_string(),
                });
            };
            for (name, value) in &request.params {
                fields.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }

        let mut envelope = json!({
            "action": request.operation,
            "headers": headers,
        });
        if let Some(body) = body {
            envelope["body"] = body;
        }
        Ok(envelope)
    }

    async fn exchange(&self, conn: &mut Connection, request: Request) -> Result<Response, ZaqarError> {
        let envelope = self.envelope(conn, &request)?;
        debug!(action = %request.operation, client_id = %conn.client_id, "Sending websocket request");
        conn.stream.send(Message::Text(envelope.to_string())).await?;

        let reply = read_envelope(conn).await?;
        let reply_headers = reply.get("headers").and_then(Value::as_object);

        let status = reply_headers
            .and_then(|h| h.get("status"))
            .and_then(|s| match s {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .and_then(|s| u16::try_from(s).ok())
            .ok_or_else(|| ZaqarError::UnexpectedResponse {
                message: "websocket reply has no status header".to_string(),
            })?;

        let headers: BTreeMap<String, String> = reply_headers
            .map(|h| {
                h.iter()
                    .map(|(k, v)| {
                        let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                        (k.clone(), v)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content = match reply.get("body") {
            None | Some(Value::Null) => None,
            Some(body) => Some(body.to_string()),
        };

        let describe = |body: &str| {
            let parsed: Value = serde_json::from_str(body).ok()?;
            let description = parsed.get("error")?;
            let description = description
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| description.to_string());
            Some((ERROR_TITLE.to_string(), description))
        };
        if let Some(error) = error_for_status(status, content.as_deref(), describe) {
            warn!(action = %request.operation, status = status, error = %error, "Zaqar returned an error");
            return Err(error.into());
        }

        Ok(Response::new(request, content, headers, Some(status)))
    }
}

async fn read_envelope(conn: &mut Connection) -> Result<Value, ZaqarError> {
    loop {
        match conn.stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
            Some(Ok(Message::Binary(data))) => return Ok(serde_json::from_slice(&data)?),
            Some(Ok(Message::Close(_))) | None => {
                return Err(ZaqarError::UnexpectedResponse {
                    message: CONNECTION_CLOSED.to_string(),
                })
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

#[async_trait]
impl Transport for WebsocketTransport {
    async fn send(&self, request: Request) -> Result<Response, ZaqarError> {
        let mut slot = self.connection.lock().await;
        let conn = match slot.take() {
            Some(conn) => slot.insert(conn),
            None => slot.insert(self.connect(&request.endpoint).await?),
        };
        let result = self.exchange(conn, request).await;
        if let Err(e) = &result {
            if is_connection_lost(e) {
                warn!(error = %e, "Messaging websocket lost, reconnecting on next request");
                slot.take();
            }
        }
        result
    }
}

/// Errors after which the connection cannot carry another request.
fn is_connection_lost(err: &ZaqarError) -> bool {
    match err {
        ZaqarError::WebSocket(_) => true,
        ZaqarError::UnexpectedResponse { message } => message == CONNECTION_CLOSED,
        _ => false,
    }
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
