//! Lower level API.
//!
//! One function per operation. Each packs its arguments into the given
//! request, sends it through the given transport and returns the parsed
//! response body, if any. The façades in this crate are thin wrappers around
//! these functions, which remain public for callers that want to manage
//! requests and transports themselves.

use serde_json::{json, Map, Value};

use crate::error::ZaqarError;
use crate::request::Request;
use crate::transport::Transport;

type CoreResult = Result<Option<Value>, ZaqarError>;

fn operation(mut request: Request, name: &str) -> Request {
    request.operation = name.to_string();
    request
}

fn on_queue(request: Request, name: &str, queue_name: &str) -> Request {
    let mut request = operation(request, name);
    request.set_param("queue_name", queue_name);
    request
}

async fn send(transport: &dyn Transport, request: Request) -> CoreResult {
    Ok(transport.send(request).await?.into_deserialized())
}

/// Listings answer 204 with no body when empty; normalize that to an empty page.
async fn send_listing(transport: &dyn Transport, request: Request, key: &str) -> Result<Value, ZaqarError> {
    let listing = send(transport, request).await?;
    Ok(listing.unwrap_or_else(|| json!({ "links": [], key: [] })))
}

// ============================================================================
// Queues
// ============================================================================

pub async fn queue_create(transport: &dyn Transport, request: Request, queue_name: &str) -> CoreResult {
    send(transport, on_queue(request, "queue_create", queue_name)).await
}

/// Check whether a queue exists; a 404 is `false`, other errors propagate.
pub async fn queue_exists(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
) -> Result<bool, ZaqarError> {
    match transport
        .send(on_queue(request, "queue_exists", queue_name))
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn queue_get(transport: &dyn Transport, request: Request, queue_name: &str) -> CoreResult {
    send(transport, on_queue(request, "queue_get", queue_name)).await
}

/// Apply a list of JSON-patch operations to the queue metadata.
pub async fn queue_update(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    changes: &Value,
) -> CoreResult {
    let mut request = on_queue(request, "queue_update", queue_name);
    request.set_json_content(changes)?;
    send(transport, request).await
}

pub async fn queue_get_metadata(transport: &dyn Transport, request: Request, queue_name: &str) -> CoreResult {
    send(transport, on_queue(request, "queue_get_metadata", queue_name)).await
}

pub async fn queue_set_metadata(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    metadata: &Value,
) -> CoreResult {
    let mut request = on_queue(request, "queue_set_metadata", queue_name);
    request.set_json_content(metadata)?;
    send(transport, request).await
}

pub async fn queue_get_stats(transport: &dyn Transport, request: Request, queue_name: &str) -> CoreResult {
    send(transport, on_queue(request, "queue_get_stats", queue_name)).await
}

pub async fn queue_delete(transport: &dyn Transport, request: Request, queue_name: &str) -> CoreResult {
    send(transport, on_queue(request, "queue_delete", queue_name)).await
}

pub async fn queue_list(
    transport: &dyn Transport,
    request: Request,
    params: Map<String, Value>,
) -> Result<Value, ZaqarError> {
    let mut request = operation(request, "queue_list");
    request.params.extend(params);
    send_listing(transport, request, "queues").await
}

/// Purge messages and/or subscriptions; all of them when `resource_types` is `None`.
pub async fn queue_purge(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    resource_types: Option<&[String]>,
) -> CoreResult {
    let mut request = on_queue(request, "queue_purge", queue_name);
    if let Some(types) = resource_types {
        request.set_json_content(&json!({ "resource_types": types }))?;
    }
    send(transport, request).await
}

pub async fn signed_url_create(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    paths: Option<&[String]>,
    ttl_seconds: Option<u64>,
    methods: Option<&[String]>,
) -> CoreResult {
    let mut request = on_queue(request, "signed_url_create", queue_name);
    let mut body = Map::new();
    if let Some(paths) = paths {
        body.insert("paths".to_string(), json!(paths));
    }
    if let Some(ttl) = ttl_seconds {
        body.insert("ttl_seconds".to_string(), json!(ttl));
    }
    if let Some(methods) = methods {
        body.insert("methods".to_string(), json!(methods));
    }
    request.set_json_content(&body)?;
    send(transport, request).await
}

// ============================================================================
// Messages
// ============================================================================

pub async fn message_list(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    params: Map<String, Value>,
) -> Result<Value, ZaqarError> {
    let mut request = on_queue(request, "message_list", queue_name);
    // Unknown parameters are left for the server to reject.
    request.params.extend(params);
    send_listing(transport, request, "messages").await
}

/// Post a batch of messages. `messages` is sent as is, so the caller picks
/// the envelope the API version expects.
pub async fn message_post(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    messages: &Value,
) -> CoreResult {
    let mut request = on_queue(request, "message_post", queue_name);
    request.set_json_content(messages)?;
    send(transport, request).await
}

pub async fn message_get(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    message_id: &str,
) -> CoreResult {
    let mut request = on_queue(request, "message_get", queue_name);
    request.set_param("message_id", message_id);
    send(transport, request).await
}

pub async fn message_get_many(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    message_ids: &[String],
) -> CoreResult {
    let mut request = on_queue(request, "message_get_many", queue_name);
    request.set_param("ids", json!(message_ids));
    send(transport, request).await
}

pub async fn message_delete(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    message_id: &str,
    claim_id: Option<&str>,
) -> CoreResult {
    let mut request = on_queue(request, "message_delete", queue_name);
    request.set_param("message_id", message_id);
    if let Some(claim_id) = claim_id {
        request.set_param("claim_id", claim_id);
    }
    send(transport, request).await
}

pub async fn message_delete_many(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    message_ids: &[String],
) -> CoreResult {
    let mut request = on_queue(request, "message_delete_many", queue_name);
    request.set_param("ids", json!(message_ids));
    send(transport, request).await
}

/// Delete and return up to `count` messages.
pub async fn message_pop(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    count: u32,
) -> CoreResult {
    let mut request = on_queue(request, "message_pop", queue_name);
    request.set_param("pop", count);
    send(transport, request).await
}

// ============================================================================
// Claims
// ============================================================================

/// Claim messages. `limit` goes in the query string, `ttl`/`grace` in the body.
pub async fn claim_create(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    ttl: Option<u64>,
    grace: Option<u64>,
    limit: Option<u64>,
) -> CoreResult {
    let mut request = on_queue(request, "claim_create", queue_name);
    if let Some(limit) = limit {
        request.set_param("limit", limit);
    }
    let mut body = Map::new();
    if let Some(ttl) = ttl {
        body.insert("ttl".to_string(), json!(ttl));
    }
    if let Some(grace) = grace {
        body.insert("grace".to_string(), json!(grace));
    }
    request.set_json_content(&body)?;
    send(transport, request).await
}

pub async fn claim_get(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    claim_id: &str,
) -> CoreResult {
    let mut request = on_queue(request, "claim_get", queue_name);
    request.set_param("claim_id", claim_id);
    send(transport, request).await
}

pub async fn claim_update(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    claim_id: &str,
    data: &Value,
) -> CoreResult {
    let mut request = on_queue(request, "claim_update", queue_name);
    request.set_param("claim_id", claim_id);
    request.set_json_content(data)?;
    send(transport, request).await
}

pub async fn claim_delete(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    claim_id: &str,
) -> CoreResult {
    let mut request = on_queue(request, "claim_delete", queue_name);
    request.set_param("claim_id", claim_id);
    send(transport, request).await
}

// ============================================================================
// Pools and Flavors (admin)
// ============================================================================

async fn named(
    transport: &dyn Transport,
    request: Request,
    name: &str,
    key: &str,
    value: &str,
    data: Option<&Value>,
) -> CoreResult {
    let mut request = operation(request, name);
    request.set_param(key, value);
    if let Some(data) = data {
        request.set_json_content(data)?;
    }
    send(transport, request).await
}

pub async fn pool_create(transport: &dyn Transport, request: Request, pool_name: &str, data: &Value) -> CoreResult {
    named(transport, request, "pool_create", "pool_name", pool_name, Some(data)).await
}

pub async fn pool_get(transport: &dyn Transport, request: Request, pool_name: &str) -> CoreResult {
    named(transport, request, "pool_get", "pool_name", pool_name, None).await
}

pub async fn pool_update(transport: &dyn Transport, request: Request, pool_name: &str, data: &Value) -> CoreResult {
    named(transport, request, "pool_update", "pool_name", pool_name, Some(data)).await
}

pub async fn pool_delete(transport: &dyn Transport, request: Request, pool_name: &str) -> CoreResult {
    named(transport, request, "pool_delete", "pool_name", pool_name, None).await
}

pub async fn pool_list(
    transport: &dyn Transport,
    request: Request,
    params: Map<String, Value>,
) -> Result<Value, ZaqarError> {
    let mut request = operation(request, "pool_list");
    request.params.extend(params);
    send_listing(transport, request, "pools").await
}

pub async fn flavor_create(transport: &dyn Transport, request: Request, flavor_name: &str, data: &Value) -> CoreResult {
    named(transport, request, "flavor_create", "flavor_name", flavor_name, Some(data)).await
}

pub async fn flavor_get(transport: &dyn Transport, request: Request, flavor_name: &str) -> CoreResult {
    named(transport, request, "flavor_get", "flavor_name", flavor_name, None).await
}

pub async fn flavor_update(transport: &dyn Transport, request: Request, flavor_name: &str, data: &Value) -> CoreResult {
    named(transport, request, "flavor_update", "flavor_name", flavor_name, Some(data)).await
}

pub async fn flavor_delete(transport: &dyn Transport, request: Request, flavor_name: &str) -> CoreResult {
    named(transport, request, "flavor_delete", "flavor_name", flavor_name, None).await
}

pub async fn flavor_list(
    transport: &dyn Transport,
    request: Request,
    params: Map<String, Value>,
) -> Result<Value, ZaqarError> {
    let mut request = operation(request, "flavor_list");
    request.params.extend(params);
    send_listing(transport, request, "flavors").await
}

// ============================================================================
// Subscriptions
// ============================================================================

pub async fn subscription_create(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    data: &Value,
) -> CoreResult {
    let mut request = on_queue(request, "subscription_create", queue_name);
    request.set_json_content(data)?;
    send(transport, request).await
}

pub async fn subscription_get(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    subscription_id: &str,
) -> CoreResult {
    let mut request = on_queue(request, "subscription_get", queue_name);
    request.set_param("subscription_id", subscription_id);
    send(transport, request).await
}

pub async fn subscription_update(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    subscription_id: &str,
    data: &Value,
) -> CoreResult {
    let mut request = on_queue(request, "subscription_update", queue_name);
    request.set_param("subscription_id", subscription_id);
    request.set_json_content(data)?;
    send(transport, request).await
}

pub async fn subscription_delete(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    subscription_id: &str,
) -> CoreResult {
    let mut request = on_queue(request, "subscription_delete", queue_name);
    request.set_param("subscription_id", subscription_id);
    send(transport, request).await
}

pub async fn subscription_list(
    transport: &dyn Transport,
    request: Request,
    queue_name: &str,
    params: Map<String, Value>,
) -> Result<Value, ZaqarError> {
    let mut request = on_queue(request, "subscription_list", queue_name);
    request.params.extend(params);
    send_listing(transport, request, "subscriptions").await
}

// ============================================================================
// Service
// ============================================================================

pub async fn health(transport: &dyn Transport, request: Request) -> CoreResult {
    send(transport, operation(request, "health")).await
}

/// Send a ping; any successful response means the service is reachable.
pub async fn ping(transport: &dyn Transport, request: Request) -> Result<bool, ZaqarError> {
    transport.send(operation(request, "ping")).await?;
    Ok(true)
}

pub async fn homedoc(transport: &dyn Transport, request: Request) -> CoreResult {
    send(transport, operation(request, "homedoc")).await
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
