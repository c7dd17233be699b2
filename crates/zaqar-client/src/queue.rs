//! Queue resource.
//!
//! A [`Queue`] is a local handle; constructing one sends nothing unless it
//! is created through [`Client::queue`], which ensures the queue exists.
//! Metadata handling differs per API version:
//!
//! - v1 has a dedicated get/set pair.
//! - v1.1 can read metadata but not change it.
//! - v2 changes metadata with a JSON-patch document computed from the cached
//!   and the new metadata. Keys missing from the new metadata are removed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::ApiVersion;
use crate::claim::{Claim, ClaimOptions};
use crate::client::Client;
use crate::core;
use crate::error::ZaqarError;
use crate::iterator::ResourceIter;
use crate::message::Message;
use crate::subscription::Subscription;

/// Options for creating a pre-signed URL. Unset fields use server defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedUrlOptions {
    pub paths: Option<Vec<String>>,
    pub ttl_seconds: Option<u64>,
    pub methods: Option<Vec<String>>,
}

/// A pre-signed URL grant, usable with the `signed-url` auth backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignedUrl {
    pub paths: Vec<String>,
    pub methods: Vec<String>,
    pub expires: String,
    pub signature: String,
    pub project: String,
}

#[derive(Debug, Clone)]
pub struct Queue {
    client: Client,
    name: String,
    metadata: Option<Map<String, Value>>,
}

impl Queue {
    pub(crate) fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            metadata: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn exists(&self) -> Result<bool, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::queue_exists(transport.as_ref(), request, &self.name).await
    }

    /// Create the queue. Not race safe: the queue may be deleted right after.
    pub async fn ensure_exists(&self) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::queue_create(transport.as_ref(), request, &self.name).await?;
        Ok(())
    }

    /// Get the queue metadata, replacing it first when `new_meta` is given.
    ///
    /// The metadata is cached; `force_reload` skips the cache.
    pub async fn metadata(
        &mut self,
        new_meta: Option<Map<String, Value>>,
        force_reload: bool,
    ) -> Result<Map<String, Value>, ZaqarError> {
        if let Some(new_meta) = new_meta {
            self.set_metadata(new_meta).await?;
        }

        if let Some(cached) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            if !force_reload {
                return Ok(cached.clone());
            }
        }

        let fetched = self.fetch_metadata().await?;
        self.metadata = Some(fetched.clone());
        Ok(fetched)
    }

    async fn fetch_metadata(&self) -> Result<Map<String, Value>, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let metadata = match self.client.api_version() {
            ApiVersion::V1 => core::queue_get_metadata(transport.as_ref(), request, &self.name).await?,
            _ => core::queue_get(transport.as_ref(), request, &self.name).await?,
        };
        Ok(match metadata {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        })
    }

    /// Empty `new_meta` is a no-op on every version.
    async fn set_metadata(&mut self, new_meta: Map<String, Value>) -> Result<(), ZaqarError> {
        if new_meta.is_empty() {
            return Ok(());
        }

        match self.client.api_version() {
            ApiVersion::V1 => {
                let (request, transport) = self.client.request_and_transport().await?;
                core::queue_set_metadata(transport.as_ref(), request, &self.name, &Value::Object(new_meta.clone()))
                    .await?;
                self.metadata = Some(new_meta);
            }
            ApiVersion::V1_1 => {
                return Err(ZaqarError::invalid_operation(
                    "v1.1 does not support setting queue metadata; use v1 or v2",
                ));
            }
            ApiVersion::V2 => {
                let current = match self.metadata.take() {
                    Some(current) => current,
                    None => self.fetch_metadata().await?,
                };
                let changes = metadata_patch(&current, &new_meta);
                debug!(queue = %self.name, changes = changes.len(), "Updating queue metadata");

                let (request, transport) = self.client.request_and_transport().await?;
                let updated =
                    core::queue_update(transport.as_ref(), request, &self.name, &Value::Array(changes)).await;
                let updated = match updated {
                    Ok(updated) => updated,
                    Err(e) => {
                        self.metadata = Some(current);
                        return Err(e);
                    }
                };
                self.metadata = Some(match updated {
                    Some(Value::Object(map)) => map,
                    _ => new_meta,
                });
            }
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<Value, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        Ok(core::queue_get_stats(transport.as_ref(), request, &self.name)
            .await?
            .unwrap_or_default())
    }

    pub async fn delete(&self) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::queue_delete(transport.as_ref(), request, &self.name).await?;
        Ok(())
    }

    /// Post one message or an array of them.
    ///
    /// From v1.1 on the batch is wrapped in a `messages` object as the server
    /// expects. Returns the server's answer, which lists the new resources.
    pub async fn post(&self, messages: Value) -> Result<Option<Value>, ZaqarError> {
        let messages = match messages {
            Value::Array(_) => messages,
            single => Value::Array(vec![single]),
        };
        let body = if self.client.api_version() >= ApiVersion::V1_1 {
            json!({ "messages": messages })
        } else {
            messages
        };

        let (request, transport) = self.client.request_and_transport().await?;
        core::message_post(transport.as_ref(), request, &self.name, &body).await
    }

    /// Get one message by id. Not available from v2 on.
    pub async fn message(&self, message_id: &str) -> Result<Message, ZaqarError> {
        if self.client.api_version() >= ApiVersion::V2 {
            return Err(ZaqarError::invalid_operation("Unavailable on versions >= 2"));
        }
        let (request, transport) = self.client.request_and_transport().await?;
        let message = core::message_get(transport.as_ref(), request, &self.name, message_id)
            .await?
            .ok_or_else(|| ZaqarError::UnexpectedResponse {
                message: format!("message {} returned no content", message_id),
            })?;
        Message::from_value(self.client.clone(), self.name.clone(), message)
    }

    /// Walk the queue's active messages, e.g. with `echo` or `include_claimed`.
    pub async fn messages(&self, params: Map<String, Value>) -> Result<ResourceIter<Message>, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let listing = core::message_list(transport.as_ref(), request, &self.name, params).await?;
        Ok(self.message_iter(Some(listing)))
    }

    pub async fn messages_by_id(&self, ids: &[String]) -> Result<ResourceIter<Message>, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let listing = core::message_get_many(transport.as_ref(), request, &self.name, ids).await?;
        Ok(self.message_iter(listing))
    }

    pub async fn delete_messages(&self, ids: &[String]) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::message_delete_many(transport.as_ref(), request, &self.name, ids).await?;
        Ok(())
    }

    /// Delete and return up to `count` messages (v1.1+).
    pub async fn pop(&self, count: u32) -> Result<ResourceIter<Message>, ZaqarError> {
        ZaqarError::require_version(self.client.api_version(), ApiVersion::V1_1)?;
        let (request, transport) = self.client.request_and_transport().await?;
        let popped = core::message_pop(transport.as_ref(), request, &self.name, count).await?;
        Ok(self.message_iter(popped))
    }

    fn message_iter(&self, listing: Option<Value>) -> ResourceIter<Message> {
        let queue_name = self.name.clone();
        ResourceIter::new(self.client.clone(), listing, "messages", move |client, value| {
            Message::from_value(client.clone(), queue_name.clone(), value)
        })
    }

    /// Claim messages from this queue.
    pub async fn claim(&self, options: ClaimOptions) -> Result<Claim, ZaqarError> {
        Claim::create(self.client.clone(), self.name.clone(), options).await
    }

    /// A handle to an existing claim; nothing is sent.
    pub fn claim_ref(&self, claim_id: impl Into<String>) -> Claim {
        Claim::existing(self.client.clone(), self.name.clone(), Some(claim_id.into()))
    }

    /// Purge the given resource types, or everything when `None` (v2).
    pub async fn purge(&self, resource_types: Option<&[String]>) -> Result<(), ZaqarError> {
        ZaqarError::require_version(self.client.api_version(), ApiVersion::V2)?;
        let (request, transport) = self.client.request_and_transport().await?;
        core::queue_purge(transport.as_ref(), request, &self.name, resource_types).await?;
        Ok(())
    }

    /// Create a pre-signed URL for this queue (v2).
    pub async fn signed_url(&self, options: &SignedUrlOptions) -> Result<SignedUrl, ZaqarError> {
        ZaqarError::require_version(self.client.api_version(), ApiVersion::V2)?;
        let (request, transport) = self.client.request_and_transport().await?;
        let signed = core::signed_url_create(
            transport.as_ref(),
            request,
            &self.name,
            options.paths.as_deref(),
            options.ttl_seconds,
            options.methods.as_deref(),
        )
        .await?
        .ok_or_else(|| ZaqarError::UnexpectedResponse {
            message: "signed URL request returned no content".to_string(),
        })?;
        Ok(serde_json::from_value(signed)?)
    }

    pub async fn subscriptions(&self, params: Map<String, Value>) -> Result<ResourceIter<Subscription>, ZaqarError> {
        self.client.subscriptions(&self.name, params).await
    }
}

/// JSON-patch operations turning `current` into `new`.
///
/// Keys already present are replaced, new keys are added, and keys absent
/// from `new` are removed.
pub(crate) fn metadata_patch(current: &Map<String, Value>, new: &Map<String, Value>) -> Vec<Value> {
    let mut changes = Vec::new();
    for (key, value) in new {
        let op = if current.contains_key(key) { "replace" } else { "add" };
        changes.push(json!({ "op": op, "path": format!("/metadata/{}", key), "value": value }));
    }
    for key in current.keys() {
        if !new.contains_key(key) {
            changes.push(json!({ "op": "remove", "path": format!("/metadata/{}", key) }));
        }
    }
    changes
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
