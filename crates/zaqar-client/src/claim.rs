//! Claim resource.

use serde_json::{json, Map, Value};

use crate::api::ApiVersion;
use crate::client::Client;
use crate::core;
use crate::error::ZaqarError;
use crate::iterator::ResourceIter;
use crate::message::Message;

/// Parameters for a new claim. Unset fields fall back to server defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimOptions {
    pub ttl: Option<u64>,
    pub grace: Option<u64>,
    pub limit: Option<u64>,
}

/// A claim on a batch of messages.
///
/// Creating a claim that matched no messages leaves it without an id.
#[derive(Debug, Clone)]
pub struct Claim {
    client: Client,
    queue_name: String,
    id: Option<String>,
    ttl: Option<u64>,
    grace: Option<u64>,
    limit: Option<u64>,
    age: Option<u64>,
    messages: Vec<Value>,
}

impl Claim {
    /// Claim messages on `queue_name`.
    pub async fn create(client: Client, queue_name: impl Into<String>, options: ClaimOptions) -> Result<Self, ZaqarError> {
        let queue_name = queue_name.into();
        let (request, transport) = client.request_and_transport().await?;
        let claimed = core::claim_create(
            transport.as_ref(),
            request,
            &queue_name,
            options.ttl,
            options.grace,
            options.limit,
        )
        .await?;

        let mut claim = Self::existing(client, queue_name, None);
        claim.ttl = options.ttl;
        claim.grace = options.grace;
        claim.limit = options.limit;

        if let Some(claimed) = claimed {
            // From v1.1 on the messages are wrapped in an object.
            let messages = if claim.client.api_version() >= ApiVersion::V1_1 {
                claimed.get("messages").cloned().unwrap_or(Value::Null)
            } else {
                claimed
            };
            claim.messages = match messages {
                Value::Array(items) => items,
                _ => Vec::new(),
            };
            claim.id = claim
                .messages
                .first()
                .and_then(|m| m.get("href"))
                .and_then(Value::as_str)
                .and_then(|href| href.rsplit_once('='))
                .map(|(_, id)| id.to_string());
        }
        Ok(claim)
    }

    /// A handle to a claim that already exists; nothing is sent.
    pub fn existing(client: Client, queue_name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            client,
            queue_name: queue_name.into(),
            id,
            ttl: None,
            grace: None,
            limit: None,
            age: None,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn grace(&self) -> Option<u64> {
        self.grace
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Age as of the last [`Claim::reload`].
    pub fn age(&self) -> Option<u64> {
        self.age
    }

    /// The claimed messages known locally.
    pub fn messages(&self) -> ResourceIter<Message> {
        let queue_name = self.queue_name.clone();
        ResourceIter::new(
            self.client.clone(),
            Some(Value::Array(self.messages.clone())),
            "messages",
            move |client, value| Message::from_value(client.clone(), queue_name.clone(), value),
        )
    }

    fn require_id(&self) -> Result<&str, ZaqarError> {
        self.id
            .as_deref()
            .ok_or_else(|| ZaqarError::invalid_operation("claim has no id; no messages were claimed"))
    }

    /// Fetch the claim from the server, refreshing age, ttl, grace and messages.
    pub async fn reload(&mut self) -> Result<(), ZaqarError> {
        let id = self.require_id()?.to_string();
        let (request, transport) = self.client.request_and_transport().await?;
        let Some(claim) = core::claim_get(transport.as_ref(), request, &self.queue_name, &id).await? else {
            return Err(ZaqarError::UnexpectedResponse {
                message: format!("claim {} returned no content", id),
            });
        };

        self.age = claim.get("age").and_then(Value::as_u64);
        self.ttl = claim.get("ttl").and_then(Value::as_u64);
        self.grace = claim.get("grace").and_then(Value::as_u64);
        self.messages = match claim.get("messages") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(())
    }

    /// Renew the claim. Local values change only once the server accepted them.
    pub async fn update(&mut self, ttl: Option<u64>, grace: Option<u64>) -> Result<Option<Value>, ZaqarError> {
        let id = self.require_id()?.to_string();
        let mut data = Map::new();
        if let Some(ttl) = ttl {
            data.insert("ttl".to_string(), json!(ttl));
        }
        if let Some(grace) = grace {
            data.insert("grace".to_string(), json!(grace));
        }

        let (request, transport) = self.client.request_and_transport().await?;
        let result =
            core::claim_update(transport.as_ref(), request, &self.queue_name, &id, &Value::Object(data)).await?;

        if ttl.is_some() {
            self.ttl = ttl;
        }
        if grace.is_some() {
            self.grace = grace;
        }
        Ok(result)
    }

    /// Release the claim, making its messages available again.
    pub async fn delete(&self) -> Result<(), ZaqarError> {
        let id = self.require_id()?;
        let (request, transport) = self.client.request_and_transport().await?;
        core::claim_delete(transport.as_ref(), request, &self.queue_name, id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;
