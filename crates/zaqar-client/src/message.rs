//! Message resource.

use serde::Deserialize;
use serde_json::Value;

use crate::client::Client;
use crate::core;
use crate::error::ZaqarError;

#[derive(Debug, Deserialize)]
struct MessageFields {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    ttl: Option<u64>,
    #[serde(default)]
    age: Option<u64>,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    claim_count: u64,
    #[serde(default)]
    checksum: Option<String>,
}

/// A message in a queue, as returned by listings, gets, claims and pops.
#[derive(Debug, Clone)]
pub struct Message {
    client: Client,
    queue_name: String,
    id: String,
    href: Option<String>,
    ttl: Option<u64>,
    age: Option<u64>,
    body: Value,
    claim_count: u64,
    checksum: Option<String>,
    claim_id: Option<String>,
}

impl Message {
    /// Build a message from its JSON representation.
    ///
    /// The id is taken from `id` when present and otherwise from the last
    /// path segment of `href`. A `claim_id` query parameter on the href marks
    /// the message as claimed.
    pub fn from_value(client: Client, queue_name: impl Into<String>, value: Value) -> Result<Self, ZaqarError> {
        let fields: MessageFields = serde_json::from_value(value)?;

        let id = fields
            .id
            .or_else(|| fields.href.as_deref().map(id_from_href))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ZaqarError::UnexpectedResponse {
                message: "message has neither an id nor an href".to_string(),
            })?;
        let claim_id = fields.href.as_deref().and_then(claim_id_from_href);

        Ok(Self {
            client,
            queue_name: queue_name.into(),
            id,
            href: fields.href,
            ttl: fields.ttl,
            age: fields.age,
            body: fields.body,
            claim_count: fields.claim_count,
            checksum: fields.checksum,
            claim_id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn age(&self) -> Option<u64> {
        self.age
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn claim_count(&self) -> u64 {
        self.claim_count
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Id of the claim holding this message, if it was returned claimed.
    pub fn claim_id(&self) -> Option<&str> {
        self.claim_id.as_deref()
    }

    /// Delete the message, passing the claim id when it is claimed.
    pub async fn delete(&self) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::message_delete(
            transport.as_ref(),
            request,
            &self.queue_name,
            &self.id,
            self.claim_id.as_deref(),
        )
        .await?;
        Ok(())
    }
}

/// `/v2/queues/q/messages/<id>?claim_id=c` -> `<id>`
fn id_from_href(href: &str) -> String {
    let path = href.split('?').next().unwrap_or(href);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn claim_id_from_href(href: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "claim_id")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
