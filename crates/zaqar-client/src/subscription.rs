//! Subscription resource (v2).

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::core;
use crate::error::ZaqarError;

/// Default subscription lifetime in seconds.
pub const DEFAULT_SUBSCRIPTION_TTL: u64 = 60;

/// Fields for creating a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    pub subscriber: Option<String>,
    pub ttl: u64,
    pub id: Option<String>,
    pub options: Map<String, Value>,
}

impl Default for SubscriptionSpec {
    fn default() -> Self {
        Self {
            subscriber: None,
            ttl: DEFAULT_SUBSCRIPTION_TTL,
            id: None,
            options: Map::new(),
        }
    }
}

impl SubscriptionSpec {
    pub fn new(subscriber: impl Into<String>) -> Self {
        Self {
            subscriber: Some(subscriber.into()),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubscriptionFields {
    id: Option<String>,
    source: Option<String>,
    subscriber: Option<String>,
    ttl: Option<u64>,
    options: Option<Map<String, Value>>,
    age: Option<u64>,
    confirmed: Option<bool>,
}

/// A notification subscription on a queue.
#[derive(Debug, Clone)]
pub struct Subscription {
    client: Client,
    queue_name: String,
    id: Option<String>,
    subscriber: Option<String>,
    ttl: u64,
    options: Map<String, Value>,
    age: Option<u64>,
    confirmed: Option<bool>,
}

impl Subscription {
    pub(crate) fn new(client: Client, queue_name: impl Into<String>, spec: SubscriptionSpec) -> Self {
        Self {
            client,
            queue_name: queue_name.into(),
            id: spec.id,
            subscriber: spec.subscriber,
            ttl: spec.ttl,
            options: spec.options,
            age: None,
            confirmed: None,
        }
    }

    /// Build a subscription from a listing entry, whose `source` is the queue name.
    pub(crate) fn from_value(client: Client, value: Value) -> Result<Self, ZaqarError> {
        let fields: SubscriptionFields = serde_json::from_value(value)?;
        let queue_name = fields.source.clone().ok_or_else(|| ZaqarError::UnexpectedResponse {
            message: "subscription entry has no source".to_string(),
        })?;
        let mut subscription = Self::new(client, queue_name, SubscriptionSpec::default());
        subscription.apply(fields);
        Ok(subscription)
    }

    fn apply(&mut self, fields: SubscriptionFields) {
        if fields.id.is_some() {
            self.id = fields.id;
        }
        if fields.subscriber.is_some() {
            self.subscriber = fields.subscriber;
        }
        if let Some(ttl) = fields.ttl {
            self.ttl = ttl;
        }
        if let Some(options) = fields.options {
            self.options = options;
        }
        if fields.age.is_some() {
            self.age = fields.age;
        }
        if fields.confirmed.is_some() {
            self.confirmed = fields.confirmed;
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn subscriber(&self) -> Option<&str> {
        self.subscriber.as_deref()
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn age(&self) -> Option<u64> {
        self.age
    }

    pub fn confirmed(&self) -> Option<bool> {
        self.confirmed
    }

    fn require_id(&self) -> Result<&str, ZaqarError> {
        self.id
            .as_deref()
            .ok_or_else(|| ZaqarError::invalid_operation("subscription has no id"))
    }

    /// Create the subscription when it has a subscriber but no id, then load it.
    ///
    /// Not race safe: the subscription may be deleted right after.
    pub async fn ensure_exists(&mut self) -> Result<(), ZaqarError> {
        if self.id.is_none() {
            if let Some(subscriber) = &self.subscriber {
                let data = json!({
                    "subscriber": subscriber,
                    "ttl": self.ttl,
                    "options": self.options,
                });
                let (request, transport) = self.client.request_and_transport().await?;
                let created = core::subscription_create(transport.as_ref(), request, &self.queue_name, &data).await?;
                self.id = created
                    .as_ref()
                    .and_then(|c| c.get("subscription_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }

        if self.id.is_some() {
            self.get().await?;
        }
        Ok(())
    }

    /// Fetch the subscription, refreshing the local fields.
    pub async fn get(&mut self) -> Result<Value, ZaqarError> {
        let id = self.require_id()?.to_string();
        let (request, transport) = self.client.request_and_transport().await?;
        let subscription = core::subscription_get(transport.as_ref(), request, &self.queue_name, &id)
            .await?
            .unwrap_or_default();
        if let Ok(fields) = serde_json::from_value::<SubscriptionFields>(subscription.clone()) {
            self.apply(fields);
        }
        Ok(subscription)
    }

    /// Update fields on the server, then locally.
    pub async fn update(&mut self, data: Map<String, Value>) -> Result<(), ZaqarError> {
        let id = self.require_id()?.to_string();
        let (request, transport) = self.client.request_and_transport().await?;
        let body = Value::Object(data);
        core::subscription_update(transport.as_ref(), request, &self.queue_name, &id, &body).await?;
        self.apply(serde_json::from_value(body)?);
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), ZaqarError> {
        let id = self.require_id()?;
        let (request, transport) = self.client.request_and_transport().await?;
        core::subscription_delete(transport.as_ref(), request, &self.queue_name, id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
