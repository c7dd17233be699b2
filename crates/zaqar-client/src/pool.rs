//! Pool resource (admin).

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiVersion;
use crate::client::Client;
use crate::core;
use crate::error::ZaqarError;

/// Fields for creating a pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSpec {
    pub uri: String,
    pub weight: u64,
    /// Pool group; only sent before v2.
    pub group: Option<String>,
    /// Flavor the pool belongs to; only sent from v2 on.
    pub flavor: Option<String>,
    pub options: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoolFields {
    name: Option<String>,
    uri: Option<String>,
    weight: Option<u64>,
    group: Option<String>,
    flavor: Option<String>,
    options: Option<Map<String, Value>>,
}

/// A storage pool.
#[derive(Debug, Clone)]
pub struct Pool {
    client: Client,
    name: String,
    uri: Option<String>,
    weight: Option<u64>,
    group: Option<String>,
    flavor: Option<String>,
    options: Map<String, Value>,
}

impl Pool {
    pub(crate) fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            uri: None,
            weight: None,
            group: None,
            flavor: None,
            options: Map::new(),
        }
    }

    pub(crate) fn with_spec(client: Client, name: impl Into<String>, spec: PoolSpec) -> Self {
        let mut pool = Self::new(client, name);
        pool.uri = Some(spec.uri);
        pool.weight = Some(spec.weight);
        pool.group = spec.group;
        pool.flavor = spec.flavor;
        pool.options = spec.options;
        pool
    }

    /// Build a pool from a listing entry.
    pub(crate) fn from_value(client: Client, value: Value) -> Result<Self, ZaqarError> {
        let fields: PoolFields = serde_json::from_value(value)?;
        let name = fields.name.clone().ok_or_else(|| ZaqarError::UnexpectedResponse {
            message: "pool entry has no name".to_string(),
        })?;
        let mut pool = Self::new(client, name);
        pool.apply(fields);
        Ok(pool)
    }

    fn apply(&mut self, fields: PoolFields) {
        if fields.uri.is_some() {
            self.uri = fields.uri;
        }
        if fields.weight.is_some() {
            self.weight = fields.weight;
        }
        if fields.group.is_some() {
            self.group = fields.group;
        }
        if fields.flavor.is_some() {
            self.flavor = fields.flavor;
        }
        if let Some(options) = fields.options {
            self.options = options;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn weight(&self) -> Option<u64> {
        self.weight
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    fn create_body(&self) -> Value {
        let mut body = json!({
            "uri": self.uri,
            "weight": self.weight,
            "options": self.options,
        });
        if self.client.api_version() >= ApiVersion::V2 {
            if let Some(flavor) = &self.flavor {
                body["flavor"] = json!(flavor);
            }
        } else if let Some(group) = &self.group {
            body["group"] = json!(group);
        }
        body
    }

    /// Create the pool with the local fields.
    pub async fn ensure_exists(&self) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::pool_create(transport.as_ref(), request, &self.name, &self.create_body()).await?;
        Ok(())
    }

    /// Fetch the pool, refreshing the local fields.
    pub async fn get(&mut self) -> Result<Value, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let pool = core::pool_get(transport.as_ref(), request, &self.name)
            .await?
            .unwrap_or_default();
        if let Ok(fields) = serde_json::from_value::<PoolFields>(pool.clone()) {
            self.apply(fields);
        }
        Ok(pool)
    }

    /// Update fields on the server, then locally.
    pub async fn update(&mut self, data: Map<String, Value>) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let body = Value::Object(data);
        core::pool_update(transport.as_ref(), request, &self.name, &body).await?;
        self.apply(serde_json::from_value(body)?);
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::pool_delete(transport.as_ref(), request, &self.name).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
