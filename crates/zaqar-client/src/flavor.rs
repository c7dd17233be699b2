//! Flavor resource (admin, v1.1+).

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::ApiVersion;
use crate::client::Client;
use crate::core;
use crate::error::ZaqarError;

/// Fields for creating a flavor.
///
/// v1.1 flavors point at a single pool group (`pool`); from v2 on they list
/// their pools (`pool_list`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlavorSpec {
    pub pool: Option<String>,
    pub pool_list: Vec<String>,
    pub capabilities: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlavorFields {
    name: Option<String>,
    pool: Option<String>,
    pool_group: Option<String>,
    pool_list: Option<Vec<String>>,
    capabilities: Option<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct Flavor {
    client: Client,
    name: String,
    pool: Option<String>,
    pool_list: Vec<String>,
    capabilities: Map<String, Value>,
}

impl Flavor {
    pub(crate) fn new(client: Client, name: impl Into<String>, spec: FlavorSpec) -> Self {
        Self {
            client,
            name: name.into(),
            pool: spec.pool,
            pool_list: spec.pool_list,
            capabilities: spec.capabilities,
        }
    }

    /// Build a flavor from a listing entry.
    pub(crate) fn from_value(client: Client, value: Value) -> Result<Self, ZaqarError> {
        let fields: FlavorFields = serde_json::from_value(value)?;
        let name = fields.name.clone().ok_or_else(|| ZaqarError::UnexpectedResponse {
            message: "flavor entry has no name".to_string(),
        })?;
        let mut flavor = Self::new(client, name, FlavorSpec::default());
        flavor.apply(fields);
        Ok(flavor)
    }

    fn apply(&mut self, fields: FlavorFields) {
        if let Some(pool) = fields.pool.or(fields.pool_group) {
            self.pool = Some(pool);
        }
        if let Some(pool_list) = fields.pool_list {
            self.pool_list = pool_list;
        }
        if let Some(capabilities) = fields.capabilities {
            self.capabilities = capabilities;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> Option<&str> {
        self.pool.as_deref()
    }

    pub fn pool_list(&self) -> &[String] {
        &self.pool_list
    }

    pub fn capabilities(&self) -> &Map<String, Value> {
        &self.capabilities
    }

    /// Make sure the flavor exists on the server.
    ///
    /// On v1.1 an existing flavor is loaded and only a missing one is
    /// created. From v2 on the flavor is written with PUT, which creates or
    /// replaces it.
    pub async fn ensure_exists(&mut self) -> Result<(), ZaqarError> {
        if self.client.api_version() >= ApiVersion::V2 {
            let mut body = json!({ "pool_list": self.pool_list });
            if !self.capabilities.is_empty() {
                body["capabilities"] = json!(self.capabilities);
            }
            let (request, transport) = self.client.request_and_transport().await?;
            core::flavor_create(transport.as_ref(), request, &self.name, &body).await?;
            return Ok(());
        }

        match self.get().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                let body = json!({ "pool": self.pool, "capabilities": self.capabilities });
                let (request, transport) = self.client.request_and_transport().await?;
                core::flavor_create(transport.as_ref(), request, &self.name, &body).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the flavor, refreshing the local fields.
    pub async fn get(&mut self) -> Result<Value, ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let flavor = core::flavor_get(transport.as_ref(), request, &self.name)
            .await?
            .unwrap_or_default();
        if let Ok(fields) = serde_json::from_value::<FlavorFields>(flavor.clone()) {
            self.apply(fields);
        }
        Ok(flavor)
    }

    /// Update fields on the server, then locally.
    pub async fn update(&mut self, data: Map<String, Value>) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        let body = Value::Object(data);
        core::flavor_update(transport.as_ref(), request, &self.name, &body).await?;
        self.apply(serde_json::from_value(body)?);
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), ZaqarError> {
        let (request, transport) = self.client.request_and_transport().await?;
        core::flavor_delete(transport.as_ref(), request, &self.name).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "flavor_tests.rs"]
mod tests;
