//! API version schemas.
//!
//! Each supported Zaqar API version has one immutable operation table, built
//! on first use. An [`Operation`] describes how a named request maps onto the
//! wire: its URL template relative to the version prefix, the HTTP method, and
//! the parameters it accepts. Later versions are derived from earlier ones by
//! copying the table and explicitly adding and removing entries.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::ZaqarError;

// ============================================================================
// API Versions
// ============================================================================

/// Zaqar API versions understood by this client.
///
/// Ordering follows release order, so `version >= ApiVersion::V1_1` reads as
/// "at least v1.1".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "1")]
    V1,
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "2")]
    V2,
}

impl ApiVersion {
    /// URL prefix for this version, e.g. `v1.1`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V1_1 => "v1.1",
            Self::V2 => "v2",
        }
    }

    /// Numeric form, e.g. `1.1`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V1_1 => "1.1",
            Self::V2 => "2",
        }
    }

    /// Operation table for this version.
    pub fn schema(&self) -> &'static ApiSchema {
        match self {
            Self::V1 => &V1_SCHEMA,
            Self::V1_1 => &V1_1_SCHEMA,
            Self::V2 => &V2_SCHEMA,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = ZaqarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        match number {
            "1" | "1.0" => Ok(Self::V1),
            "1.1" => Ok(Self::V1_1),
            "2" | "2.0" => Ok(Self::V2),
            _ => Err(ZaqarError::unsupported_version(s)),
        }
    }
}

// ============================================================================
// Operation Descriptors
// ============================================================================

/// JSON type accepted for an operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    /// A list of strings, or a single pre-joined string.
    List,
}

impl ParamType {
    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::List => json!({ "type": ["string", "array"], "items": { "type": "string" } }),
        }
    }
}

/// Wire description of a single named operation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: &'static str,
    /// URL template relative to the version prefix, with `{param}` placeholders.
    pub reference: &'static str,
    pub method: Method,
    pub required: Vec<&'static str>,
    pub properties: Vec<(&'static str, ParamType)>,
    /// Only meaningful to operators; regular tenants get 403.
    pub admin: bool,
}

impl Operation {
    fn new(name: &'static str, reference: &'static str, method: Method) -> Self {
        Self {
            name,
            reference,
            method,
            required: Vec::new(),
            properties: Vec::new(),
            admin: false,
        }
    }

    /// Mark string parameters as required. Each one is also a known property.
    fn requires(mut self, names: &[&'static str]) -> Self {
        for name in names {
            self.required.push(name);
            if !self.properties.iter().any(|(p, _)| p == name) {
                self.properties.push((name, ParamType::String));
            }
        }
        self
    }

    fn with(mut self, name: &'static str, kind: ParamType) -> Self {
        match self.properties.iter_mut().find(|(p, _)| *p == name) {
            Some(existing) => existing.1 = kind,
            None => self.properties.push((name, kind)),
        }
        self
    }

    fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    pub fn accepts(&self, param: &str) -> bool {
        self.properties.iter().any(|(p, _)| *p == param)
    }

    /// Draft 4 JSON schema for this operation's parameters.
    ///
    /// Parameters outside the declared set are rejected.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, kind)| (name.to_string(), kind.json_schema()))
            .collect();

        let mut schema = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        // Draft 4 forbids an empty `required` array.
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

// ============================================================================
// Schema Tables
// ============================================================================

/// The complete operation table of one API version.
pub struct ApiSchema {
    version: ApiVersion,
    operations: BTreeMap<&'static str, Operation>,
    validators: Mutex<HashMap<&'static str, Arc<jsonschema::Validator>>>,
}

impl ApiSchema {
    fn new(version: ApiVersion, operations: BTreeMap<&'static str, Operation>) -> Self {
        Self {
            version,
            operations,
            validators: Mutex::new(HashMap::new()),
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn label(&self) -> &'static str {
        self.version.label()
    }

    pub fn is_supported(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    /// Look up an operation descriptor.
    pub fn get_schema(&self, operation: &str) -> Result<&Operation, ZaqarError> {
        self.operations
            .get(operation)
            .ok_or_else(|| ZaqarError::invalid_operation(format!("{} is not a valid operation", operation)))
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    /// Check `params` against the operation's declared parameters.
    ///
    /// Invalid parameters yield `Ok(false)`; only an unknown operation is an
    /// error. Requests are not validated implicitly, the server validates them
    /// again anyway.
    pub fn validate(&self, operation: &str, params: &Map<String, Value>) -> Result<bool, ZaqarError> {
        let validator = self.validator(operation)?;
        let instance = Value::Object(params.clone());
        let valid = validator.is_valid(&instance);
        if !valid {
            debug!(
                api = self.label(),
                operation = operation,
                "Request parameters failed schema validation"
            );
        }
        Ok(valid)
    }

    fn validator(&self, operation: &str) -> Result<Arc<jsonschema::Validator>, ZaqarError> {
        let descriptor = self.get_schema(operation)?;

        let mut cache = self
            .validators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = cache.get(descriptor.name) {
            return Ok(Arc::clone(existing));
        }

        let validator = jsonschema::draft4::new(&descriptor.json_schema()).map_err(|e| {
            ZaqarError::invalid_operation(format!(
                "schema for {} could not be compiled: {}",
                operation, e
            ))
        })?;
        let validator = Arc::new(validator);
        cache.insert(descriptor.name, Arc::clone(&validator));
        Ok(validator)
    }
}

impl fmt::Debug for ApiSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSchema")
            .field("version", &self.version)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

static V1_SCHEMA: LazyLock<ApiSchema> =
    LazyLock::new(|| ApiSchema::new(ApiVersion::V1, v1_operations()));
static V1_1_SCHEMA: LazyLock<ApiSchema> =
    LazyLock::new(|| ApiSchema::new(ApiVersion::V1_1, v1_1_operations()));
static V2_SCHEMA: LazyLock<ApiSchema> =
    LazyLock::new(|| ApiSchema::new(ApiVersion::V2, v2_operations()));

fn table(ops: Vec<Operation>) -> BTreeMap<&'static str, Operation> {
    ops.into_iter().map(|op| (op.name, op)).collect()
}

fn v1_operations() -> BTreeMap<&'static str, Operation> {
    use ParamType::*;

    const QUEUE: &str = "queues/{queue_name}";
    const MESSAGES: &str = "queues/{queue_name}/messages";
    const MESSAGE: &str = "queues/{queue_name}/messages/{message_id}";
    const CLAIM: &str = "queues/{queue_name}/claims/{claim_id}";
    const POOL: &str = "pools/{pool_name}";
    const FLAVOR: &str = "flavors/{flavor_name}";

    table(vec![
        Operation::new("queue_list", "queues", Method::GET)
            .with("marker", String)
            .with("limit", Integer)
            .with("detailed", Boolean),
        Operation::new("queue_create", QUEUE, Method::PUT).requires(&["queue_name"]),
        Operation::new("queue_exists", QUEUE, Method::HEAD).requires(&["queue_name"]),
        Operation::new("queue_delete", QUEUE, Method::DELETE).requires(&["queue_name"]),
        Operation::new("queue_set_metadata", "queues/{queue_name}/metadata", Method::PUT)
            .requires(&["queue_name"]),
        Operation::new("queue_get_metadata", "queues/{queue_name}/metadata", Method::GET)
            .requires(&["queue_name"]),
        Operation::new("queue_get_stats", "queues/{queue_name}/stats", Method::GET)
            .requires(&["queue_name"]),
        Operation::new("message_list", MESSAGES, Method::GET)
            .requires(&["queue_name"])
            .with("marker", String)
            .with("limit", Integer)
            .with("echo", Boolean)
            .with("include_claimed", Boolean),
        Operation::new("message_post", MESSAGES, Method::POST)
            .requires(&["queue_name"])
            .with("claim_id", String),
        Operation::new("message_get", MESSAGE, Method::GET)
            .requires(&["queue_name", "message_id"])
            .with("claim_id", String),
        Operation::new("message_get_many", MESSAGES, Method::GET)
            .requires(&["queue_name", "ids"])
            .with("ids", List)
            .with("claim_id", String),
        Operation::new("message_delete", MESSAGE, Method::DELETE)
            .requires(&["queue_name", "message_id"])
            .with("claim_id", String),
        Operation::new("message_delete_many", MESSAGES, Method::DELETE)
            .requires(&["queue_name", "ids"])
            .with("ids", List),
        Operation::new("pool_create", POOL, Method::PUT).requires(&["pool_name"]),
        Operation::new("pool_get", POOL, Method::GET).requires(&["pool_name"]),
        Operation::new("pool_update", POOL, Method::PATCH).requires(&["pool_name"]),
        Operation::new("pool_list", "pools", Method::GET)
            .with("pool_name", String)
            .with("marker", String)
            .with("limit", Integer)
            .with("detailed", Boolean),
        Operation::new("pool_delete", POOL, Method::DELETE).requires(&["pool_name"]),
        Operation::new("flavor_create", FLAVOR, Method::PUT).requires(&["flavor_name"]),
        Operation::new("flavor_get", FLAVOR, Method::GET).requires(&["flavor_name"]),
        Operation::new("flavor_delete", FLAVOR, Method::DELETE).requires(&["flavor_name"]),
        Operation::new("claim_create", "queues/{queue_name}/claims", Method::POST)
            .requires(&["queue_name"])
            .with("limit", Integer)
            .with("grace", Integer),
        Operation::new("claim_get", CLAIM, Method::GET).requires(&["queue_name", "claim_id"]),
        Operation::new("claim_update", CLAIM, Method::PATCH)
            .requires(&["queue_name", "claim_id"]),
        Operation::new("claim_delete", CLAIM, Method::DELETE)
            .requires(&["queue_name", "claim_id"]),
        Operation::new("health", "health", Method::GET).admin(),
    ])
}

fn v1_1_operations() -> BTreeMap<&'static str, Operation> {
    use ParamType::*;

    let mut ops = v1_operations();
    ops.extend(table(vec![
        Operation::new("queue_get", "queues/{queue_name}", Method::GET).requires(&["queue_name"]),
        Operation::new("queue_update", "queues/{queue_name}", Method::PATCH)
            .requires(&["queue_name"]),
        Operation::new("message_pop", "queues/{queue_name}/messages", Method::DELETE)
            .requires(&["queue_name", "pop"])
            .with("pop", Integer),
        Operation::new("flavor_update", "flavors/{flavor_name}", Method::PATCH)
            .requires(&["flavor_name"]),
        Operation::new("flavor_list", "flavors", Method::GET)
            .with("flavor_name", String)
            .with("marker", String)
            .with("limit", Integer)
            .with("detailed", Boolean),
    ]));
    // Metadata lives on the queue resource itself from v1.1 on.
    ops.remove("queue_get_metadata");
    ops.remove("queue_set_metadata");
    ops
}

fn v2_operations() -> BTreeMap<&'static str, Operation> {
    use ParamType::*;

    const SUBSCRIPTIONS: &str = "queues/{queue_name}/subscriptions";
    const SUBSCRIPTION: &str = "queues/{queue_name}/subscriptions/{subscription_id}";

    let mut ops = v1_1_operations();
    ops.extend(table(vec![
        Operation::new("queue_purge", "queues/{queue_name}/purge", Method::POST)
            .requires(&["queue_name"]),
        Operation::new("signed_url_create", "queues/{queue_name}/share", Method::POST)
            .requires(&["queue_name"]),
        Operation::new("subscription_create", SUBSCRIPTIONS, Method::POST)
            .requires(&["queue_name"]),
        Operation::new("subscription_get", SUBSCRIPTION, Method::GET)
            .requires(&["queue_name", "subscription_id"]),
        Operation::new("subscription_update", SUBSCRIPTION, Method::PATCH)
            .requires(&["queue_name", "subscription_id"]),
        Operation::new("subscription_delete", SUBSCRIPTION, Method::DELETE)
            .requires(&["queue_name", "subscription_id"]),
        Operation::new("subscription_list", SUBSCRIPTIONS, Method::GET)
            .requires(&["queue_name"])
            .with("marker", String)
            .with("limit", Integer)
            .with("detailed", Boolean),
        Operation::new("ping", "ping", Method::GET),
        // Health is open to regular tenants from v2 on.
        Operation::new("health", "health", Method::GET),
        Operation::new("homedoc", "", Method::GET),
    ]));
    ops
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
