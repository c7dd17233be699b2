//! Transport-agnostic request description.
//!
//! A [`Request`] says *what* should happen (operation name plus parameters);
//! the transport decides how that looks on the wire.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{ApiSchema, ApiVersion};
use crate::auth::{self, AuthBackend, IdentitySession};
use crate::config::{AuthBackendKind, AuthOptions};
use crate::error::ZaqarError;

/// Project id sent when the noauth backend is used without one.
pub const NOAUTH_PROJECT_ID: &str = "fake_project_id_for_noauth";

/// A declarative request against the Zaqar API.
#[derive(Clone)]
pub struct Request {
    /// Server base URL. May be filled in by an auth backend from the service catalog.
    pub endpoint: String,
    /// Name of an operation in the version's schema, e.g. `queue_create`.
    pub operation: String,
    /// Overrides the schema's URL template; used when following pagination links.
    pub reference: Option<String>,
    /// Serialized JSON body.
    pub content: Option<String>,
    /// Path and query parameters.
    pub params: Map<String, Value>,
    pub headers: BTreeMap<String, String>,
    pub api: Option<ApiVersion>,
    /// Verify the server's TLS certificate.
    pub verify: bool,
    /// CA bundle used to verify the server.
    pub cert: Option<String>,
    pub session: Option<Arc<IdentitySession>>,
}

impl Request {
    pub fn new(endpoint: impl Into<String>, api: Option<ApiVersion>) -> Self {
        Self {
            endpoint: endpoint.into(),
            operation: String::new(),
            reference: None,
            content: None,
            params: Map::new(),
            headers: BTreeMap::new(),
            api,
            verify: true,
            cert: None,
            session: None,
        }
    }

    pub fn with_session(mut self, session: Option<Arc<IdentitySession>>) -> Self {
        self.session = session;
        self
    }

    /// Schema table of the request's API version.
    pub fn api_schema(&self) -> Option<&'static ApiSchema> {
        self.api.map(|version| version.schema())
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    /// Serialize `body` as the request content.
    pub fn set_json_content<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<(), ZaqarError> {
        self.content = Some(serde_json::to_string(body)?);
        Ok(())
    }

    /// Check the request parameters against its operation's schema.
    ///
    /// A request without an API version cannot be validated.
    pub fn validate(&self) -> Result<bool, ZaqarError> {
        let schema = self.api_schema().ok_or_else(|| {
            ZaqarError::invalid_operation(format!(
                "{} cannot be validated without an API version",
                self.operation
            ))
        })?;
        schema.validate(&self.operation, &self.params)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let shown = if k.eq_ignore_ascii_case("X-Auth-Token")
                    || k.eq_ignore_ascii_case("URL-Signature")
                {
                    "<REDACTED>"
                } else {
                    v.as_str()
                };
                (k.as_str(), shown)
            })
            .collect();

        f.debug_struct("Request")
            .field("endpoint", &self.endpoint)
            .field("operation", &self.operation)
            .field("reference", &self.reference)
            .field("content", &self.content)
            .field("params", &self.params)
            .field("headers", &headers)
            .field("api", &self.api)
            .field("verify", &self.verify)
            .field("cert", &self.cert)
            .field("session", &self.session.is_some())
            .finish()
    }
}

/// Authenticate `request` and attach the common headers and body.
///
/// Builds the backend named by `auth_opts` for this single call. Clients that
/// send many requests should keep a backend and use [`prepare_request_with`].
pub async fn prepare_request(
    auth_opts: &AuthOptions,
    data: Option<&Value>,
    request: Request,
) -> Result<Request, ZaqarError> {
    let backend = auth::get_backend(auth_opts);
    prepare_request_with(backend.as_ref(), auth_opts, data, request).await
}

/// Same as [`prepare_request`], with an already constructed backend.
pub async fn prepare_request_with(
    backend: &dyn AuthBackend,
    auth_opts: &AuthOptions,
    data: Option<&Value>,
    request: Request,
) -> Result<Request, ZaqarError> {
    let api = request.api;
    let mut request = backend.authenticate(api, request).await?;

    if let Some(project_id) = auth_opts.project_id() {
        request
            .headers
            .insert("X-Project-Id".to_string(), project_id.to_string());
    }

    if !request.headers.contains_key("X-Project-Id") && auth_opts.backend == AuthBackendKind::Noauth {
        request
            .headers
            .insert("X-Project-Id".to_string(), NOAUTH_PROJECT_ID.to_string());
    }

    if let Some(data) = data {
        request.set_json_content(data)?;
    }

    debug!(
        endpoint = %request.endpoint,
        backend = %auth_opts.backend,
        "Prepared request"
    );
    Ok(request)
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
