//! Identity service (Keystone v3) authentication.
//!
//! Only the part of the identity API needed by a messaging client is spoken
//! here: issuing a token via `POST /v3/auth/tokens` and reading the messaging
//! endpoint out of the returned service catalog.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::AuthBackend;
use crate::api::ApiVersion;
use crate::config::AuthSettings;
use crate::error::{AuthError, ZaqarError};
use crate::request::Request;
use crate::transport::build_http_client;

const DEFAULT_SERVICE_TYPE: &str = "messaging";
const DEFAULT_ENDPOINT_TYPE: &str = "publicURL";
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ============================================================================
// Identity Session
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

/// An authenticated identity service session: a scoped token and its catalog.
pub struct IdentitySession {
    token: String,
    expires_at: Option<DateTime<Utc>>,
    catalog: Vec<CatalogService>,
}

impl IdentitySession {
    /// Build a session from an already issued token and its catalog.
    pub fn from_parts(
        token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        catalog: Value,
    ) -> Result<Self, ZaqarError> {
        Ok(Self {
            token: token.into(),
            expires_at,
            catalog: serde_json::from_value(catalog)?,
        })
    }

    /// Request a project-scoped token from the identity service.
    ///
    /// Uses the token method when `auth_token` is set, the password method
    /// otherwise.
    pub async fn authenticate(settings: &AuthSettings) -> Result<Self, ZaqarError> {
        let auth_url = settings.auth_url.as_deref().ok_or(AuthError::MissingAuthUrl)?;
        let tokens_url = format!("{}/auth/tokens", identity_v3_base(auth_url)?);

        let http = build_http_client(
            !settings.insecure,
            settings.cacert.as_deref(),
            IDENTITY_TIMEOUT,
        )?;

        debug!(url = %tokens_url, "Requesting identity token");
        let response = http
            .post(&tokens_url)
            .json(&token_request_body(settings))
            .send()
            .await
            .map_err(AuthError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::IdentityService {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AuthError::IdentityService {
                status: status.as_u16(),
                message: "response did not include X-Subject-Token".to_string(),
            })?;

        let body: TokenResponse = response.json().await.map_err(AuthError::from)?;
        let expires_at = body
            .token
            .expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        info!(expires_at = ?expires_at, "Obtained identity token");
        Ok(Self {
            token,
            expires_at,
            catalog: body.token.catalog,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) <= Utc::now()
            }
            None => false,
        }
    }

    /// Find a catalog endpoint by service type, interface and optional region.
    ///
    /// Accepts both `public` and the older `publicURL` interface spelling.
    pub fn get_endpoint(
        &self,
        service_type: &str,
        interface: &str,
        region: Option<&str>,
    ) -> Result<String, AuthError> {
        let wanted = interface.strip_suffix("URL").unwrap_or(interface);

        self.catalog
            .iter()
            .filter(|service| service.service_type == service_type)
            .flat_map(|service| service.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == wanted
                    && region.map_or(true, |r| {
                        endpoint.region.as_deref() == Some(r) || endpoint.region_id.as_deref() == Some(r)
                    })
            })
            .map(|endpoint| endpoint.url.clone())
            .ok_or_else(|| AuthError::EndpointNotFound {
                service_type: service_type.to_string(),
                interface: interface.to_string(),
            })
    }
}

impl fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySession")
            .field("token", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .field("services", &self.catalog.len())
            .finish()
    }
}

/// Normalize an auth URL to its v3 root.
fn identity_v3_base(auth_url: &str) -> Result<String, AuthError> {
    let trimmed = auth_url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or_default();

    if last == "v3" {
        Ok(trimmed.to_string())
    } else if last.starts_with('v') && last[1..].starts_with(|c: char| c.is_ascii_digit()) {
        Err(AuthError::UnsupportedIdentityVersion {
            auth_url: auth_url.to_string(),
        })
    } else {
        Ok(format!("{}/v3", trimmed))
    }
}

fn domain(name: &Option<String>, id: &Option<String>) -> Option<Value> {
    match (id, name) {
        (Some(id), _) => Some(json!({ "id": id })),
        (None, Some(name)) => Some(json!({ "name": name })),
        (None, None) => None,
    }
}

fn token_request_body(settings: &AuthSettings) -> Value {
    let identity = match &settings.auth_token {
        Some(token) => json!({
            "methods": ["token"],
            "token": { "id": token }
        }),
        None => {
            let mut user = Map::new();
            if let Some(id) = &settings.user_id {
                user.insert("id".to_string(), json!(id));
            }
            if let Some(name) = &settings.username {
                user.insert("name".to_string(), json!(name));
            }
            if let Some(password) = &settings.password {
                user.insert("password".to_string(), json!(password));
            }
            if let Some(domain) = domain(&settings.user_domain_name, &settings.user_domain_id) {
                user.insert("domain".to_string(), domain);
            }
            json!({
                "methods": ["password"],
                "password": { "user": user }
            })
        }
    };

    let mut auth = json!({ "identity": identity });
    let project = match (&settings.project_id, &settings.project_name) {
        (Some(id), _) => Some(json!({ "id": id })),
        (None, Some(name)) => {
            let mut project = json!({ "name": name });
            if let Some(domain) = domain(&settings.project_domain_name, &settings.project_domain_id)
            {
                project["domain"] = domain;
            }
            Some(project)
        }
        (None, None) => None,
    };
    if let Some(project) = project {
        auth["scope"] = json!({ "project": project });
    }

    json!({ "auth": auth })
}

// ============================================================================
// Backend
// ============================================================================

/// Authenticates against the identity service.
///
/// A configured `auth_token` is sent as is. Otherwise a token is issued from
/// the configured credentials. When the request has no endpoint, the
/// messaging endpoint is looked up in the service catalog.
pub struct KeystoneAuth {
    settings: AuthSettings,
    session: Mutex<Option<Arc<IdentitySession>>>,
}

impl KeystoneAuth {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    /// Cached session, re-established once its token expired.
    async fn session(&self) -> Result<Arc<IdentitySession>, ZaqarError> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref().filter(|s| !s.is_expired()) {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(IdentitySession::authenticate(&self.settings).await?);
        *cached = Some(Arc::clone(&session));
        Ok(session)
    }
}

impl fmt::Debug for KeystoneAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoneAuth")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthBackend for KeystoneAuth {
    async fn authenticate(
        &self,
        _api: Option<ApiVersion>,
        mut request: Request,
    ) -> Result<Request, ZaqarError> {
        let mut token = self.settings.auth_token.clone();

        if token.is_none() || request.endpoint.is_empty() {
            let session = match &request.session {
                Some(session) => Arc::clone(session),
                None => self.session().await?,
            };

            if token.is_none() {
                token = Some(session.token().to_string());
            }

            if request.endpoint.is_empty() {
                let service_type = self
                    .settings
                    .service_type
                    .as_deref()
                    .unwrap_or(DEFAULT_SERVICE_TYPE);
                let endpoint_type = self
                    .settings
                    .endpoint_type
                    .as_deref()
                    .unwrap_or(DEFAULT_ENDPOINT_TYPE);
                request.endpoint = session.get_endpoint(
                    service_type,
                    endpoint_type,
                    self.settings.region_name.as_deref(),
                )?;
                debug!(endpoint = %request.endpoint, "Resolved messaging endpoint from catalog");
            }
        }

        if let Some(token) = token {
            request.headers.insert("X-Auth-Token".to_string(), token);
        }
        request.verify = !self.settings.insecure;
        request.cert = self.settings.cacert.clone();
        Ok(request)
    }
}

#[cfg(test)]
#[path = "keystone_tests.rs"]
mod tests;
