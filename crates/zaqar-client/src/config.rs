//! Client configuration.
//!
//! [`ClientConfig`] mirrors the configuration document accepted by the Zaqar
//! client tooling:
//!
//! ```json
//! {
//!   "auth_opts": { "backend": "keystone", "options": { "os_auth_url": "..." } },
//!   "client_uuid": "5c8b7e8ec6a64f2f9b3c1bd8a3a5e5a1"
//! }
//! ```
//!
//! Option keys may be given with or without the `os_` prefix.

use std::env;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Available authentication backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthBackendKind {
    #[default]
    #[serde(alias = "no-auth")]
    Noauth,
    Keystone,
    #[serde(alias = "signed_url")]
    SignedUrl,
}

impl AuthBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noauth => "noauth",
            Self::Keystone => "keystone",
            Self::SignedUrl => "signed-url",
        }
    }
}

impl fmt::Display for AuthBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings consumed by the authentication backends and transports.
///
/// Every backend reads only the fields it needs; unused fields are ignored.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    #[serde(alias = "os_username", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(alias = "os_password", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(alias = "os_user_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(alias = "os_user_domain_name", skip_serializing_if = "Option::is_none")]
    pub user_domain_name: Option<String>,
    #[serde(alias = "os_user_domain_id", skip_serializing_if = "Option::is_none")]
    pub user_domain_id: Option<String>,
    #[serde(alias = "os_project_id", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(alias = "os_project_name", skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(alias = "os_project_domain_name", skip_serializing_if = "Option::is_none")]
    pub project_domain_name: Option<String>,
    #[serde(alias = "os_project_domain_id", skip_serializing_if = "Option::is_none")]
    pub project_domain_id: Option<String>,
    #[serde(alias = "os_auth_url", skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(alias = "os_auth_token", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(alias = "os_region_name", skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(alias = "os_service_type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(alias = "os_endpoint_type", skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    #[serde(alias = "os_insecure")]
    pub insecure: bool,
    #[serde(alias = "os_cacert", skip_serializing_if = "Option::is_none")]
    pub cacert: Option<String>,

    // Pre-signed URL data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl AuthSettings {
    /// Fill unset identity settings from the conventional `OS_*` environment variables.
    pub fn with_env_defaults(mut self) -> Self {
        fn fill(slot: &mut Option<String>, var: &str) {
            if slot.is_none() {
                *slot = env::var(var).ok().filter(|v| !v.is_empty());
            }
        }

        fill(&mut self.username, "OS_USERNAME");
        fill(&mut self.password, "OS_PASSWORD");
        fill(&mut self.user_id, "OS_USER_ID");
        fill(&mut self.user_domain_name, "OS_USER_DOMAIN_NAME");
        fill(&mut self.user_domain_id, "OS_USER_DOMAIN_ID");
        fill(&mut self.project_id, "OS_PROJECT_ID");
        fill(&mut self.project_name, "OS_PROJECT_NAME");
        fill(&mut self.project_domain_name, "OS_PROJECT_DOMAIN_NAME");
        fill(&mut self.project_domain_id, "OS_PROJECT_DOMAIN_ID");
        fill(&mut self.auth_url, "OS_AUTH_URL");
        fill(&mut self.auth_token, "OS_AUTH_TOKEN");
        fill(&mut self.region_name, "OS_REGION_NAME");
        fill(&mut self.cacert, "OS_CACERT");
        self
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<REDACTED>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("AuthSettings")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("user_id", &self.user_id)
            .field("project_id", &self.project_id)
            .field("project_name", &self.project_name)
            .field("auth_url", &self.auth_url)
            .field("auth_token", &redact(&self.auth_token))
            .field("region_name", &self.region_name)
            .field("insecure", &self.insecure)
            .field("cacert", &self.cacert)
            .field("signature", &redact(&self.signature))
            .finish_non_exhaustive()
    }
}

/// Which backend to authenticate with, and its settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOptions {
    pub backend: AuthBackendKind,
    pub options: AuthSettings,
}

impl AuthOptions {
    pub fn new(backend: AuthBackendKind, options: AuthSettings) -> Self {
        Self { backend, options }
    }

    pub fn noauth() -> Self {
        Self::default()
    }

    /// Project id to send as `X-Project-Id`, if one was configured.
    pub fn project_id(&self) -> Option<&str> {
        self.options.project_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Configuration for a [`crate::Client`].
///
/// # Examples
///
/// ```
/// use zaqar_client::config::{AuthOptions, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_auth_opts(AuthOptions::noauth())
///     .with_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub auth_opts: AuthOptions,
    /// Identifies this client to the server; generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uuid: Option<String>,
    /// Per-request timeout for the HTTP transport.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_opts: AuthOptions::default(),
            client_uuid: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn with_auth_opts(mut self, auth_opts: AuthOptions) -> Self {
        self.auth_opts = auth_opts;
        self
    }

    pub fn with_client_uuid(mut self, client_uuid: impl Into<String>) -> Self {
        self.client_uuid = Some(client_uuid.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
