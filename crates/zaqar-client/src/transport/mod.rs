//! Wire transports.
//!
//! A [`Transport`] turns a [`Request`] into an actual call and maps the
//! server's error statuses into [`TransportError`]s. Transports are picked by
//! URL scheme: `http`/`https` use [`HttpTransport`], `ws`/`wss` use
//! [`WebsocketTransport`].

mod http;
mod websocket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{TransportError, ZaqarError};
use crate::request::Request;
use crate::response::Response;

pub use http::HttpTransport;
pub use websocket::WebsocketTransport;

/// Sends requests to a Zaqar server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the server's response.
    ///
    /// Error statuses from the shared status table are returned as
    /// [`ZaqarError::Transport`].
    async fn send(&self, request: Request) -> Result<Response, ZaqarError>;
}

/// Build the transport registered for `scheme`.
pub fn get_transport(scheme: &str, conf: &ClientConfig) -> Result<Arc<dyn Transport>, ZaqarError> {
    debug!(scheme = scheme, "Loading transport");
    match scheme {
        "http" | "https" => Ok(Arc::new(HttpTransport::new(conf.timeout))),
        "ws" | "wss" => Ok(Arc::new(WebsocketTransport::from_config(conf)?)),
        other => Err(ZaqarError::DriverLoadFailure {
            driver: other.to_string(),
            message: "no transport is registered for this scheme".to_string(),
        }),
    }
}

/// Build the transport matching the scheme of `url`.
pub fn get_transport_for(url: &str, conf: &ClientConfig) -> Result<Arc<dyn Transport>, ZaqarError> {
    let parsed = Url::parse(url)?;
    get_transport(parsed.scheme(), conf)
}

/// Build an HTTP client honoring the request's TLS settings.
///
/// With `verify` off, certificate checks are disabled. Otherwise `cert`, when
/// set, names a PEM CA bundle trusted in addition to the system roots.
pub(crate) fn build_http_client(
    verify: bool,
    cert: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, ZaqarError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("zaqar-client/", env!("CARGO_PKG_VERSION")));

    if !verify {
        builder = builder.danger_accept_invalid_certs(true);
    } else if let Some(path) = cert {
        let invalid = |message: String| ZaqarError::InvalidCertificate {
            path: path.to_string(),
            message,
        };
        let pem = std::fs::read(path).map_err(|e| invalid(e.to_string()))?;
        let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| invalid(e.to_string()))?;
        builder = builder.add_root_certificate(certificate);
    }

    Ok(builder.build()?)
}

/// Render a parameter the way the server parses it; sequences become `a,b,c`.
pub(crate) fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(param_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Convert a mapped error status into a transport error.
///
/// `describe` extracts `(title, description)` from the body, if it has them;
/// otherwise the raw body becomes the error text.
pub(crate) fn error_for_status(
    status: u16,
    body: Option<&str>,
    describe: impl FnOnce(&str) -> Option<(String, String)>,
) -> Option<TransportError> {
    let (title, description, text) = match body.and_then(describe) {
        Some((title, description)) => (Some(title), Some(description), None),
        None => (None, None, body.map(str::to_string)),
    };
    TransportError::from_status(status, title, description, text)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
