//! Error types for Zaqar client operations.
//!
//! Server-side failures surface as [`TransportError`], classified by the
//! HTTP-style status code the service answered with. Everything the client
//! detects locally (unknown operations, unsupported API versions, missing
//! parameters, authentication problems) has its own [`ZaqarError`] variant.

use std::fmt;

use thiserror::Error;

use crate::api::ApiVersion;

/// Classification of an error response sent by the Zaqar service.
///
/// Only the status codes listed here are converted into a [`TransportError`];
/// responses with any other status are handed back to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request was malformed (400).
    MalformedRequest,
    /// The request was not authenticated (401).
    Unauthorized,
    /// The request is not allowed to access the resource (403).
    Forbidden,
    /// The resource does not exist (404).
    ResourceNotFound,
    /// The request conflicts with the resource state (409).
    Conflict,
    /// The server hit an unexpected condition (500).
    InternalServerError,
    /// The server could not service the request (503).
    ServiceUnavailable,
}

impl TransportErrorKind {
    /// Map a response status code to its error kind.
    ///
    /// Returns `None` for codes that are not part of the error table.
    pub fn from_status(code: u16) -> Option<Self> {
        match code {
            400 => Some(Self::MalformedRequest),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::ResourceNotFound),
            409 => Some(Self::Conflict),
            500 => Some(Self::InternalServerError),
            503 => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// Status code this kind represents.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::ResourceNotFound => 404,
            Self::Conflict => 409,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }
}

/// An error response returned by the Zaqar service.
///
/// `title` and `description` come from the structured error body when the
/// server sent one; otherwise the raw body is kept in `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: Option<String>,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        title: Option<String>,
        description: Option<String>,
        text: Option<String>,
    ) -> Self {
        Self {
            kind,
            title,
            description,
            text,
        }
    }

    /// Build a transport error for `code`, if the code is part of the error table.
    pub fn from_status(
        code: u16,
        title: Option<String>,
        description: Option<String>,
        text: Option<String>,
    ) -> Option<Self> {
        TransportErrorKind::from_status(code).map(|kind| Self::new(kind, title, description, text))
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == TransportErrorKind::ResourceNotFound
    }

    /// Check if the service reported a condition that may clear up on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::InternalServerError | TransportErrorKind::ServiceUnavailable
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error response from Zaqar. Code: {}.", self.status_code())?;
        let parts = [
            ("Title", &self.title),
            ("Description", &self.description),
            ("Text", &self.text),
        ];
        for (label, value) in parts {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                write!(f, " {}: {}.", label, value)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for TransportError {}

/// Authentication backend failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A setting the backend cannot work without was not supplied.
    #[error("Missing authentication option: {option}")]
    MissingOption { option: String },

    /// The identity endpoint could not be determined.
    #[error("Unable to determine the Keystone endpoint because auth_url is not given.")]
    MissingAuthUrl,

    /// The identity service URL names a protocol version this client does not speak.
    #[error("Unsupported identity API version in auth_url: {auth_url}")]
    UnsupportedIdentityVersion { auth_url: String },

    /// The service catalog has no matching messaging endpoint.
    #[error("No {interface} endpoint for service type '{service_type}' found in the service catalog")]
    EndpointNotFound {
        service_type: String,
        interface: String,
    },

    /// The identity service rejected or failed the token request.
    #[error("Identity service error: {status} - {message}")]
    IdentityService { status: u16, message: String },

    /// Network failure while talking to the identity service.
    #[error("Identity service request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::IdentityService { status, .. } => *status >= 500,
            Self::Network(_) => true,
            _ => false,
        }
    }
}

/// Top-level error for every client operation.
#[derive(Debug, Error)]
pub enum ZaqarError {
    /// The service answered with a mapped error status.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No transport is registered for the requested scheme.
    #[error("Failed to load transport driver '{driver}': {message}")]
    DriverLoadFailure { driver: String, message: String },

    /// The operation is not valid for the active API version or object state.
    #[error("{message}")]
    InvalidOperation { message: String },

    /// The API version is unknown, or too old for the requested feature.
    #[error("Unsupported API version: {version}")]
    UnsupportedVersion { version: String },

    /// A URL template placeholder had no matching request parameter.
    #[error("Operation '{operation}' is missing required parameter '{parameter}'")]
    MissingParameter {
        operation: String,
        parameter: String,
    },

    /// The transport cannot carry the supplied parameters.
    #[error("Unsupported parameters for operation '{operation}': {message}")]
    UnsupportedParameters { operation: String, message: String },

    /// Authentication failed before the request was sent.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// HTTP client failure (connection, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Websocket connection or framing failure.
    #[error("Websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A CA bundle could not be loaded.
    #[error("Invalid certificate '{path}': {message}")]
    InvalidCertificate { path: String, message: String },

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The service answered with something this client cannot interpret.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },
}

impl ZaqarError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn unsupported_version(version: impl fmt::Display) -> Self {
        Self::UnsupportedVersion {
            version: version.to_string(),
        }
    }

    /// Fail unless `current` is at least `minimum`.
    pub fn require_version(current: ApiVersion, minimum: ApiVersion) -> Result<(), Self> {
        if current < minimum {
            return Err(Self::unsupported_version(format!(
                "{} (requires {} or later)",
                current.label(),
                minimum.label()
            )));
        }
        Ok(())
    }

    /// Status-classified server error, if this is one.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.transport().is_some_and(TransportError::is_not_found)
    }

    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// The client never retries on its own; this only classifies the failure.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::Auth(e) => e.is_transient(),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocket(_) => true,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ZaqarError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
