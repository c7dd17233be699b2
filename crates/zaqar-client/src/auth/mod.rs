//! Authentication backends.
//!
//! A backend decorates a [`Request`] with whatever the server needs to accept
//! it: a token header, a catalog-resolved endpoint, or pre-signed URL headers.
//! Backends are selected by [`AuthBackendKind`] through a static registry.

mod keystone;
mod signed_url;

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::ApiVersion;
use crate::config::{AuthBackendKind, AuthOptions};
use crate::error::ZaqarError;
use crate::request::Request;

pub use keystone::{IdentitySession, KeystoneAuth};
pub use signed_url::SignedUrlAuth;

/// Prepares requests so the server will accept them.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Apply authentication to `request` and return it.
    async fn authenticate(
        &self,
        api: Option<ApiVersion>,
        request: Request,
    ) -> Result<Request, ZaqarError>;
}

/// Sends requests untouched.
#[derive(Debug, Clone, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthBackend for NoAuth {
    async fn authenticate(
        &self,
        _api: Option<ApiVersion>,
        request: Request,
    ) -> Result<Request, ZaqarError> {
        Ok(request)
    }
}

/// Build the backend selected by `auth_opts`.
///
/// The keystone backend falls back to `OS_*` environment variables for unset
/// settings.
pub fn get_backend(auth_opts: &AuthOptions) -> Arc<dyn AuthBackend> {
    match auth_opts.backend {
        AuthBackendKind::Noauth => Arc::new(NoAuth),
        AuthBackendKind::Keystone => Arc::new(KeystoneAuth::new(
            auth_opts.options.clone().with_env_defaults(),
        )),
        AuthBackendKind::SignedUrl => Arc::new(SignedUrlAuth::new(auth_opts.options.clone())),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
