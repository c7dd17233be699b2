use async_trait::async_trait;

use super::AuthBackend;
use crate::api::ApiVersion;
use crate::config::AuthSettings;
use crate::error::{AuthError, ZaqarError};
use crate::request::Request;

/// Authenticates with a pre-signed URL.
///
/// The resulting requests only work against the queue paths and methods the
/// signature was issued for.
#[derive(Debug, Clone)]
pub struct SignedUrlAuth {
    settings: AuthSettings,
}

impl SignedUrlAuth {
    pub fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }
}

fn required<'a>(value: &'a Option<String>, option: &str) -> Result<&'a str, AuthError> {
    value.as_deref().ok_or_else(|| AuthError::MissingOption {
        option: option.to_string(),
    })
}

#[async_trait]
impl AuthBackend for SignedUrlAuth {
    async fn authenticate(
        &self,
        _api: Option<ApiVersion>,
        mut request: Request,
    ) -> Result<Request, ZaqarError> {
        let expires = required(&self.settings.expires, "expires")?;
        let signature = required(&self.settings.signature, "signature")?;

        request
            .headers
            .insert("URL-Expires".to_string(), expires.to_string());
        request
            .headers
            .insert("URL-Methods".to_string(), self.settings.methods.join(","));
        request
            .headers
            .insert("URL-Paths".to_string(), self.settings.paths.join(","));
        request
            .headers
            .insert("URL-Signature".to_string(), signature.to_string());
        Ok(request)
    }
}
