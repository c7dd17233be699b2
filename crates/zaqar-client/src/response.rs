//! Transport-agnostic response.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

use crate::request::Request;

/// What a transport hands back for a successful call.
#[derive(Debug)]
pub struct Response {
    pub request: Request,
    pub content: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub status_code: Option<u16>,
    deserialized: OnceLock<Option<Value>>,
}

impl Response {
    pub fn new(
        request: Request,
        content: Option<String>,
        headers: BTreeMap<String, String>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            request,
            content,
            headers,
            status_code,
            deserialized: OnceLock::new(),
        }
    }

    /// The content parsed as JSON.
    ///
    /// Parsed at most once. Empty content and content that is not JSON both
    /// yield `None`.
    pub fn deserialized_content(&self) -> Option<&Value> {
        self.deserialized
            .get_or_init(|| {
                let content = self.content.as_deref().filter(|c| !c.trim().is_empty())?;
                match serde_json::from_str(content) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(
                            operation = %self.request.operation,
                            error = %e,
                            "Response is not a JSON document"
                        );
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Take ownership of the parsed content.
    pub fn into_deserialized(self) -> Option<Value> {
        self.deserialized_content();
        self.deserialized.into_inner().flatten()
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
