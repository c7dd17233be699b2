use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{build_http_client, error_for_status, param_to_string, Transport};
use crate::api::ApiVersion;
use crate::error::ZaqarError;
use crate::request::Request;
use crate::response::Response;

const JSON_CONTENT_TYPE: &str = "application/json";
const JSON_PATCH_CONTENT_TYPE: &str = "application/openstack-messaging-v2.0-json-patch";

/// HTTP clients keyed by TLS settings.
///
/// reqwest fixes certificate handling per client, so each distinct
/// `(verify, cert)` pair gets its own client, reused for later requests.
struct HttpSession {
    timeout: Duration,
    clients: Mutex<HashMap<(bool, Option<String>), reqwest::Client>>,
}

impl HttpSession {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self, verify: bool, cert: Option<&str>) -> Result<reqwest::Client, ZaqarError> {
        let key = (verify, cert.map(str::to_string));
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_http_client(verify, cert, self.timeout)?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

/// Sends requests over HTTP(S).
///
/// URLs are `<endpoint>/<version label>/<operation template>`, with template
/// placeholders filled from the request parameters. Parameters that are not
/// part of the path become the query string.
pub struct HttpTransport {
    session: HttpSession,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            session: HttpSession::new(timeout),
        }
    }

    /// Resolve the URL and method, consuming path parameters from the request.
    ///
    /// A request without an API version goes to its endpoint as-is with GET.
    pub fn prepare(&self, mut request: Request) -> Result<(String, Method, Request), ZaqarError> {
        let Some(schema) = request.api_schema() else {
            return Ok((request.endpoint.clone(), Method::GET, request));
        };

        let mut method = Method::GET;
        let mut template = request.reference.clone().unwrap_or_default();
        if !request.operation.is_empty() {
            let operation = schema.get_schema(&request.operation)?;
            method = operation.method.clone();
            if request.reference.is_none() {
                template = operation.reference.to_string();
            }
        }

        // Links returned by the server already carry the version prefix.
        let label = schema.label();
        let mut reference = template.trim_start_matches('/');
        if let Some(rest) = reference.strip_prefix(label) {
            if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                reference = rest.trim_start_matches('/');
            }
        }

        let path = fill_template(reference, &mut request)?;
        let url = format!("{}/{}/{}", request.endpoint.trim_end_matches('/'), label, path);
        Ok((url, method, request))
    }
}

/// Substitute `{name}` placeholders, removing the used parameters.
///
/// Values are percent-encoded as single path segments.
fn fill_template(template: &str, request: &mut Request) -> Result<String, ZaqarError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = request
            .params
            .remove(name)
            .ok_or_else(|| ZaqarError::MissingParameter {
                operation: request.operation.clone(),
                parameter: name.to_string(),
            })?;

        out.push_str(&rest[..start]);
        out.push_str(&encode_segment(&param_to_string(&value))?);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn encode_segment(value: &str) -> Result<String, ZaqarError> {
    let mut url = Url::parse("http://segment/")?;
    url.path_segments_mut()
        .map_err(|()| ZaqarError::invalid_operation("cannot encode path segment"))?
        .pop_if_empty()
        .push(value);
    Ok(url.path().trim_start_matches('/').to_string())
}

fn describe_error(body: &str) -> Option<(String, String)> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let title = parsed.get("title")?.as_str()?.to_string();
    let description = parsed.get("description")?.as_str()?.to_string();
    Some((title, description))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, ZaqarError> {
        let (url, method, request) = self.prepare(request)?;

        let content_type = if request.operation == "queue_update"
            && request.api.is_some_and(|v| v >= ApiVersion::V2)
        {
            JSON_PATCH_CONTENT_TYPE
        } else {
            JSON_CONTENT_TYPE
        };

        let query: Vec<(String, String)> = request
            .params
            .iter()
            .map(|(k, v)| (k.clone(), param_to_string(v)))
            .collect();

        let client = self.session.client(request.verify, request.cert.as_deref())?;
        let mut builder = client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, content_type);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(content) = &request.content {
            builder = builder.body(content.clone());
        }

        debug!(method = %method, url = %url, operation = %request.operation, "Sending HTTP request");
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let text = response.text().await?;
        debug!(status = status, url = %url, "Received HTTP response");

        if let Some(error) = error_for_status(status, Some(&text), describe_error) {
            warn!(status = status, url = %url, error = %error, "Zaqar returned an error");
            return Err(error.into());
        }

        Ok(Response::new(request, Some(text), headers, Some(status)))
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
