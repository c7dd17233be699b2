//! The entry point of the library.
//!
//! A [`Client`] knows the server URL, the API version and the auth settings.
//! Every operation asks it for a prepared request plus the transport to send
//! it through; resource façades ([`Queue`], [`Pool`], ...) are created from
//! its factory methods.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::ApiVersion;
use crate::auth::{self, AuthBackend, IdentitySession};
use crate::config::ClientConfig;
use crate::core;
use crate::error::{TransportErrorKind, ZaqarError};
use crate::flavor::{Flavor, FlavorSpec};
use crate::iterator::ResourceIter;
use crate::pool::{Pool, PoolSpec};
use crate::queue::Queue;
use crate::request::{prepare_request_with, Request};
use crate::subscription::{Subscription, SubscriptionSpec};
use crate::transport::{get_transport_for, Transport};

struct ClientInner {
    api_url: Option<String>,
    api_version: ApiVersion,
    config: ClientConfig,
    auth: Arc<dyn AuthBackend>,
    client_uuid: String,
    session: Option<Arc<IdentitySession>>,
    transport: OnceCell<Arc<dyn Transport>>,
}

/// Client for one Zaqar server and API version.
///
/// Cloning is cheap; clones share the auth backend and the transport.
///
/// # Examples
///
/// ```no_run
/// # use zaqar_client::{ApiVersion, Client, ClientConfig};
/// # async fn example() -> Result<(), zaqar_client::ZaqarError> {
/// let client = Client::new("http://localhost:8888", ApiVersion::V2, ClientConfig::default());
/// let queue = client.queue("jobs").await?;
/// queue.post(serde_json::json!({ "body": { "id": 0 }, "ttl": 360 })).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn new(url: impl Into<String>, version: ApiVersion, config: ClientConfig) -> Self {
        Self::builder().url(url).version(version).config(config).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The configured server URL; `None` when it comes from the service catalog.
    pub fn api_url(&self) -> Option<&str> {
        self.inner.api_url.as_deref()
    }

    pub fn api_version(&self) -> ApiVersion {
        self.inner.api_version
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Sent as `Client-ID` with every request.
    pub fn client_uuid(&self) -> &str {
        &self.inner.client_uuid
    }

    /// Build an authenticated request and resolve the transport for it.
    ///
    /// The transport is chosen from the request endpoint's scheme the first
    /// time and reused afterwards.
    pub async fn request_and_transport(&self) -> Result<(Request, Arc<dyn Transport>), ZaqarError> {
        let inner = &self.inner;
        let request = Request::new(inner.api_url.clone().unwrap_or_default(), Some(inner.api_version))
            .with_session(inner.session.clone());
        let mut request =
            prepare_request_with(inner.auth.as_ref(), &inner.config.auth_opts, None, request).await?;
        request
            .headers
            .insert("Client-ID".to_string(), inner.client_uuid.clone());

        if request.endpoint.is_empty() {
            return Err(ZaqarError::invalid_operation(
                "no messaging endpoint was configured or found in the service catalog",
            ));
        }

        let transport = inner
            .transport
            .get_or_try_init(|| async { get_transport_for(&request.endpoint, &inner.config) })
            .await?
            .clone();
        Ok((request, transport))
    }

    // ========================================================================
    // Queues
    // ========================================================================

    /// A queue handle, creating the queue on the server first.
    pub async fn queue(&self, name: impl Into<String>) -> Result<Queue, ZaqarError> {
        let queue = self.queue_ref(name);
        queue.ensure_exists().await?;
        Ok(queue)
    }

    /// A queue handle; nothing is sent.
    pub fn queue_ref(&self, name: impl Into<String>) -> Queue {
        Queue::new(self.clone(), name)
    }

    /// List queues, e.g. with `limit`, `marker` or `detailed`.
    pub async fn queues(&self, params: Map<String, Value>) -> Result<ResourceIter<Queue>, ZaqarError> {
        let (request, transport) = self.request_and_transport().await?;
        let listing = core::queue_list(transport.as_ref(), request, params).await?;
        Ok(ResourceIter::new(self.clone(), Some(listing), "queues", |client, value| {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ZaqarError::UnexpectedResponse {
                    message: "queue entry has no name".to_string(),
                })?;
            Ok(client.queue_ref(name))
        }))
    }

    /// Fetch a link returned by the server, e.g. the `next` page of a listing.
    pub async fn follow(&self, reference: &str) -> Result<Option<Value>, ZaqarError> {
        let (mut request, transport) = self.request_and_transport().await?;
        request.reference = Some(reference.to_string());
        Ok(transport.send(request).await?.into_deserialized())
    }

    // ========================================================================
    // Pools and Flavors
    // ========================================================================

    /// Create a pool and return its handle.
    pub async fn pool(&self, name: impl Into<String>, spec: PoolSpec) -> Result<Pool, ZaqarError> {
        let pool = Pool::with_spec(self.clone(), name, spec);
        pool.ensure_exists().await?;
        Ok(pool)
    }

    pub fn pool_ref(&self, name: impl Into<String>) -> Pool {
        Pool::new(self.clone(), name)
    }

    pub async fn pools(&self, params: Map<String, Value>) -> Result<ResourceIter<Pool>, ZaqarError> {
        let (request, transport) = self.request_and_transport().await?;
        let listing = core::pool_list(transport.as_ref(), request, params).await?;
        Ok(ResourceIter::new(self.clone(), Some(listing), "pools", |client, value| {
            Pool::from_value(client.clone(), value)
        }))
    }

    /// Create a flavor (or load it, on v1.1) and return its handle.
    pub async fn flavor(&self, name: impl Into<String>, spec: FlavorSpec) -> Result<Flavor, ZaqarError> {
        ZaqarError::require_version(self.api_version(), ApiVersion::V1_1)?;
        let mut flavor = Flavor::new(self.clone(), name, spec);
        flavor.ensure_exists().await?;
        Ok(flavor)
    }

    pub fn flavor_ref(&self, name: impl Into<String>) -> Flavor {
        Flavor::new(self.clone(), name, FlavorSpec::default())
    }

    pub async fn flavors(&self, params: Map<String, Value>) -> Result<ResourceIter<Flavor>, ZaqarError> {
        ZaqarError::require_version(self.api_version(), ApiVersion::V1_1)?;
        let (request, transport) = self.request_and_transport().await?;
        let listing = core::flavor_list(transport.as_ref(), request, params).await?;
        Ok(ResourceIter::new(self.clone(), Some(listing), "flavors", |client, value| {
            Flavor::from_value(client.clone(), value)
        }))
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Create (or load, when `spec.id` is set) a subscription on `queue_name`.
    pub async fn subscription(
        &self,
        queue_name: impl Into<String>,
        spec: SubscriptionSpec,
    ) -> Result<Subscription, ZaqarError> {
        ZaqarError::require_version(self.api_version(), ApiVersion::V2)?;
        let mut subscription = Subscription::new(self.clone(), queue_name, spec);
        subscription.ensure_exists().await?;
        Ok(subscription)
    }

    pub fn subscription_ref(&self, queue_name: impl Into<String>, id: impl Into<String>) -> Subscription {
        let spec = SubscriptionSpec {
            id: Some(id.into()),
            ..Default::default()
        };
        Subscription::new(self.clone(), queue_name, spec)
    }

    pub async fn subscriptions(
        &self,
        queue_name: &str,
        params: Map<String, Value>,
    ) -> Result<ResourceIter<Subscription>, ZaqarError> {
        ZaqarError::require_version(self.api_version(), ApiVersion::V2)?;
        let (request, transport) = self.request_and_transport().await?;
        let listing = core::subscription_list(transport.as_ref(), request, queue_name, params).await?;
        Ok(ResourceIter::new(
            self.clone(),
            Some(listing),
            "subscriptions",
            |client, value| Subscription::from_value(client.clone(), value),
        ))
    }

    // ========================================================================
    // Service
    // ========================================================================

    /// Check that the server answers. Any failure is `false`.
    pub async fn ping(&self) -> bool {
        let result = async {
            let (request, transport) = self.request_and_transport().await?;
            core::ping(transport.as_ref(), request).await
        }
        .await;
        match result {
            Ok(reachable) => reachable,
            Err(e) => {
                debug!(error = %e, "Ping failed");
                false
            }
        }
    }

    /// Detailed health report (v1.1+).
    pub async fn health(&self) -> Result<Option<Value>, ZaqarError> {
        ZaqarError::require_version(self.api_version(), ApiVersion::V1_1)?;
        let (request, transport) = self.request_and_transport().await?;
        core::health(transport.as_ref(), request).await
    }

    /// Whether the service reports itself available; 503 is `false`.
    pub async fn health_check(&self) -> Result<bool, ZaqarError> {
        let (request, transport) = self.request_and_transport().await?;
        match core::health(transport.as_ref(), request).await {
            Ok(_) => Ok(true),
            Err(ZaqarError::Transport(e)) if e.kind == TransportErrorKind::ServiceUnavailable => {
                warn!(error = %e, "Messaging service is unavailable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The API home document (v2).
    pub async fn homedoc(&self) -> Result<Option<Value>, ZaqarError> {
        ZaqarError::require_version(self.api_version(), ApiVersion::V2)?;
        let (request, transport) = self.request_and_transport().await?;
        core::homedoc(transport.as_ref(), request).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_url", &self.inner.api_url)
            .field("api_version", &self.inner.api_version)
            .field("client_uuid", &self.inner.client_uuid)
            .field("auth_backend", &self.inner.config.auth_opts.backend)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    url: Option<String>,
    version: Option<ApiVersion>,
    config: Option<ClientConfig>,
    session: Option<Arc<IdentitySession>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Server URL. Without one, the keystone backend looks it up in the catalog.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// API version; v2 when not set.
    pub fn version(mut self, version: ApiVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// An identity session to attach to every request.
    pub fn session(mut self, session: Arc<IdentitySession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Use this transport instead of picking one by URL scheme.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Client {
        let config = self.config.unwrap_or_default();
        let client_uuid = config
            .client_uuid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let auth = auth::get_backend(&config.auth_opts);
        let api_version = self.version.unwrap_or(ApiVersion::V2);

        debug!(
            url = ?self.url,
            version = %api_version,
            backend = %config.auth_opts.backend,
            "Creating messaging client"
        );

        Client {
            inner: Arc::new(ClientInner {
                api_url: self.url,
                api_version,
                config,
                auth,
                client_uuid,
                session: self.session,
                transport: OnceCell::new_with(self.transport),
            }),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
