//! # zaqar-client
//!
//! Async client library for the Zaqar multi-tenant messaging service.
//!
//! The crate is layered:
//!
//! - [`api`] holds the per-version operation tables (URL template, method,
//!   parameters) used to build and validate requests.
//! - [`request`] and [`response`] describe a call independently of the wire.
//! - [`auth`] decorates requests for the selected backend (noauth, keystone,
//!   signed URLs).
//! - [`transport`] turns a request into an HTTP or websocket exchange and maps
//!   error statuses into [`TransportError`]s.
//! - [`core`] has one function per operation.
//! - [`Client`] and the resource types ([`Queue`], [`Message`], [`Claim`],
//!   [`Pool`], [`Flavor`], [`Subscription`]) form the high level API.
//!
//! # Examples
//!
//! ```no_run
//! use serde_json::{json, Map};
//! use zaqar_client::{ApiVersion, ClaimOptions, Client, ClientConfig};
//!
//! # async fn example() -> Result<(), zaqar_client::ZaqarError> {
//! let client = Client::new("http://localhost:8888", ApiVersion::V2, ClientConfig::default());
//! let queue = client.queue("jobs").await?;
//! queue.post(json!([{ "body": { "task": "resize" }, "ttl": 300 }])).await?;
//!
//! let claim = queue
//!     .claim(ClaimOptions { ttl: Some(60), grace: Some(30), limit: Some(10) })
//!     .await?;
//! let mut messages = claim.messages();
//! while let Some(message) = messages.next().await? {
//!     println!("{}", message.body());
//!     message.delete().await?;
//! }
//!
//! let mut queues = client.queues(Map::new()).await?;
//! while let Some(queue) = queues.next().await? {
//!     println!("{}", queue.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod claim;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod flavor;
pub mod iterator;
pub mod message;
pub mod pool;
pub mod queue;
pub mod request;
pub mod response;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use api::{ApiSchema, ApiVersion, Operation, ParamType};
pub use auth::{AuthBackend, IdentitySession, KeystoneAuth, NoAuth, SignedUrlAuth};
pub use claim::{Claim, ClaimOptions};
pub use client::{Client, ClientBuilder};
pub use config::{AuthBackendKind, AuthOptions, AuthSettings, ClientConfig};
pub use error::{AuthError, TransportError, TransportErrorKind, ZaqarError};
pub use flavor::{Flavor, FlavorSpec};
pub use iterator::ResourceIter;
pub use message::Message;
pub use pool::{Pool, PoolSpec};
pub use queue::{Queue, SignedUrl, SignedUrlOptions};
pub use request::{prepare_request, prepare_request_with, Request, NOAUTH_PROJECT_ID};
pub use response::Response;
pub use subscription::{Subscription, SubscriptionSpec};
pub use transport::{get_transport, get_transport_for, HttpTransport, Transport, WebsocketTransport};
