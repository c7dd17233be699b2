//! In-memory transport used by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::ApiVersion;
use crate::client::Client;
use crate::error::{TransportError, ZaqarError};
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;

/// Records every request and answers with queued replies; 204 once they run out.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    replies: Mutex<VecDeque<Result<(u16, Option<Value>), u16>>>,
    requests: Mutex<Vec<Request>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: Option<Value>) -> &Self {
        self.replies.lock().unwrap().push_back(Ok((status, body)));
        self
    }

    pub fn fail(&self, status: u16) -> &Self {
        self.replies.lock().unwrap().push_back(Err(status));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Request {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request) -> Result<Response, ZaqarError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok((status, body))) => Ok(Response::new(
                request,
                body.map(|b| b.to_string()),
                Default::default(),
                Some(status),
            )),
            Some(Err(status)) => Err(TransportError::from_status(status, None, None, None)
                .expect("status is mapped")
                .into()),
            None => Ok(Response::new(request, None, Default::default(), Some(204))),
        }
    }
}

/// The request body parsed back into JSON.
pub(crate) fn body_of(request: &Request) -> Value {
    serde_json::from_str(request.content.as_deref().expect("request has a body"))
        .expect("body is JSON")
}

/// A client that sends through `transport`.
pub(crate) fn client_with(transport: &Arc<RecordingTransport>, version: ApiVersion) -> Client {
    Client::builder()
        .url("http://zaqar:8888")
        .version(version)
        .transport(transport.clone())
        .build()
}
