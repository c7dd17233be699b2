//! Lazy iteration over paginated listings.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::error::ZaqarError;

type ItemBuilder<T> = Arc<dyn Fn(&Client, Value) -> Result<T, ZaqarError> + Send + Sync>;

/// Yields the items of a listing, one page at a time.
///
/// A listing is either a JSON object carrying `links` and the item array
/// under a resource key (`queues`, `messages`, ...), or a bare array. With
/// streaming enabled (off by default), the `next` link is followed once the current page is
/// exhausted; a follow that returns no content or an empty page ends
/// iteration.
pub struct ResourceIter<T> {
    client: Client,
    key: &'static str,
    items: VecDeque<Value>,
    links: Vec<Value>,
    stream: bool,
    build: ItemBuilder<T>,
}

impl<T> ResourceIter<T> {
    pub(crate) fn new<F>(client: Client, listing: Option<Value>, key: &'static str, build: F) -> Self
    where
        F: Fn(&Client, Value) -> Result<T, ZaqarError> + Send + Sync + 'static,
    {
        let mut iter = Self {
            client,
            key,
            items: VecDeque::new(),
            links: Vec::new(),
            stream: false,
            build: Arc::new(build),
        };
        if let Some(listing) = listing {
            iter.load(listing);
        }
        iter
    }

    fn load(&mut self, listing: Value) {
        match listing {
            Value::Array(items) => {
                self.items = items.into();
                self.links.clear();
            }
            Value::Object(mut page) => {
                self.links = match page.remove("links") {
                    Some(Value::Array(links)) => links,
                    _ => Vec::new(),
                };
                self.items = match page.remove(self.key) {
                    Some(Value::Array(items)) => items.into(),
                    _ => VecDeque::new(),
                };
            }
            _ => {
                self.items.clear();
                self.links.clear();
            }
        }
    }

    /// Enable or disable following `next` links. Disabled by default.
    pub fn stream(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    /// Items of the current page not yet yielded.
    pub fn buffered(&self) -> usize {
        self.items.len()
    }

    /// The `next` link of the current page, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))
            .and_then(|link| link.get("href"))
            .and_then(Value::as_str)
    }

    pub async fn next(&mut self) -> Result<Option<T>, ZaqarError> {
        if self.items.is_empty() && !self.next_page().await? {
            return Ok(None);
        }
        match self.items.pop_front() {
            Some(item) => (self.build)(&self.client, item).map(Some),
            None => Ok(None),
        }
    }

    async fn next_page(&mut self) -> Result<bool, ZaqarError> {
        if !self.stream {
            return Ok(false);
        }
        let Some(href) = self.next_link().map(str::to_string) else {
            return Ok(false);
        };

        debug!(key = self.key, href = %href, "Following next page");
        match self.client.follow(&href).await? {
            Some(page) => {
                self.load(page);
                Ok(!self.items.is_empty())
            }
            None => {
                self.links.clear();
                Ok(false)
            }
        }
    }

    /// Drain the iterator, following pages as configured.
    pub async fn try_collect(mut self) -> Result<Vec<T>, ZaqarError> {
        let mut out = Vec::with_capacity(self.items.len());
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }
}

impl<T: Send + 'static> ResourceIter<T> {
    pub fn into_stream(self) -> impl Stream<Item = Result<T, ZaqarError>> + Send {
        stream::try_unfold(self, |mut iter| async move {
            let item = iter.next().await?;
            Ok::<_, ZaqarError>(item.map(|item| (item, iter)))
        })
    }
}

impl<T> Clone for ResourceIter<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            key: self.key,
            items: self.items.clone(),
            links: self.links.clone(),
            stream: self.stream,
            build: Arc::clone(&self.build),
        }
    }
}

impl<T> fmt::Debug for ResourceIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceIter")
            .field("key", &self.key)
            .field("buffered", &self.items.len())
            .field("next", &self.next_link())
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
#[path = "iterator_tests.rs"]
mod tests;
