//! Queue handles, queue attributes and the name-to-handle resolver.

use crate::error::QueueError;
use crate::message::QueueName;
use crate::observer::{Operation, QueueObserver};
use crate::service::QueueService;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

// ============================================================================
// Queue Handle
// ============================================================================

/// Resolved, connection-scoped reference to a queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueHandle {
    name: QueueName,
    url: String,
    is_fifo: bool,
}

impl QueueHandle {
    /// Create a handle for a queue at the given URL
    pub fn new(name: QueueName, url: String) -> Self {
        let is_fifo = name.is_fifo();
        Self { name, url, is_fifo }
    }

    /// Queue name
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Queue URL used to address the queue on the service
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the queue preserves send order within message groups
    pub fn is_fifo(&self) -> bool {
        self.is_fifo
    }
}

impl std::fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

// ============================================================================
// Queue Attributes
// ============================================================================

/// Named queue attributes passed verbatim to the service on creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueAttributes(BTreeMap<String, String>);

impl QueueAttributes {
    pub const FIFO_QUEUE: &'static str = "FifoQueue";
    pub const VISIBILITY_TIMEOUT: &'static str = "VisibilityTimeout";
    pub const MAXIMUM_MESSAGE_SIZE: &'static str = "MaximumMessageSize";
    pub const DELAY_SECONDS: &'static str = "DelaySeconds";
    pub const MESSAGE_RETENTION_PERIOD: &'static str = "MessageRetentionPeriod";
    pub const RECEIVE_WAIT_TIME_SECONDS: &'static str = "ReceiveMessageWaitTimeSeconds";
    pub const CONTENT_BASED_DEDUPLICATION: &'static str = "ContentBasedDeduplication";

    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary attribute
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Mark the queue as FIFO
    pub fn fifo(self) -> Self {
        self.with(Self::FIFO_QUEUE, "true")
    }

    /// Set the default visibility timeout
    pub fn visibility_timeout(self, timeout: Duration) -> Self {
        self.with(Self::VISIBILITY_TIMEOUT, timeout.as_secs().to_string())
    }

    /// Set the maximum message size in bytes
    pub fn maximum_message_size(self, bytes: usize) -> Self {
        self.with(Self::MAXIMUM_MESSAGE_SIZE, bytes.to_string())
    }

    /// Set the delivery delay applied to every message
    pub fn delay(self, delay: Duration) -> Self {
        self.with(Self::DELAY_SECONDS, delay.as_secs().to_string())
    }

    /// Set how long unconsumed messages are retained
    pub fn message_retention(self, period: Duration) -> Self {
        self.with(Self::MESSAGE_RETENTION_PERIOD, period.as_secs().to_string())
    }

    /// Set the default long-poll wait
    pub fn receive_wait_time(self, wait: Duration) -> Self {
        self.with(Self::RECEIVE_WAIT_TIME_SECONDS, wait.as_secs().to_string())
    }

    /// Enable deduplication by body hash on FIFO queues
    pub fn content_based_deduplication(self) -> Self {
        self.with(Self::CONTENT_BASED_DEDUPLICATION, "true")
    }

    /// Get a raw attribute value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate over attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the FifoQueue attribute is set to true
    pub fn is_fifo(&self) -> bool {
        self.flag(Self::FIFO_QUEUE)
    }

    /// Whether ContentBasedDeduplication is set to true
    pub fn has_content_based_deduplication(&self) -> bool {
        self.flag(Self::CONTENT_BASED_DEDUPLICATION)
    }

    /// Parsed VisibilityTimeout
    pub fn visibility_timeout_value(&self) -> Option<Duration> {
        self.seconds(Self::VISIBILITY_TIMEOUT)
    }

    /// Parsed DelaySeconds
    pub fn delay_value(&self) -> Option<Duration> {
        self.seconds(Self::DELAY_SECONDS)
    }

    /// Parsed MaximumMessageSize
    pub fn maximum_message_size_value(&self) -> Option<usize> {
        self.get(Self::MAXIMUM_MESSAGE_SIZE)?.parse().ok()
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    fn seconds(&self, key: &str) -> Option<Duration> {
        self.get(key)?.parse::<u64>().ok().map(Duration::from_secs)
    }
}

impl FromIterator<(String, String)> for QueueAttributes {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Queue Resolver
// ============================================================================

/// Resolves queue names to handles, memoizing successful lookups.
///
/// Cached handles are never invalidated automatically. A queue deleted
/// elsewhere surfaces as [`QueueError::QueueNotFound`] on later use; callers
/// can drop the stale entry with [`QueueResolver::forget`].
pub struct QueueResolver {
    service: Arc<dyn QueueService>,
    observer: Arc<dyn QueueObserver>,
    cache: RwLock<HashMap<QueueName, QueueHandle>>,
}

impl QueueResolver {
    /// Create a resolver over the given service
    pub fn new(service: Arc<dyn QueueService>, observer: Arc<dyn QueueObserver>) -> Self {
        Self {
            service,
            observer,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an existing queue by name
    ///
    /// # Errors
    ///
    /// - [`QueueError::QueueNotFound`] if no queue of that name exists
    /// - [`QueueError::ConnectionFailed`] if the service is unreachable
    pub async fn resolve(&self, name: &QueueName) -> Result<QueueHandle, QueueError> {
        if let Some(handle) = self.cached(name).await {
            return Ok(handle);
        }

        let url = match self.service.get_queue_url(name).await {
            Ok(url) => url,
            Err(e) => {
                self.observer
                    .operation_failed(Operation::Resolve, name.as_str(), &e);
                return Err(e);
            }
        };

        let handle = QueueHandle::new(name.clone(), url);
        self.remember(&handle).await;
        self.observer.queue_resolved(&handle);
        Ok(handle)
    }

    /// Create the queue if absent and return its handle
    ///
    /// Idempotent when the attributes match an existing queue.
    ///
    /// # Errors
    ///
    /// - [`QueueError::QueueConflict`] if the queue exists with different attributes
    /// - [`QueueError::ConnectionFailed`] if the service is unreachable
    pub async fn ensure(
        &self,
        name: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueHandle, QueueError> {
        let attributes = if name.is_fifo() && attributes.get(QueueAttributes::FIFO_QUEUE).is_none()
        {
            attributes.clone().fifo()
        } else {
            attributes.clone()
        };

        let url = match self.service.create_queue(name, &attributes).await {
            Ok(url) => url,
            Err(e) => {
                self.observer
                    .operation_failed(Operation::Ensure, name.as_str(), &e);
                return Err(e);
            }
        };

        let handle = QueueHandle::new(name.clone(), url);
        self.remember(&handle).await;
        self.observer.queue_created(&handle);
        Ok(handle)
    }

    /// Delete a queue and drop it from the cache
    pub async fn delete(&self, handle: &QueueHandle) -> Result<(), QueueError> {
        if let Err(e) = self.service.delete_queue(handle.url()).await {
            self.observer
                .operation_failed(Operation::DeleteQueue, handle.name().as_str(), &e);
            return Err(e);
        }

        self.forget(handle.name()).await;
        self.observer.queue_deleted(handle);
        Ok(())
    }

    /// Drop a cached handle so the next resolve asks the service again
    pub async fn forget(&self, name: &QueueName) -> Option<QueueHandle> {
        self.cache.write().await.remove(name)
    }

    /// Get a cached handle without contacting the service
    pub async fn cached(&self, name: &QueueName) -> Option<QueueHandle> {
        self.cache.read().await.get(name).cloned()
    }

    async fn remember(&self, handle: &QueueHandle) {
        debug!(queue = %handle.name(), url = %handle.url(), "Caching queue handle");
        self.cache
            .write()
            .await
            .insert(handle.name().clone(), handle.clone());
    }
}
