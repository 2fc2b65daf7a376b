//! In-memory queue service for testing and development.
//!
//! This module provides a fully functional in-process queue service that:
//! - Hides received messages for a visibility timeout and redelivers them
//!   when the timeout elapses without a delete
//! - Long polls: an empty receive waits for a send, up to the requested wait
//! - Keeps FIFO queues ordered per message group, delivering one group's
//!   messages only while none of that group is in flight
//! - Drops FIFO duplicates inside the deduplication window
//!
//! All time is measured with `tokio::time::Instant`, so tests running on a
//! paused clock see deterministic timeouts.

use crate::config::InMemoryConfig;
use crate::error::{QueueError, ValidationError};
use crate::message::{
    MessageAttributes, MessageId, OutboundMessage, QueueName, ReceiptHandle, ReceiveOptions,
    ReceivedMessage, Timestamp,
};
use crate::queue::QueueAttributes;
use crate::service::{QueueService, ServiceKind, ServiceLimits};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Prefix of the URLs handed out for in-memory queues
const URL_PREFIX: &str = "memory://queues/";

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage for all queues
#[derive(Default)]
struct QueueStorage {
    urls: HashMap<QueueName, String>,
    queues: HashMap<String, InMemoryQueue>,
}

impl QueueStorage {
    fn queue_mut(&mut self, queue_url: &str) -> Result<&mut InMemoryQueue, QueueError> {
        self.queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: queue_url.to_string(),
            })
    }
}

/// Internal state for a single queue
struct InMemoryQueue {
    attributes: QueueAttributes,
    /// Visible and delayed messages in send order
    messages: VecDeque<StoredMessage>,
    /// Received messages keyed by receipt token
    in_flight: HashMap<String, InFlightMessage>,
    /// Receipt tokens that can no longer be used, and when they stopped
    retired: HashMap<String, (RetiredReceipt, Instant)>,
    /// FIFO deduplication ids and when they were first seen
    deduplication: HashMap<String, (MessageId, Instant)>,
    next_sequence: u64,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    fn new(attributes: QueueAttributes) -> Self {
        Self {
            attributes,
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
            retired: HashMap::new(),
            deduplication: HashMap::new(),
            next_sequence: 0,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Put a message back in send order
    fn requeue(&mut self, message: StoredMessage) {
        let position = self
            .messages
            .partition_point(|m| m.sequence < message.sequence);
        self.messages.insert(position, message);
    }

    /// Return every in-flight message whose visibility timeout has elapsed
    fn expire_in_flight(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, m)| m.visible_until <= now)
            .map(|(token, _)| token.clone())
            .collect();

        for token in expired {
            if let Some(in_flight) = self.in_flight.remove(&token) {
                debug!(
                    message_id = %in_flight.message.message_id,
                    "Visibility timeout elapsed, message visible again"
                );
                self.retired.insert(token, (RetiredReceipt::Expired, now));
                self.requeue(in_flight.message);
            }
        }
    }

    /// Take up to `max` deliverable messages and mark them in flight
    fn take(
        &mut self,
        queue_url: &str,
        max: usize,
        visibility: Duration,
        now: Instant,
    ) -> Vec<ReceivedMessage> {
        self.expire_in_flight(now);

        let fifo = self.attributes.is_fifo();
        let blocked_groups: HashSet<String> = if fifo {
            self.in_flight
                .values()
                .filter_map(|m| m.message.group_id.clone())
                .collect()
        } else {
            HashSet::new()
        };

        let mut selected = Vec::new();
        for (index, message) in self.messages.iter().enumerate() {
            if selected.len() >= max {
                break;
            }
            if message.available_at > now {
                continue;
            }
            if fifo
                && message
                    .group_id
                    .as_ref()
                    .is_some_and(|g| blocked_groups.contains(g))
            {
                continue;
            }
            selected.push(index);
        }

        let visible_until = now + visibility;
        let mut batch = Vec::with_capacity(selected.len());

        // Remove from the back so earlier indices stay valid
        for index in selected.into_iter().rev() {
            let Some(mut message) = self.messages.remove(index) else {
                continue;
            };
            message.receive_count += 1;

            let token = uuid::Uuid::new_v4().to_string();
            let receipt = ReceiptHandle::new(
                token.clone(),
                queue_url.to_string(),
                message.message_id.clone(),
                Some(visible_until),
            );

            batch.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                group_id: message.group_id.clone(),
                receive_count: message.receive_count,
                received_at: Timestamp::now(),
                receipt_handle: receipt,
            });

            self.in_flight.insert(
                token,
                InFlightMessage {
                    message,
                    visible_until,
                },
            );
        }

        batch.reverse();
        batch
    }

    /// Earliest instant at which a receive could find something new
    fn next_change(&self, now: Instant) -> Option<Instant> {
        let next_visible = self.in_flight.values().map(|m| m.visible_until).min();
        let next_available = self
            .messages
            .iter()
            .map(|m| m.available_at)
            .filter(|at| *at > now)
            .min();

        match (next_visible, next_available) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn prune_deduplication(&mut self, window: Duration, now: Instant) {
        self.deduplication
            .retain(|_, (_, seen_at)| now.saturating_duration_since(*seen_at) < window);
    }

    fn prune_retired(&mut self, retention: Duration, now: Instant) {
        self.retired
            .retain(|_, (_, retired_at)| now.saturating_duration_since(*retired_at) < retention);
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    sequence: u64,
    message_id: MessageId,
    body: String,
    attributes: MessageAttributes,
    group_id: Option<String>,
    receive_count: u32,
    available_at: Instant,
}

/// A message currently hidden from other consumers
struct InFlightMessage {
    message: StoredMessage,
    visible_until: Instant,
}

/// Why a receipt token stopped being valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetiredReceipt {
    Deleted,
    Expired,
}

/// Outcome of one attempt to take messages
enum Attempt {
    Ready(Vec<ReceivedMessage>),
    WaitUntil(Instant),
}

// ============================================================================
// InMemoryQueueService
// ============================================================================

/// In-process queue service
pub struct InMemoryQueueService {
    config: InMemoryConfig,
    storage: Arc<Mutex<QueueStorage>>,
}

impl InMemoryQueueService {
    /// Create an empty service with the given configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            config,
            storage: Arc::new(Mutex::new(QueueStorage::default())),
        }
    }

    /// Number of messages in a queue that are neither in flight nor deleted
    pub fn pending_count(&self, queue_url: &str) -> Option<usize> {
        let storage = self.lock();
        storage.queues.get(queue_url).map(|q| q.messages.len())
    }

    /// Number of messages in a queue that are currently in flight
    pub fn in_flight_count(&self, queue_url: &str) -> Option<usize> {
        let storage = self.lock();
        storage.queues.get(queue_url).map(|q| q.in_flight.len())
    }

    fn lock(&self) -> MutexGuard<'_, QueueStorage> {
        self.storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notifier(&self, queue_url: &str) -> Result<Arc<Notify>, QueueError> {
        let mut storage = self.lock();
        Ok(Arc::clone(&storage.queue_mut(queue_url)?.notify))
    }

    fn attempt(
        &self,
        queue_url: &str,
        options: &ReceiveOptions,
        deadline: Instant,
    ) -> Result<Attempt, QueueError> {
        let mut storage = self.lock();
        let queue = storage.queue_mut(queue_url)?;
        let now = Instant::now();

        let visibility = options.visibility_timeout.unwrap_or_else(|| {
            queue
                .attributes
                .visibility_timeout_value()
                .unwrap_or_else(|| self.config.default_visibility_timeout())
        });

        queue.prune_retired(self.config.receipt_retention(), now);
        let batch = queue.take(queue_url, options.max_messages as usize, visibility, now);
        if !batch.is_empty() || now >= deadline {
            return Ok(Attempt::Ready(batch));
        }

        let wake_at = queue
            .next_change(now)
            .map_or(deadline, |at| at.min(deadline));
        Ok(Attempt::WaitUntil(wake_at))
    }

    fn deduplication_id(
        queue: &InMemoryQueue,
        message: &OutboundMessage,
    ) -> Result<String, QueueError> {
        if let Some(id) = &message.deduplication_id {
            return Ok(id.clone());
        }

        if queue.attributes.has_content_based_deduplication() {
            return Ok(hex::encode(Sha256::digest(message.body.as_bytes())));
        }

        Err(ValidationError::Required {
            field: "deduplication_id".to_string(),
        }
        .into())
    }
}

impl Default for InMemoryQueueService {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

fn queue_url_for(name: &QueueName) -> String {
    format!("{}{}", URL_PREFIX, name)
}

fn validate_queue_attributes(
    name: &QueueName,
    attributes: &QueueAttributes,
) -> Result<(), ValidationError> {
    if name.is_fifo() != attributes.is_fifo() {
        return Err(ValidationError::InvalidFormat {
            field: QueueAttributes::FIFO_QUEUE.to_string(),
            message: "FIFO queues must have a name ending in .fifo and FifoQueue=true".to_string(),
        });
    }

    for key in [
        QueueAttributes::VISIBILITY_TIMEOUT,
        QueueAttributes::MAXIMUM_MESSAGE_SIZE,
        QueueAttributes::DELAY_SECONDS,
        QueueAttributes::MESSAGE_RETENTION_PERIOD,
        QueueAttributes::RECEIVE_WAIT_TIME_SECONDS,
    ] {
        if let Some(value) = attributes.get(key) {
            if value.parse::<u64>().is_err() {
                return Err(ValidationError::InvalidFormat {
                    field: key.to_string(),
                    message: format!("'{}' is not a non-negative integer", value),
                });
            }
        }
    }

    Ok(())
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn get_queue_url(&self, name: &QueueName) -> Result<String, QueueError> {
        let storage = self.lock();
        storage
            .urls
            .get(name)
            .cloned()
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: name.to_string(),
            })
    }

    async fn create_queue(
        &self,
        name: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<String, QueueError> {
        validate_queue_attributes(name, attributes)?;

        let mut storage = self.lock();
        if let Some(url) = storage.urls.get(name).cloned() {
            let existing = storage.queue_mut(&url)?;
            if existing.attributes != *attributes {
                return Err(QueueError::QueueConflict {
                    queue_name: name.to_string(),
                    message: "requested attributes differ from the existing queue".to_string(),
                });
            }
            return Ok(url);
        }

        let url = queue_url_for(name);
        storage.urls.insert(name.clone(), url.clone());
        storage
            .queues
            .insert(url.clone(), InMemoryQueue::new(attributes.clone()));

        debug!(queue = %name, url = %url, "Created in-memory queue");
        Ok(url)
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError> {
        let mut storage = self.lock();
        let queue = storage
            .queues
            .remove(queue_url)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: queue_url.to_string(),
            })?;
        storage.urls.retain(|_, url| url != queue_url);

        // Wake long polls so they see the queue is gone
        queue.notify.notify_waiters();
        Ok(())
    }

    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutboundMessage,
    ) -> Result<MessageId, QueueError> {
        let mut storage = self.lock();
        let queue = storage.queue_mut(queue_url)?;
        let now = Instant::now();

        let max_size = queue
            .attributes
            .maximum_message_size_value()
            .unwrap_or(self.config.max_message_bytes);
        let size = message.wire_size();
        if size > max_size {
            return Err(QueueError::PayloadTooLarge { size, max_size });
        }

        if queue.attributes.is_fifo() {
            if message.group_id.is_none() {
                return Err(ValidationError::Required {
                    field: "group_id".to_string(),
                }
                .into());
            }

            let dedup_id = Self::deduplication_id(queue, message)?;
            queue.prune_deduplication(self.config.deduplication_window(), now);
            if let Some((message_id, _)) = queue.deduplication.get(&dedup_id) {
                debug!(message_id = %message_id, "Dropped duplicate message");
                return Ok(message_id.clone());
            }

            let message_id = MessageId::new();
            queue
                .deduplication
                .insert(dedup_id, (message_id.clone(), now));
            return Ok(enqueue(queue, message_id, message, now));
        }

        Ok(enqueue(queue, MessageId::new(), message, now))
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        options.validate()?;
        let deadline = Instant::now() + options.wait;

        loop {
            // Register interest before looking, so a send between the look
            // and the wait is not missed
            let notify = self.notifier(queue_url)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.attempt(queue_url, options, deadline)? {
                Attempt::Ready(batch) => return Ok(batch),
                Attempt::WaitUntil(wake_at) => {
                    let _ = tokio::time::timeout_at(wake_at, notified).await;
                }
            }
        }
    }

    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let mut storage = self.lock();
        let queue = storage.queue_mut(receipt.queue_url())?;
        let now = Instant::now();
        queue.prune_retired(self.config.receipt_retention(), now);

        if let Some(in_flight) = queue.in_flight.remove(receipt.token()) {
            if in_flight.visible_until <= now {
                queue
                    .retired
                    .insert(receipt.token().to_string(), (RetiredReceipt::Expired, now));
                queue.requeue(in_flight.message);
                return Err(QueueError::ReceiptExpired {
                    message_id: receipt.message_id().to_string(),
                });
            }

            queue
                .retired
                .insert(receipt.token().to_string(), (RetiredReceipt::Deleted, now));
            debug!(message_id = %receipt.message_id(), "Deleted in-memory message");

            // A FIFO group may have become deliverable
            queue.notify.notify_waiters();
            return Ok(());
        }

        Err(retired_receipt_error(queue, receipt))
    }

    async fn change_visibility(
        &self,
        receipt: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        let mut storage = self.lock();
        let queue = storage.queue_mut(receipt.queue_url())?;
        let now = Instant::now();

        let Some(in_flight) = queue.in_flight.get_mut(receipt.token()) else {
            return Err(retired_receipt_error(queue, receipt));
        };

        if in_flight.visible_until <= now {
            queue.expire_in_flight(now);
            return Err(QueueError::ReceiptExpired {
                message_id: receipt.message_id().to_string(),
            });
        }

        in_flight.visible_until = now + timeout;
        if timeout.is_zero() {
            queue.expire_in_flight(now);
            queue.notify.notify_waiters();
        }

        Ok(())
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::InMemory
    }

    fn limits(&self) -> ServiceLimits {
        ServiceLimits {
            max_message_bytes: self.config.max_message_bytes,
            ..ServiceLimits::default()
        }
    }
}

fn enqueue(
    queue: &mut InMemoryQueue,
    message_id: MessageId,
    message: &OutboundMessage,
    now: Instant,
) -> MessageId {
    let delay = message
        .delay
        .or_else(|| queue.attributes.delay_value())
        .unwrap_or(Duration::ZERO);

    let sequence = queue.next_sequence;
    queue.next_sequence += 1;

    queue.messages.push_back(StoredMessage {
        sequence,
        message_id: message_id.clone(),
        body: message.body.clone(),
        attributes: message.attributes.clone(),
        group_id: message.group_id.clone(),
        receive_count: 0,
        available_at: now + delay,
    });

    debug!(message_id = %message_id, delay_ms = delay.as_millis() as u64, "Enqueued in-memory message");
    queue.notify.notify_waiters();
    message_id
}

fn retired_receipt_error(queue: &InMemoryQueue, receipt: &ReceiptHandle) -> QueueError {
    let message_id = receipt.message_id().to_string();
    // Unknown tokens, including ones past the retention window, are treated
    // the way SQS treats an invalid receipt handle
    match queue.retired.get(receipt.token()) {
        Some((RetiredReceipt::Deleted, _)) => QueueError::AlreadyAcknowledged { message_id },
        Some((RetiredReceipt::Expired, _)) | None => QueueError::ReceiptExpired { message_id },
    }
}
