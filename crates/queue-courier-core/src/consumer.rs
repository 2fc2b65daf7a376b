//! Message consumer: long-poll receive and explicit acknowledgement.
//!
//! Delivery is at-least-once. A message that is received but not
//! acknowledged before its visibility timeout elapses becomes receivable
//! again, possibly by another consumer, so processing must be idempotent.
//! Ordering is only guaranteed on FIFO queues, within one message group.

use crate::error::{QueueError, ValidationError};
use crate::message::{MessageId, ReceiveOptions, ReceivedMessage};
use crate::observer::{Operation, QueueObserver};
use crate::queue::QueueHandle;
use crate::service::QueueService;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// When received messages are deleted from the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// The caller acknowledges each message after processing it.
    ///
    /// A consumer crash before acknowledgement leads to redelivery, never loss.
    #[default]
    Manual,

    /// Messages are deleted as soon as they are received, before the caller
    /// processes them.
    ///
    /// This is at-most-once delivery: a consumer that crashes while
    /// processing loses the message.
    AutoAcknowledge,
}

/// Messages from one receive, with the automatic acknowledgements that failed
#[derive(Debug, Default)]
pub struct ReceivedBatch {
    pub messages: Vec<ReceivedMessage>,
    /// Messages listed here are still in `messages`, unacknowledged
    pub acknowledge_failures: Vec<(MessageId, QueueError)>,
}

/// Receives and acknowledges messages from resolved queues
pub struct Consumer {
    service: Arc<dyn QueueService>,
    observer: Arc<dyn QueueObserver>,
    ack_mode: AckMode,
}

impl Consumer {
    /// Create a consumer with manual acknowledgement
    pub fn new(service: Arc<dyn QueueService>, observer: Arc<dyn QueueObserver>) -> Self {
        Self {
            service,
            observer,
            ack_mode: AckMode::Manual,
        }
    }

    /// Set the acknowledgement mode
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    /// Get the acknowledgement mode
    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    /// Receive a batch of messages
    ///
    /// With a non-zero `options.wait` and an empty queue the call waits up to
    /// that long for a message before returning an empty batch. It returns as
    /// soon as at least one message is available.
    ///
    /// In [`AckMode::AutoAcknowledge`] every message is deleted before the
    /// batch is returned. A message whose deletion failed is still returned,
    /// with [`ReceivedMessage::is_acknowledged`] false, and will be redelivered
    /// unless acknowledged. Use [`Consumer::receive_batch`] to get the
    /// failures themselves.
    pub async fn receive(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        Ok(self.receive_batch(handle, options).await?.messages)
    }

    /// Receive a batch, keeping any automatic acknowledgement failures
    pub async fn receive_batch(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
    ) -> Result<ReceivedBatch, QueueError> {
        let messages = self.fetch(handle, options).await?;
        Ok(self.auto_acknowledge(messages).await)
    }

    /// Receive a batch unless `shutdown` completes first
    ///
    /// When `shutdown` wins the pending request is dropped and an empty batch
    /// is returned. Nothing is acknowledged in that case; any message the
    /// service handed to the abandoned request becomes visible again when its
    /// visibility timeout elapses.
    pub async fn receive_until<F>(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
        shutdown: F,
    ) -> Result<Vec<ReceivedMessage>, QueueError>
    where
        F: Future<Output = ()>,
    {
        Ok(self
            .receive_batch_until(handle, options, shutdown)
            .await?
            .messages)
    }

    /// [`Consumer::receive_until`], keeping any automatic acknowledgement failures
    pub async fn receive_batch_until<F>(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
        shutdown: F,
    ) -> Result<ReceivedBatch, QueueError>
    where
        F: Future<Output = ()>,
    {
        let messages = tokio::select! {
            biased;
            _ = shutdown => {
                debug!(queue = %handle.name(), "Receive cancelled by shutdown");
                return Ok(ReceivedBatch::default());
            }
            result = self.fetch(handle, options) => result?,
        };

        Ok(self.auto_acknowledge(messages).await)
    }

    /// Delete a processed message from the queue
    ///
    /// # Errors
    ///
    /// - [`QueueError::AlreadyAcknowledged`] if this delivery was acknowledged before
    /// - [`QueueError::ReceiptExpired`] if the visibility timeout has elapsed and
    ///   the message may already have been redelivered
    pub async fn acknowledge(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let receipt = &message.receipt_handle;

        if !receipt.claim_acknowledgement() {
            return Err(self.fail(
                Operation::Acknowledge,
                message,
                QueueError::AlreadyAcknowledged {
                    message_id: message.message_id.to_string(),
                },
            ));
        }

        if receipt.is_expired() {
            receipt.revert_acknowledgement();
            return Err(self.fail(
                Operation::Acknowledge,
                message,
                QueueError::ReceiptExpired {
                    message_id: message.message_id.to_string(),
                },
            ));
        }

        match self.service.delete_message(receipt).await {
            Ok(()) => {
                self.observer.message_acknowledged(message);
                Ok(())
            }
            Err(e) => {
                if !matches!(e, QueueError::AlreadyAcknowledged { .. }) {
                    receipt.revert_acknowledgement();
                }
                Err(self.fail(Operation::Acknowledge, message, e))
            }
        }
    }

    /// Make a message visible again immediately, for another attempt
    ///
    /// The receipt cannot be used afterwards.
    pub async fn release(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.check_usable(Operation::Release, message)?;

        if let Err(e) = self
            .service
            .change_visibility(&message.receipt_handle, Duration::ZERO)
            .await
        {
            return Err(self.fail(Operation::Release, message, e));
        }

        message.receipt_handle.set_visible_until(Some(Instant::now()));
        self.observer.message_released(message);
        Ok(())
    }

    /// Keep a message hidden for `timeout` from now
    pub async fn extend_visibility(
        &self,
        message: &ReceivedMessage,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        if timeout > ReceiveOptions::MAX_VISIBILITY_TIMEOUT {
            return Err(self.fail(
                Operation::ExtendVisibility,
                message,
                ValidationError::OutOfRange {
                    field: "visibility_timeout".to_string(),
                    message: "must be at most 12 hours".to_string(),
                }
                .into(),
            ));
        }

        self.check_usable(Operation::ExtendVisibility, message)?;

        if let Err(e) = self
            .service
            .change_visibility(&message.receipt_handle, timeout)
            .await
        {
            return Err(self.fail(Operation::ExtendVisibility, message, e));
        }

        message
            .receipt_handle
            .set_visible_until(Some(Instant::now() + timeout));
        Ok(())
    }

    async fn fetch(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        if let Err(e) = options.validate() {
            let e = QueueError::from(e);
            self.observer
                .operation_failed(Operation::Receive, handle.name().as_str(), &e);
            return Err(e);
        }

        match self.service.receive_messages(handle.url(), options).await {
            Ok(messages) => {
                self.observer.messages_received(handle, &messages);
                Ok(messages)
            }
            Err(e) => {
                self.observer
                    .operation_failed(Operation::Receive, handle.name().as_str(), &e);
                Err(e)
            }
        }
    }

    async fn auto_acknowledge(&self, messages: Vec<ReceivedMessage>) -> ReceivedBatch {
        let mut acknowledge_failures = Vec::new();

        if self.ack_mode == AckMode::AutoAcknowledge {
            for message in &messages {
                if let Err(e) = self.acknowledge(message).await {
                    acknowledge_failures.push((message.message_id.clone(), e));
                }
            }
        }

        ReceivedBatch {
            messages,
            acknowledge_failures,
        }
    }

    fn check_usable(
        &self,
        operation: Operation,
        message: &ReceivedMessage,
    ) -> Result<(), QueueError> {
        if message.receipt_handle.is_acknowledged() {
            return Err(self.fail(
                operation,
                message,
                QueueError::AlreadyAcknowledged {
                    message_id: message.message_id.to_string(),
                },
            ));
        }

        if message.receipt_handle.is_expired() {
            return Err(self.fail(
                operation,
                message,
                QueueError::ReceiptExpired {
                    message_id: message.message_id.to_string(),
                },
            ));
        }

        Ok(())
    }

    fn fail(&self, operation: Operation, message: &ReceivedMessage, error: QueueError) -> QueueError {
        self.observer
            .operation_failed(operation, message.message_id.as_str(), &error);
        error
    }
}
