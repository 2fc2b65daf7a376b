//! Client protocol to the external queue service.
//!
//! [`QueueService`] is the seam between this crate and the service that
//! actually stores messages. Everything durable (visibility timeouts,
//! redelivery, deletion) happens behind it; the producer, consumer and
//! resolver only marshal requests and surface results.

use crate::error::QueueError;
use crate::message::{MessageId, OutboundMessage, QueueName, ReceiptHandle, ReceiveOptions, ReceivedMessage};
use crate::queue::QueueAttributes;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kinds of queue service this crate can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    /// SQS-compatible query protocol over HTTP(S)
    Sqs,
    /// In-process fake used for tests and local development
    InMemory,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqs => write!(f, "sqs"),
            Self::InMemory => write!(f, "in-memory"),
        }
    }
}

/// Limits enforced locally before a request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    /// Maximum message size (body plus attributes) in bytes
    pub max_message_bytes: usize,
    /// Maximum number of attributes per message
    pub max_attributes: usize,
    /// Maximum per-message delivery delay
    pub max_delay: Duration,
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: 256 * 1024,
            max_attributes: 10,
            max_delay: Duration::from_secs(15 * 60),
        }
    }
}

/// Operations the external queue service provides
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Look up the URL of an existing queue
    async fn get_queue_url(&self, name: &QueueName) -> Result<String, QueueError>;

    /// Create a queue, or return the existing one if its attributes match
    async fn create_queue(
        &self,
        name: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<String, QueueError>;

    /// Delete a queue and all its messages
    async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError>;

    /// Enqueue one message
    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutboundMessage,
    ) -> Result<MessageId, QueueError>;

    /// Receive up to `options.max_messages`, long polling for `options.wait`
    async fn receive_messages(
        &self,
        queue_url: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Delete a received message
    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;

    /// Change how long a received message stays hidden
    async fn change_visibility(
        &self,
        receipt: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError>;

    /// Get service kind
    fn kind(&self) -> ServiceKind;

    /// Get limits to validate against before sending
    fn limits(&self) -> ServiceLimits;
}
