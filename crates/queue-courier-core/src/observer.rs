//! Observation hooks for queue operations.
//!
//! Logging is not done inline by the producer, consumer or resolver. They
//! report to an injected [`QueueObserver`] and then return the result to the
//! caller. [`TracingObserver`] is the default and turns every notification
//! into a `tracing` event.

use crate::error::QueueError;
use crate::message::{MessageId, ReceivedMessage};
use crate::queue::QueueHandle;
use tracing::{debug, error, info, warn};

/// Operation that reported a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    Ensure,
    DeleteQueue,
    Send,
    Receive,
    Acknowledge,
    Release,
    ExtendVisibility,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Ensure => "ensure",
            Self::DeleteQueue => "delete_queue",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Acknowledge => "acknowledge",
            Self::Release => "release",
            Self::ExtendVisibility => "extend_visibility",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives notifications about queue operations.
///
/// All methods default to doing nothing so implementations only override
/// what they care about.
pub trait QueueObserver: Send + Sync {
    fn queue_resolved(&self, _handle: &QueueHandle) {}

    fn queue_created(&self, _handle: &QueueHandle) {}

    fn queue_deleted(&self, _handle: &QueueHandle) {}

    fn message_sent(&self, _handle: &QueueHandle, _message_id: &MessageId) {}

    fn messages_received(&self, _handle: &QueueHandle, _messages: &[ReceivedMessage]) {}

    fn message_acknowledged(&self, _message: &ReceivedMessage) {}

    fn message_released(&self, _message: &ReceivedMessage) {}

    /// Called before a failure is returned to the caller
    ///
    /// `target` names what the operation acted on: a queue name for queue
    /// operations, a message id for message operations.
    fn operation_failed(&self, _operation: Operation, _target: &str, _error: &QueueError) {}
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl QueueObserver for NoopObserver {}

/// Observer that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl QueueObserver for TracingObserver {
    fn queue_resolved(&self, handle: &QueueHandle) {
        debug!(queue = %handle.name(), url = %handle.url(), "Resolved queue");
    }

    fn queue_created(&self, handle: &QueueHandle) {
        info!(queue = %handle.name(), url = %handle.url(), "Created queue");
    }

    fn queue_deleted(&self, handle: &QueueHandle) {
        info!(queue = %handle.name(), url = %handle.url(), "Deleted queue");
    }

    fn message_sent(&self, handle: &QueueHandle, message_id: &MessageId) {
        debug!(queue = %handle.name(), message_id = %message_id, "Sent message");
    }

    fn messages_received(&self, handle: &QueueHandle, messages: &[ReceivedMessage]) {
        for message in messages {
            debug!(
                queue = %handle.name(),
                message_id = %message.message_id,
                receive_count = message.receive_count,
                "Received message"
            );
        }
    }

    fn message_acknowledged(&self, message: &ReceivedMessage) {
        debug!(message_id = %message.message_id, "Deleted message");
    }

    fn message_released(&self, message: &ReceivedMessage) {
        debug!(message_id = %message.message_id, "Released message");
    }

    fn operation_failed(&self, operation: Operation, target: &str, error: &QueueError) {
        if error.is_caller_error() {
            warn!(operation = %operation, subject = %target, error = %error, "Queue operation rejected");
        } else {
            error!(operation = %operation, subject = %target, error = %error, "Queue operation failed");
        }
    }
}
