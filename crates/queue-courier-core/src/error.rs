//! Error types for queue operations.

use crate::message::OutboundMessage;
use std::time::Duration;
use thiserror::Error;

/// Error type shared by every queue operation.
///
/// Errors are always returned to the immediate caller. Nothing in this crate
/// retries; [`QueueError::is_transient`] exists so callers can build their own
/// retry policy on top.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Queue '{queue_name}' already exists with different attributes: {message}")]
    QueueConflict { queue_name: String, message: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error("Too many message attributes: {count} (max: {max_count})")]
    TooManyAttributes { count: usize, max_count: usize },

    #[error("Request failed ({code}): {message}")]
    TransportFailed { code: String, message: String },

    #[error("Message '{message_id}' has already been acknowledged")]
    AlreadyAcknowledged { message_id: String },

    #[error("Receipt for message '{message_id}' has expired")]
    ReceiptExpired { message_id: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Check if the error is transient, i.e. repeating the request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::TransportFailed { .. } => true,
            Self::QueueNotFound { .. } => false,
            Self::QueueConflict { .. } => false,
            Self::PayloadTooLarge { .. } => false,
            Self::TooManyAttributes { .. } => false,
            Self::AlreadyAcknowledged { .. } => false,
            Self::ReceiptExpired { .. } => false,
            Self::AuthenticationFailed { .. } => false,
            Self::MalformedPayload(_) => false,
            Self::Configuration(_) => false,
            Self::Validation(_) => false,
        }
    }

    /// Get suggested delay before a caller-driven retry
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ConnectionFailed { .. } => Some(Duration::from_secs(5)),
            Self::TransportFailed { .. } => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    /// Check if the error was raised locally before any request was made
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. }
                | Self::TooManyAttributes { .. }
                | Self::Validation(_)
                | Self::Configuration(_)
        )
    }
}

/// Failure to send a message.
///
/// Owns the message that could not be sent so the caller can retry it.
#[derive(Debug, Error)]
#[error("Failed to send message: {source}")]
pub struct SendError {
    #[source]
    source: QueueError,
    message: Box<OutboundMessage>,
}

impl SendError {
    /// Create a send error for the given message
    pub fn new(source: QueueError, message: OutboundMessage) -> Self {
        Self {
            source,
            message: Box::new(message),
        }
    }

    /// The underlying failure
    pub fn error(&self) -> &QueueError {
        &self.source
    }

    /// The message that was not sent
    pub fn message(&self) -> &OutboundMessage {
        &self.message
    }

    /// Take back the unsent message
    pub fn into_message(self) -> OutboundMessage {
        *self.message
    }

    /// Split into the failure and the unsent message
    pub fn into_parts(self) -> (QueueError, OutboundMessage) {
        (self.source, *self.message)
    }
}

impl From<SendError> for QueueError {
    fn from(error: SendError) -> Self {
        error.source
    }
}

/// Errors decoding a packed record from a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Required attribute '{key}' is missing")]
    MissingAttribute { key: String },

    #[error("Attribute '{key}' must have type {expected}, found {found}")]
    WrongAttributeType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Attribute 'line' is not a non-negative integer: '{value}'")]
    InvalidLine { value: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
