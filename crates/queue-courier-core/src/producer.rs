//! Message producer: validates and submits outbound messages.

use crate::error::{QueueError, SendError, ValidationError};
use crate::message::{MessageId, OutboundMessage};
use crate::observer::{Operation, QueueObserver};
use crate::queue::QueueHandle;
use crate::service::{QueueService, ServiceLimits};
use std::sync::Arc;

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;

/// Longest allowed attribute name
const MAX_ATTRIBUTE_NAME_LENGTH: usize = 256;

/// Longest allowed FIFO group or deduplication id
const MAX_FIFO_TOKEN_LENGTH: usize = 128;

/// Sends messages to resolved queues.
///
/// Every send is a single request. A failed send returns the message inside
/// [`SendError`]; retrying is up to the caller.
pub struct Producer {
    service: Arc<dyn QueueService>,
    observer: Arc<dyn QueueObserver>,
}

impl Producer {
    /// Create a producer over the given service
    pub fn new(service: Arc<dyn QueueService>, observer: Arc<dyn QueueObserver>) -> Self {
        Self { service, observer }
    }

    /// Validate and send one message
    ///
    /// Checks that can be made locally (size, attribute count and types,
    /// FIFO parameters) run before any request is made.
    ///
    /// # Errors
    ///
    /// The returned [`SendError`] wraps:
    /// - [`QueueError::PayloadTooLarge`] / [`QueueError::TooManyAttributes`] /
    ///   [`QueueError::Validation`] for invalid input
    /// - [`QueueError::ConnectionFailed`] if the service is unreachable
    /// - [`QueueError::TransportFailed`] if the service rejected the request
    pub async fn send(
        &self,
        handle: &QueueHandle,
        message: OutboundMessage,
    ) -> Result<MessageId, SendError> {
        if let Err(e) = validate_message(handle, &message, &self.service.limits()) {
            self.observer
                .operation_failed(Operation::Send, handle.name().as_str(), &e);
            return Err(SendError::new(e, message));
        }

        match self.service.send_message(handle.url(), &message).await {
            Ok(message_id) => {
                self.observer.message_sent(handle, &message_id);
                Ok(message_id)
            }
            Err(e) => {
                self.observer
                    .operation_failed(Operation::Send, handle.name().as_str(), &e);
                Err(SendError::new(e, message))
            }
        }
    }
}

/// Check a message against service limits and queue type
pub fn validate_message(
    handle: &QueueHandle,
    message: &OutboundMessage,
    limits: &ServiceLimits,
) -> Result<(), QueueError> {
    if message.body.is_empty() {
        return Err(ValidationError::Required {
            field: "body".to_string(),
        }
        .into());
    }

    let size = message.wire_size();
    if size > limits.max_message_bytes {
        return Err(QueueError::PayloadTooLarge {
            size,
            max_size: limits.max_message_bytes,
        });
    }

    if message.attributes.len() > limits.max_attributes {
        return Err(QueueError::TooManyAttributes {
            count: message.attributes.len(),
            max_count: limits.max_attributes,
        });
    }

    for (key, value) in &message.attributes {
        validate_attribute_name(key)?;
        value.validate(key)?;
    }

    if handle.is_fifo() {
        validate_fifo_token("group_id", message.group_id.as_deref(), true)?;
        validate_fifo_token(
            "deduplication_id",
            message.deduplication_id.as_deref(),
            false,
        )?;

        if message.delay.is_some() {
            return Err(ValidationError::InvalidFormat {
                field: "delay".to_string(),
                message: "per-message delay is not supported on FIFO queues".to_string(),
            }
            .into());
        }
    } else {
        if message.group_id.is_some() {
            return Err(ValidationError::InvalidFormat {
                field: "group_id".to_string(),
                message: "message groups require a FIFO queue".to_string(),
            }
            .into());
        }

        if let Some(delay) = message.delay {
            if delay > limits.max_delay {
                return Err(ValidationError::OutOfRange {
                    field: "delay".to_string(),
                    message: format!("must be at most {} seconds", limits.max_delay.as_secs()),
                }
                .into());
            }
        }
    }

    Ok(())
}

fn validate_attribute_name(name: &str) -> Result<(), ValidationError> {
    let field = "attribute_name".to_string();

    if name.is_empty() || name.len() > MAX_ATTRIBUTE_NAME_LENGTH {
        return Err(ValidationError::OutOfRange {
            field,
            message: format!("'{}' must be 1-{} characters", name, MAX_ATTRIBUTE_NAME_LENGTH),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field,
            message: format!("'{}' may only contain alphanumerics, '_', '-' and '.'", name),
        });
    }

    if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return Err(ValidationError::InvalidFormat {
            field,
            message: format!("'{}' has a leading, trailing or repeated '.'", name),
        });
    }

    let lower = name.to_ascii_lowercase();
    if lower.starts_with("aws.") || lower.starts_with("amazon.") {
        return Err(ValidationError::InvalidFormat {
            field,
            message: format!("'{}' uses a reserved prefix", name),
        });
    }

    Ok(())
}

fn validate_fifo_token(
    field: &str,
    value: Option<&str>,
    required: bool,
) -> Result<(), ValidationError> {
    let Some(value) = value else {
        if required {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
        return Ok(());
    };

    if value.is_empty() || value.len() > MAX_FIFO_TOKEN_LENGTH {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("must be 1-{} characters", MAX_FIFO_TOKEN_LENGTH),
        });
    }

    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: "only printable ASCII characters allowed".to_string(),
        });
    }

    Ok(())
}
