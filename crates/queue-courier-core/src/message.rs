//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Suffix that marks a FIFO queue
pub const FIFO_SUFFIX: &str = ".fifo";

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name with length and character restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Maximum queue name length, including any `.fifo` suffix
    pub const MAX_LENGTH: usize = 80;

    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > Self::MAX_LENGTH {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: format!("must be 1-{} characters", Self::MAX_LENGTH),
            });
        }

        let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(&name);
        if base.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "name cannot consist of the .fifo suffix alone".to_string(),
            });
        }

        if !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, and underscores allowed".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Check if the name designates a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.0.ends_with(FIFO_SUFFIX)
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}

/// Identifier assigned to a message by the queue service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Message Attributes
// ============================================================================

/// Typed value of a message attribute
///
/// Serializes as `{"type": "...", "value": ...}` with binary values in
/// base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TaggedValue", try_from = "TaggedValue")]
pub enum AttributeValue {
    String(String),
    /// Decimal number kept in its textual form so no precision is lost
    Number(String),
    Binary(Bytes),
}

impl AttributeValue {
    /// Create a string attribute
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Create a number attribute from any numeric value
    pub fn number(value: impl std::fmt::Display) -> Self {
        Self::Number(value.to_string())
    }

    /// Create a binary attribute
    pub fn binary(value: impl Into<Bytes>) -> Self {
        Self::Binary(value.into())
    }

    /// Wire type tag for this value
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Number(_) => "Number",
            Self::Binary(_) => "Binary",
        }
    }

    /// Textual value of String and Number attributes
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Number(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Size of the value as counted against the message size limit
    pub fn wire_size(&self) -> usize {
        match self {
            Self::String(s) | Self::Number(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Check the value is well formed for its type
    pub fn validate(&self, key: &str) -> Result<(), ValidationError> {
        let field = format!("attribute '{}'", key);
        match self {
            Self::String(s) if s.is_empty() => Err(ValidationError::Required { field }),
            Self::Binary(b) if b.is_empty() => Err(ValidationError::Required { field }),
            Self::Number(n) if !is_decimal_number(n) => Err(ValidationError::InvalidFormat {
                field,
                message: format!("'{}' is not a decimal number", n),
            }),
            _ => Ok(()),
        }
    }
}

fn is_decimal_number(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let int_ok = int_part.chars().all(|c| c.is_ascii_digit());
    let frac_ok = frac_part.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));

    !int_part.is_empty() && int_ok && frac_ok
}

/// Attribute map carried by a message; keys are unique by construction
pub type MessageAttributes = BTreeMap<String, AttributeValue>;

/// Serialized form of [`AttributeValue`]
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
enum TaggedValue {
    String(String),
    Number(String),
    /// Base64 text
    Binary(String),
}

impl From<AttributeValue> for TaggedValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::String(s) => Self::String(s),
            AttributeValue::Number(n) => Self::Number(n),
            AttributeValue::Binary(b) => Self::Binary(general_purpose::STANDARD.encode(&b)),
        }
    }
}

impl TryFrom<TaggedValue> for AttributeValue {
    type Error = base64::DecodeError;

    fn try_from(value: TaggedValue) -> Result<Self, Self::Error> {
        Ok(match value {
            TaggedValue::String(s) => Self::String(s),
            TaggedValue::Number(n) => Self::Number(n),
            TaggedValue::Binary(encoded) => {
                Self::Binary(Bytes::from(general_purpose::STANDARD.decode(encoded)?))
            }
        })
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be sent through the queue system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: MessageAttributes,
    /// Message group for FIFO queues; ordering holds within one group
    pub group_id: Option<String>,
    /// Deduplication token for FIFO queues
    pub deduplication_id: Option<String>,
    /// Per-message delivery delay (standard queues only)
    pub delay: Option<Duration>,
}

impl OutboundMessage {
    /// Create new message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: MessageAttributes::new(),
            group_id: None,
            deduplication_id: None,
            delay: None,
        }
    }

    /// Add a typed attribute, replacing any previous value for the key
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Add a string attribute
    pub fn with_string_attribute(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_attribute(key, AttributeValue::string(value))
    }

    /// Add a number attribute
    pub fn with_number_attribute(
        self,
        key: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        self.with_attribute(key, AttributeValue::number(value))
    }

    /// Set the FIFO message group
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set the FIFO deduplication token
    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<String>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    /// Delay delivery of this message
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Size counted against the service message size limit
    ///
    /// Body plus, for every attribute, its name, type tag and value.
    pub fn wire_size(&self) -> usize {
        self.body.len()
            + self
                .attributes
                .iter()
                .map(|(k, v)| k.len() + v.data_type().len() + v.wire_size())
                .sum::<usize>()
    }
}

/// A message received from the queue with processing metadata
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: String,
    pub attributes: MessageAttributes,
    pub group_id: Option<String>,
    /// Approximate number of times this message has been delivered
    pub receive_count: u32,
    pub received_at: Timestamp,
    pub receipt_handle: ReceiptHandle,
}

impl ReceivedMessage {
    /// Check if this delivery has already been acknowledged
    pub fn is_acknowledged(&self) -> bool {
        self.receipt_handle.is_acknowledged()
    }
}

/// Opaque token for acknowledging or releasing one delivery of a message.
///
/// Clones share state: acknowledging through one clone invalidates all of them.
#[derive(Debug, Clone)]
pub struct ReceiptHandle {
    token: String,
    queue_url: String,
    message_id: MessageId,
    state: Arc<ReceiptState>,
}

#[derive(Debug)]
struct ReceiptState {
    acknowledged: AtomicBool,
    visible_until: Mutex<Option<Instant>>,
}

impl ReceiptHandle {
    /// Create new receipt handle
    ///
    /// `visible_until` is the end of the visibility timeout when it is known.
    pub fn new(
        token: String,
        queue_url: String,
        message_id: MessageId,
        visible_until: Option<Instant>,
    ) -> Self {
        Self {
            token,
            queue_url,
            message_id,
            state: Arc::new(ReceiptState {
                acknowledged: AtomicBool::new(false),
                visible_until: Mutex::new(visible_until),
            }),
        }
    }

    /// Get the service token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// URL of the queue the message was received from
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Identifier of the message this receipt belongs to
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// End of the visibility timeout, if known
    pub fn visible_until(&self) -> Option<Instant> {
        match self.state.visible_until.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Check if the visibility timeout is known to have elapsed
    pub fn is_expired(&self) -> bool {
        self.visible_until()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Get time until expiry, if the deadline is known
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.visible_until()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Check if this delivery has been acknowledged
    pub fn is_acknowledged(&self) -> bool {
        self.state.acknowledged.load(Ordering::Acquire)
    }

    /// Claim the acknowledgement; returns false if already claimed
    pub(crate) fn claim_acknowledgement(&self) -> bool {
        !self.state.acknowledged.swap(true, Ordering::AcqRel)
    }

    /// Undo a claim after a failed acknowledgement
    pub(crate) fn revert_acknowledgement(&self) {
        self.state.acknowledged.store(false, Ordering::Release);
    }

    pub(crate) fn set_visible_until(&self, deadline: Option<Instant>) {
        match self.state.visible_until.lock() {
            Ok(mut guard) => *guard = deadline,
            Err(poisoned) => *poisoned.into_inner() = deadline,
        }
    }
}

impl PartialEq for ReceiptHandle {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.queue_url == other.queue_url
    }
}

impl Eq for ReceiptHandle {}

// ============================================================================
// Receive Options
// ============================================================================

/// Options for a single receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Maximum number of messages to receive in a batch (1-10)
    pub max_messages: u32,
    /// Long-poll wait when the queue is empty (0-20 seconds)
    pub wait: Duration,
    /// Visibility timeout for this receive; queue default when None
    pub visibility_timeout: Option<Duration>,
}

impl ReceiveOptions {
    /// Largest batch a single receive may request
    pub const MAX_MESSAGES: u32 = 10;

    /// Longest long-poll wait
    pub const MAX_WAIT: Duration = Duration::from_secs(20);

    /// Longest visibility timeout (12 hours)
    pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

    /// Create new receive options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of messages to receive
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Set the long-poll wait
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Set the visibility timeout for received messages
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = Some(timeout);
        self
    }

    /// Check the options are within service bounds
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_messages == 0 || self.max_messages > Self::MAX_MESSAGES {
            return Err(ValidationError::OutOfRange {
                field: "max_messages".to_string(),
                message: format!("must be 1-{}", Self::MAX_MESSAGES),
            });
        }

        if self.wait > Self::MAX_WAIT {
            return Err(ValidationError::OutOfRange {
                field: "wait".to_string(),
                message: format!("must be at most {} seconds", Self::MAX_WAIT.as_secs()),
            });
        }

        if let Some(timeout) = self.visibility_timeout {
            if timeout > Self::MAX_VISIBILITY_TIMEOUT {
                return Err(ValidationError::OutOfRange {
                    field: "visibility_timeout".to_string(),
                    message: "must be at most 12 hours".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait: Duration::ZERO,
            visibility_timeout: None,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
