//! Packing of source-location records into message attributes.
//!
//! A [`PackedRecord`] travels as a plain message: the free text goes in the
//! body, the location in two String attributes, `path` and `line` (base-10).

use crate::error::CodecError;
use crate::message::{AttributeValue, MessageAttributes, OutboundMessage, ReceivedMessage};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;

/// Attribute key holding the record path
pub const PATH_ATTRIBUTE: &str = "path";

/// Attribute key holding the record line number
pub const LINE_ATTRIBUTE: &str = "line";

/// A source location plus free text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackedRecord {
    pub path: String,
    pub line: u64,
    pub body: String,
}

impl PackedRecord {
    pub fn new(path: impl Into<String>, line: u64, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            body: body.into(),
        }
    }

    /// Pack this record into an outbound message
    pub fn into_message(self) -> OutboundMessage {
        pack(self.path, self.body, self.line)
    }
}

/// Anything carrying a body and an attribute map
pub trait Payload {
    fn body(&self) -> &str;
    fn attributes(&self) -> &MessageAttributes;
}

impl Payload for OutboundMessage {
    fn body(&self) -> &str {
        &self.body
    }

    fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }
}

impl Payload for ReceivedMessage {
    fn body(&self) -> &str {
        &self.body
    }

    fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }
}

/// Build a message carrying `path` and `line` as attributes and `body` as text
pub fn pack(path: impl Into<String>, body: impl Into<String>, line: u64) -> OutboundMessage {
    OutboundMessage::new(body)
        .with_attribute(PATH_ATTRIBUTE, AttributeValue::String(path.into()))
        .with_attribute(LINE_ATTRIBUTE, AttributeValue::String(line.to_string()))
}

/// Recover the record packed into a message
///
/// # Errors
///
/// Returns [`CodecError`] if `path` or `line` is missing, is not a String
/// attribute, or `line` is not a non-negative base-10 integer.
pub fn unpack<P: Payload + ?Sized>(message: &P) -> Result<PackedRecord, CodecError> {
    let attributes = message.attributes();
    let path = string_attribute(attributes, PATH_ATTRIBUTE)?;
    let line_text = string_attribute(attributes, LINE_ATTRIBUTE)?;

    // u64::from_str accepts a leading '+', which is not base-10 digits only
    if line_text.is_empty() || !line_text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidLine {
            value: line_text.to_string(),
        });
    }

    let line = line_text
        .parse::<u64>()
        .map_err(|_| CodecError::InvalidLine {
            value: line_text.to_string(),
        })?;

    Ok(PackedRecord {
        path: path.to_string(),
        line,
        body: message.body().to_string(),
    })
}

fn string_attribute<'a>(
    attributes: &'a MessageAttributes,
    key: &str,
) -> Result<&'a str, CodecError> {
    match attributes.get(key) {
        Some(AttributeValue::String(value)) => Ok(value),
        Some(other) => Err(CodecError::WrongAttributeType {
            key: key.to_string(),
            expected: "String",
            found: other.data_type(),
        }),
        None => Err(CodecError::MissingAttribute {
            key: key.to_string(),
        }),
    }
}
