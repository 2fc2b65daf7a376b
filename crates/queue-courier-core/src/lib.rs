//! # Queue Courier
//!
//! Producer/consumer client for SQS-compatible message queues.
//!
//! This library provides:
//! - Queue name resolution with per-client handle caching
//! - Validated sends that hand the message back on failure
//! - Long-poll receives with at-least-once delivery and explicit acknowledgement
//! - A record codec that carries a source location in message attributes
//! - An in-memory service for tests and local development
//!
//! ## Module Organization
//!
//! - [`client`] - The caller-owned [`QueueClient`]
//! - [`queue`] - Queue handles, attributes and the resolver
//! - [`producer`] / [`consumer`] - Sending and receiving
//! - [`codec`] - `pack` / `unpack` of location records
//! - [`service`] - The [`QueueService`] seam and its [`providers`]
//! - [`observer`] - Injected notification hooks
//! - [`config`] / [`error`] / [`message`] - Supporting types
//!
//! ## Example
//!
//! ```no_run
//! use queue_courier_core::{codec, QueueAttributes, QueueClient, QueueName, ReceiveOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = QueueClient::in_memory();
//! let name = QueueName::new("events".to_string())?;
//! let queue = client.ensure(&name, &QueueAttributes::new()).await?;
//!
//! client.send(&queue, codec::pack("src/main.rs", "hello", 42)).await?;
//!
//! let options = ReceiveOptions::new().with_wait(Duration::from_secs(5));
//! for message in client.receive(&queue, &options).await? {
//!     let record = codec::unpack(&message)?;
//!     println!("{}:{} {}", record.path, record.line, record.body);
//!     client.acknowledge(&message).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod message;
pub mod observer;
pub mod producer;
pub mod providers;
pub mod queue;
pub mod service;

// Re-export commonly used types at crate root for convenience
pub use client::QueueClient;
pub use codec::{pack, unpack, PackedRecord, Payload};
pub use config::{ClientConfig, Credentials, InMemoryConfig, ProviderConfig, Secret, SqsConfig};
pub use consumer::{AckMode, Consumer, ReceivedBatch};
pub use error::{CodecError, ConfigurationError, QueueError, SendError, ValidationError};
pub use message::{
    AttributeValue, MessageAttributes, MessageId, OutboundMessage, QueueName, ReceiptHandle,
    ReceiveOptions, ReceivedMessage, Timestamp,
};
pub use observer::{NoopObserver, Operation, QueueObserver, TracingObserver};
pub use producer::Producer;
pub use providers::{InMemoryQueueService, SqsQueueService};
pub use queue::{QueueAttributes, QueueHandle, QueueResolver};
pub use service::{QueueService, ServiceKind, ServiceLimits};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
