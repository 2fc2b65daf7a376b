//! Queue service implementations.
//!
//! This module contains concrete implementations of the `QueueService` trait
//! for an SQS-compatible HTTP endpoint and for an in-process fake.

pub mod memory;
pub mod sqs;

pub use memory::InMemoryQueueService;
pub use sqs::SqsQueueService;
