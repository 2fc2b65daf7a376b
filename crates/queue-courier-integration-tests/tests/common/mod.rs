//! Common test utilities for queue-courier integration tests
//!
//! This module provides:
//! - A recording observer for asserting on reported events
//! - Helpers for building clients that share one in-memory service

use queue_courier_core::{
    InMemoryConfig, InMemoryQueueService, MessageId, Operation, QueueAttributes, QueueClient,
    QueueError, QueueHandle, QueueName, QueueObserver, ReceivedMessage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Recording Observer
// ============================================================================

/// Event reported to [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Event {
    Resolved(String),
    Created(String),
    Deleted(String),
    Sent(String),
    Received(usize),
    Acknowledged(String),
    Released(String),
    Failed(Operation, String),
}

/// Observer that keeps every notification for later inspection
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(Operation, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Failed(operation, error) => Some((operation, error)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl QueueObserver for RecordingObserver {
    fn queue_resolved(&self, handle: &QueueHandle) {
        self.record(Event::Resolved(handle.name().to_string()));
    }

    fn queue_created(&self, handle: &QueueHandle) {
        self.record(Event::Created(handle.name().to_string()));
    }

    fn queue_deleted(&self, handle: &QueueHandle) {
        self.record(Event::Deleted(handle.name().to_string()));
    }

    fn message_sent(&self, _handle: &QueueHandle, message_id: &MessageId) {
        self.record(Event::Sent(message_id.to_string()));
    }

    fn messages_received(&self, _handle: &QueueHandle, messages: &[ReceivedMessage]) {
        self.record(Event::Received(messages.len()));
    }

    fn message_acknowledged(&self, message: &ReceivedMessage) {
        self.record(Event::Acknowledged(message.message_id.to_string()));
    }

    fn message_released(&self, message: &ReceivedMessage) {
        self.record(Event::Released(message.message_id.to_string()));
    }

    fn operation_failed(&self, operation: Operation, _target: &str, error: &QueueError) {
        self.record(Event::Failed(operation, error.to_string()));
    }
}

// ============================================================================
// Client Helpers
// ============================================================================

/// In-memory service shared by every client built from it
#[allow(dead_code)]
pub fn shared_service() -> Arc<InMemoryQueueService> {
    Arc::new(InMemoryQueueService::new(InMemoryConfig::default()))
}

/// New client, with its own resolver cache, over `service`
#[allow(dead_code)]
pub fn client_for(service: &Arc<InMemoryQueueService>) -> QueueClient {
    QueueClient::new(service.clone())
}

#[allow(dead_code)]
pub fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).unwrap()
}

/// Create a standard queue with the given visibility timeout
#[allow(dead_code)]
pub async fn create_queue(client: &QueueClient, name: &str, visibility: Duration) -> QueueHandle {
    client
        .ensure(
            &queue_name(name),
            &QueueAttributes::new().visibility_timeout(visibility),
        )
        .await
        .unwrap()
}
