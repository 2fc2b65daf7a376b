//! Caller-owned connection context.
//!
//! A [`QueueClient`] bundles one service connection with its resolver,
//! producer and consumer. There is no process-wide default client: callers
//! build one and pass it where it is needed, and tests build one over the
//! in-memory service.

use crate::config::{ClientConfig, InMemoryConfig, ProviderConfig};
use crate::consumer::{AckMode, Consumer, ReceivedBatch};
use crate::error::{QueueError, SendError};
use crate::message::{MessageId, OutboundMessage, QueueName, ReceiveOptions, ReceivedMessage};
use crate::observer::{QueueObserver, TracingObserver};
use crate::producer::Producer;
use crate::providers::{InMemoryQueueService, SqsQueueService};
use crate::queue::{QueueAttributes, QueueHandle, QueueResolver};
use crate::service::{QueueService, ServiceKind};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Connection to one queue service
pub struct QueueClient {
    service: Arc<dyn QueueService>,
    resolver: QueueResolver,
    producer: Producer,
    consumer: Consumer,
}

impl QueueClient {
    /// Create a client over an existing service, logging through `tracing`
    pub fn new(service: Arc<dyn QueueService>) -> Self {
        Self::with_observer(service, Arc::new(TracingObserver))
    }

    /// Create a client over an existing service with a custom observer
    pub fn with_observer(
        service: Arc<dyn QueueService>,
        observer: Arc<dyn QueueObserver>,
    ) -> Self {
        Self {
            resolver: QueueResolver::new(Arc::clone(&service), Arc::clone(&observer)),
            producer: Producer::new(Arc::clone(&service), Arc::clone(&observer)),
            consumer: Consumer::new(Arc::clone(&service), observer),
            service,
        }
    }

    /// Create a client from configuration
    pub async fn connect(config: ClientConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let service: Arc<dyn QueueService> = match config.provider {
            ProviderConfig::Sqs(sqs_config) => Arc::new(SqsQueueService::new(sqs_config)?),
            ProviderConfig::InMemory(memory_config) => {
                Arc::new(InMemoryQueueService::new(memory_config))
            }
        };

        Ok(Self::new(service).with_ack_mode(config.ack_mode))
    }

    /// Create client over a fresh in-memory service
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryQueueService::new(InMemoryConfig::default())))
    }

    /// Set the acknowledgement mode used by [`QueueClient::receive`]
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.consumer = self.consumer.with_ack_mode(ack_mode);
        self
    }

    pub fn service_kind(&self) -> ServiceKind {
        self.service.kind()
    }

    pub fn resolver(&self) -> &QueueResolver {
        &self.resolver
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    /// See [`QueueResolver::resolve`]
    pub async fn resolve(&self, name: &QueueName) -> Result<QueueHandle, QueueError> {
        self.resolver.resolve(name).await
    }

    /// See [`QueueResolver::ensure`]
    pub async fn ensure(
        &self,
        name: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueHandle, QueueError> {
        self.resolver.ensure(name, attributes).await
    }

    /// See [`QueueResolver::delete`]
    pub async fn delete_queue(&self, handle: &QueueHandle) -> Result<(), QueueError> {
        self.resolver.delete(handle).await
    }

    /// See [`Producer::send`]
    pub async fn send(
        &self,
        handle: &QueueHandle,
        message: OutboundMessage,
    ) -> Result<MessageId, SendError> {
        self.producer.send(handle, message).await
    }

    /// See [`Consumer::receive`]
    pub async fn receive(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.consumer.receive(handle, options).await
    }

    /// See [`Consumer::receive_until`]
    pub async fn receive_until<F>(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
        shutdown: F,
    ) -> Result<Vec<ReceivedMessage>, QueueError>
    where
        F: Future<Output = ()>,
    {
        self.consumer.receive_until(handle, options, shutdown).await
    }

    /// See [`Consumer::receive_batch`]
    pub async fn receive_batch(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
    ) -> Result<ReceivedBatch, QueueError> {
        self.consumer.receive_batch(handle, options).await
    }

    /// See [`Consumer::receive_batch_until`]
    pub async fn receive_batch_until<F>(
        &self,
        handle: &QueueHandle,
        options: &ReceiveOptions,
        shutdown: F,
    ) -> Result<ReceivedBatch, QueueError>
    where
        F: Future<Output = ()>,
    {
        self.consumer
            .receive_batch_until(handle, options, shutdown)
            .await
    }

    /// See [`Consumer::acknowledge`]
    pub async fn acknowledge(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.consumer.acknowledge(message).await
    }

    /// See [`Consumer::release`]
    pub async fn release(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.consumer.release(message).await
    }

    /// See [`Consumer::extend_visibility`]
    pub async fn extend_visibility(
        &self,
        message: &ReceivedMessage,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.consumer.extend_visibility(message, timeout).await
    }
}
