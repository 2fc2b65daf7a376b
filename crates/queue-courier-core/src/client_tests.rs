//! Tests for the queue client.

use super::*;
use crate::config::{Credentials, SqsConfig};
use crate::message::MessageId;
use crate::observer::Operation;
use std::sync::Mutex;

/// Observer that records every notification as a short string
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl QueueObserver for RecordingObserver {
    fn queue_created(&self, handle: &QueueHandle) {
        self.record(format!("created:{}", handle.name()));
    }

    fn message_sent(&self, handle: &QueueHandle, _message_id: &MessageId) {
        self.record(format!("sent:{}", handle.name()));
    }

    fn messages_received(&self, handle: &QueueHandle, messages: &[ReceivedMessage]) {
        self.record(format!("received:{}:{}", handle.name(), messages.len()));
    }

    fn message_acknowledged(&self, _message: &ReceivedMessage) {
        self.record("acknowledged".to_string());
    }

    fn operation_failed(&self, operation: Operation, _target: &str, _error: &QueueError) {
        self.record(format!("failed:{}", operation));
    }
}

fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).unwrap()
}

// ============================================================================
// Construction Tests
// ============================================================================

mod construction {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let config = ClientConfig::new(ProviderConfig::InMemory(InMemoryConfig::default()));
        let client = QueueClient::connect(config).await.unwrap();

        assert_eq!(client.service_kind(), ServiceKind::InMemory);
        assert_eq!(client.consumer().ack_mode(), AckMode::Manual);
    }

    #[tokio::test]
    async fn test_connect_carries_ack_mode() {
        let mut config = ClientConfig::new(ProviderConfig::InMemory(InMemoryConfig::default()));
        config.ack_mode = AckMode::AutoAcknowledge;

        let client = QueueClient::connect(config).await.unwrap();
        assert_eq!(client.consumer().ack_mode(), AckMode::AutoAcknowledge);
    }

    #[tokio::test]
    async fn test_connect_sqs_does_not_contact_service() {
        let config = ClientConfig::new(ProviderConfig::Sqs(SqsConfig {
            endpoint: "localhost:1".to_string(),
            region: "elasticmq".to_string(),
            credentials: Credentials::new("x", "y"),
            use_tls: false,
            request_timeout_seconds: None,
        }));

        let client = QueueClient::connect(config).await.unwrap();
        assert_eq!(client.service_kind(), ServiceKind::Sqs);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_configuration() {
        let config = ClientConfig::new(ProviderConfig::Sqs(SqsConfig {
            endpoint: "localhost:9324".to_string(),
            region: String::new(),
            credentials: Credentials::new("x", "y"),
            use_tls: false,
            request_timeout_seconds: None,
        }));

        let result = QueueClient::connect(config).await;
        assert!(matches!(result, Err(QueueError::Configuration(_))));
    }

    #[test]
    fn test_clients_are_independent() {
        let first = QueueClient::in_memory();
        let second = QueueClient::in_memory();
        assert!(!Arc::ptr_eq(&first.service, &second.service));
    }
}

// ============================================================================
// Observer Tests
// ============================================================================

mod observation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_every_operation() {
        let observer = Arc::new(RecordingObserver::default());
        let client = QueueClient::with_observer(
            Arc::new(InMemoryQueueService::new(InMemoryConfig::default())),
            observer.clone(),
        );

        let queue = client
            .ensure(&queue_name("events"), &QueueAttributes::new())
            .await
            .unwrap();
        client
            .send(&queue, OutboundMessage::new("hello"))
            .await
            .unwrap();
        let messages = client.receive(&queue, &ReceiveOptions::new()).await.unwrap();
        client.acknowledge(&messages[0]).await.unwrap();
        let _ = client.acknowledge(&messages[0]).await;

        assert_eq!(
            observer.events(),
            vec![
                "created:events",
                "sent:events",
                "received:events:1",
                "acknowledged",
                "failed:acknowledge",
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_are_reported_then_returned() {
        let observer = Arc::new(RecordingObserver::default());
        let client = QueueClient::with_observer(
            Arc::new(InMemoryQueueService::default()),
            observer.clone(),
        );

        let result = client.resolve(&queue_name("nowhere")).await;

        assert!(matches!(result, Err(QueueError::QueueNotFound { .. })));
        assert_eq!(observer.events(), vec!["failed:resolve"]);
    }
}
