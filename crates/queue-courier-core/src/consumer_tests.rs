//! Tests for the message consumer.

use super::*;
use crate::config::InMemoryConfig;
use crate::message::{MessageId, OutboundMessage, QueueName, ReceiptHandle, Timestamp};
use crate::observer::NoopObserver;
use crate::providers::InMemoryQueueService;
use crate::queue::QueueAttributes;
use crate::service::MockQueueService;
use mockall::Sequence;

fn handle() -> QueueHandle {
    QueueHandle::new(QueueName::new("q".to_string()).unwrap(), "url/q".to_string())
}

fn received(visible_for: Option<Duration>) -> ReceivedMessage {
    let message_id = MessageId::new();
    ReceivedMessage {
        message_id: message_id.clone(),
        body: "body".to_string(),
        attributes: Default::default(),
        group_id: None,
        receive_count: 1,
        received_at: Timestamp::now(),
        receipt_handle: ReceiptHandle::new(
            "token".to_string(),
            "url/q".to_string(),
            message_id,
            visible_for.map(|d| Instant::now() + d),
        ),
    }
}

fn mock_consumer(service: MockQueueService) -> Consumer {
    Consumer::new(Arc::new(service), Arc::new(NoopObserver))
}

/// Consumer over a fresh in-memory service with one queue
async fn memory_consumer(ack_mode: AckMode) -> (Consumer, Arc<InMemoryQueueService>, QueueHandle) {
    let service = Arc::new(InMemoryQueueService::new(InMemoryConfig::default()));
    let name = QueueName::new("work".to_string()).unwrap();
    let url = service
        .create_queue(&name, &QueueAttributes::new())
        .await
        .unwrap();

    let consumer =
        Consumer::new(service.clone(), Arc::new(NoopObserver)).with_ack_mode(ack_mode);
    (consumer, service, QueueHandle::new(name, url))
}

// ============================================================================
// Acknowledgement Tests
// ============================================================================

mod acknowledgement {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_acknowledge_fails_without_service_call() {
        let mut service = MockQueueService::new();
        service.expect_delete_message().times(1).returning(|_| Ok(()));

        let consumer = mock_consumer(service);
        let message = received(Some(Duration::from_secs(30)));

        consumer.acknowledge(&message).await.unwrap();
        assert!(message.is_acknowledged());

        let second = consumer.acknowledge(&message).await;
        assert!(matches!(second, Err(QueueError::AlreadyAcknowledged { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledge_after_visibility_timeout_is_expired() {
        let mut service = MockQueueService::new();
        service.expect_delete_message().never();

        let consumer = mock_consumer(service);
        let message = received(Some(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(6)).await;

        let result = consumer.acknowledge(&message).await;
        assert!(matches!(result, Err(QueueError::ReceiptExpired { .. })));
        assert!(!message.is_acknowledged());
    }

    #[tokio::test]
    async fn test_failed_delete_can_be_retried() {
        let mut service = MockQueueService::new();
        let mut sequence = Sequence::new();
        service
            .expect_delete_message()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Err(QueueError::ConnectionFailed {
                    message: "reset".to_string(),
                })
            });
        service
            .expect_delete_message()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));

        let consumer = mock_consumer(service);
        let message = received(None);

        let first = consumer.acknowledge(&message).await;
        assert!(matches!(first, Err(QueueError::ConnectionFailed { .. })));
        assert!(!message.is_acknowledged());

        consumer.acknowledge(&message).await.unwrap();
        assert!(message.is_acknowledged());
    }

    #[tokio::test]
    async fn test_service_already_acknowledged_keeps_claim() {
        let mut service = MockQueueService::new();
        service.expect_delete_message().times(1).returning(|r| {
            Err(QueueError::AlreadyAcknowledged {
                message_id: r.message_id().to_string(),
            })
        });

        let consumer = mock_consumer(service);
        let message = received(None);

        assert!(consumer.acknowledge(&message).await.is_err());
        assert!(message.is_acknowledged());
    }

    #[tokio::test]
    async fn test_clones_share_acknowledgement() {
        let mut service = MockQueueService::new();
        service.expect_delete_message().times(1).returning(|_| Ok(()));

        let consumer = mock_consumer(service);
        let message = received(None);
        let copy = message.clone();

        consumer.acknowledge(&message).await.unwrap();
        assert!(matches!(
            consumer.acknowledge(&copy).await,
            Err(QueueError::AlreadyAcknowledged { .. })
        ));
    }
}

// ============================================================================
// Receive Tests
// ============================================================================

mod receive {
    use super::*;

    #[tokio::test]
    async fn test_invalid_options_never_reach_service() {
        let mut service = MockQueueService::new();
        service.expect_receive_messages().never();

        let consumer = mock_consumer(service);
        let options = ReceiveOptions::new().with_max_messages(11);

        let result = consumer.receive(&handle(), &options).await;
        assert!(matches!(result, Err(QueueError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_mode_leaves_messages_unacknowledged() {
        let (consumer, service, queue) = memory_consumer(AckMode::Manual).await;
        service
            .send_message(queue.url(), &OutboundMessage::new("one"))
            .await
            .unwrap();

        let messages = consumer.receive(&queue, &ReceiveOptions::new()).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_acknowledged());
        assert_eq!(service.in_flight_count(queue.url()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_acknowledge_deletes_before_returning() {
        let (consumer, service, queue) = memory_consumer(AckMode::AutoAcknowledge).await;
        for body in ["one", "two"] {
            service
                .send_message(queue.url(), &OutboundMessage::new(body))
                .await
                .unwrap();
        }

        let options = ReceiveOptions::new().with_max_messages(10);
        let messages = consumer.receive(&queue, &options).await.unwrap();

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(ReceivedMessage::is_acknowledged));
        assert_eq!(service.in_flight_count(queue.url()), Some(0));
        assert_eq!(service.pending_count(queue.url()), Some(0));

        let again = consumer.acknowledge(&messages[0]).await;
        assert!(matches!(again, Err(QueueError::AlreadyAcknowledged { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_acknowledge_failure_returns_unacknowledged_message() {
        let mut service = MockQueueService::new();
        service.expect_receive_messages().returning(|_, _| Ok(vec![received(None)]));
        service.expect_delete_message().returning(|_| {
            Err(QueueError::ConnectionFailed {
                message: "down".to_string(),
            })
        });

        let consumer = mock_consumer(service).with_ack_mode(AckMode::AutoAcknowledge);
        let messages = consumer.receive(&handle(), &ReceiveOptions::new()).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_acknowledged());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_acknowledge_failure_is_returned_with_batch() {
        let mut service = MockQueueService::new();
        service.expect_receive_messages().returning(|_, _| Ok(vec![received(None)]));
        service.expect_delete_message().returning(|_| {
            Err(QueueError::ConnectionFailed {
                message: "down".to_string(),
            })
        });

        let consumer = mock_consumer(service).with_ack_mode(AckMode::AutoAcknowledge);
        let batch = consumer
            .receive_batch(&handle(), &ReceiveOptions::new())
            .await
            .unwrap();

        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.acknowledge_failures.len(), 1);
        let (message_id, error) = &batch.acknowledge_failures[0];
        assert_eq!(message_id, &batch.messages[0].message_id);
        assert!(matches!(error, QueueError::ConnectionFailed { .. }));
        assert!(!batch.messages[0].is_acknowledged());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_batch_has_no_acknowledge_failures() {
        let mut service = MockQueueService::new();
        service.expect_receive_messages().returning(|_, _| Ok(vec![received(None)]));
        service.expect_delete_message().never();

        let batch = mock_consumer(service)
            .receive_batch(&handle(), &ReceiveOptions::new())
            .await
            .unwrap();

        assert_eq!(batch.messages.len(), 1);
        assert!(batch.acknowledge_failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_until_returns_empty_on_shutdown() {
        let (consumer, service, queue) = memory_consumer(AckMode::AutoAcknowledge).await;
        let options = ReceiveOptions::new().with_wait(Duration::from_secs(20));

        let started = Instant::now();
        let messages = consumer
            .receive_until(&queue, &options, tokio::time::sleep(Duration::from_secs(2)))
            .await
            .unwrap();

        assert!(messages.is_empty());
        assert!(started.elapsed() < Duration::from_secs(3));

        // Nothing was taken by the abandoned poll
        service
            .send_message(queue.url(), &OutboundMessage::new("later"))
            .await
            .unwrap();
        assert_eq!(service.pending_count(queue.url()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_until_delivers_when_message_arrives_first() {
        let (consumer, service, queue) = memory_consumer(AckMode::Manual).await;
        let options = ReceiveOptions::new().with_wait(Duration::from_secs(20));

        let sender = {
            let service = service.clone();
            let url = queue.url().to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                service
                    .send_message(&url, &OutboundMessage::new("arrived"))
                    .await
                    .unwrap();
            })
        };

        let messages = consumer
            .receive_until(&queue, &options, tokio::time::sleep(Duration::from_secs(10)))
            .await
            .unwrap();
        sender.await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "arrived");
    }
}

// ============================================================================
// Visibility Tests
// ============================================================================

mod visibility {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_release_makes_message_receivable_again() {
        let (consumer, service, queue) = memory_consumer(AckMode::Manual).await;
        service
            .send_message(queue.url(), &OutboundMessage::new("retry me"))
            .await
            .unwrap();

        let first = consumer.receive(&queue, &ReceiveOptions::new()).await.unwrap();
        consumer.release(&first[0]).await.unwrap();

        let second = consumer.receive(&queue, &ReceiveOptions::new()).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message_id, first[0].message_id);
        assert_eq!(second[0].receive_count, 2);

        // The released receipt is dead
        assert!(consumer.acknowledge(&first[0]).await.is_err());
        consumer.acknowledge(&second[0]).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_visibility_keeps_message_hidden() {
        let (consumer, service, queue) = memory_consumer(AckMode::Manual).await;
        service
            .send_message(queue.url(), &OutboundMessage::new("slow"))
            .await
            .unwrap();

        let options = ReceiveOptions::new().with_visibility_timeout(Duration::from_secs(5));
        let messages = consumer.receive(&queue, &options).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        consumer
            .extend_visibility(&messages[0], Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let redelivered = consumer.receive(&queue, &ReceiveOptions::new()).await.unwrap();
        assert!(redelivered.is_empty());
        consumer.acknowledge(&messages[0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_extend_visibility_upper_bound() {
        let mut service = MockQueueService::new();
        service.expect_change_visibility().never();

        let consumer = mock_consumer(service);
        let result = consumer
            .extend_visibility(
                &received(None),
                ReceiveOptions::MAX_VISIBILITY_TIMEOUT + Duration::from_secs(1),
            )
            .await;

        assert!(matches!(result, Err(QueueError::Validation(_))));
    }

    #[tokio::test]
    async fn test_release_after_acknowledge_fails() {
        let mut service = MockQueueService::new();
        service.expect_delete_message().returning(|_| Ok(()));
        service.expect_change_visibility().never();

        let consumer = mock_consumer(service);
        let message = received(None);
        consumer.acknowledge(&message).await.unwrap();

        assert!(matches!(
            consumer.release(&message).await,
            Err(QueueError::AlreadyAcknowledged { .. })
        ));
    }
}
