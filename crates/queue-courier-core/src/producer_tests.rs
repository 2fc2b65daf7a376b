//! Tests for the message producer.

use super::*;
use crate::message::{AttributeValue, QueueName};
use crate::observer::NoopObserver;
use crate::service::MockQueueService;
use std::time::Duration;

fn handle(name: &str) -> QueueHandle {
    QueueHandle::new(
        QueueName::new(name.to_string()).unwrap(),
        format!("url/{}", name),
    )
}

fn validate(handle: &QueueHandle, message: &OutboundMessage) -> Result<(), QueueError> {
    validate_message(handle, message, &ServiceLimits::default())
}

// ============================================================================
// Validation Tests
// ============================================================================

mod validation {
    use super::*;

    #[test]
    fn test_plain_message_is_valid() {
        assert!(validate(&handle("q"), &OutboundMessage::new("hello")).is_ok());
    }

    #[test]
    fn test_empty_body_rejected() {
        let result = validate(&handle("q"), &OutboundMessage::new(""));
        assert!(matches!(
            result,
            Err(QueueError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let limits = ServiceLimits::default();
        let at_limit = OutboundMessage::new("x".repeat(limits.max_message_bytes));
        let over_limit = OutboundMessage::new("x".repeat(limits.max_message_bytes + 1));

        assert!(validate(&handle("q"), &at_limit).is_ok());
        assert!(matches!(
            validate(&handle("q"), &over_limit),
            Err(QueueError::PayloadTooLarge { size, max_size })
                if size == limits.max_message_bytes + 1 && max_size == limits.max_message_bytes
        ));
    }

    #[test]
    fn test_attributes_count_toward_size() {
        let limits = ServiceLimits::default();
        let message = OutboundMessage::new("x".repeat(limits.max_message_bytes - 4))
            .with_string_attribute("k", "v");

        assert!(matches!(
            validate(&handle("q"), &message),
            Err(QueueError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_attribute_count_limit() {
        let mut message = OutboundMessage::new("body");
        for i in 0..10 {
            message = message.with_string_attribute(format!("attr{}", i), "v");
        }
        assert!(validate(&handle("q"), &message).is_ok());

        let message = message.with_string_attribute("attr10", "v");
        assert!(matches!(
            validate(&handle("q"), &message),
            Err(QueueError::TooManyAttributes {
                count: 11,
                max_count: 10
            })
        ));
    }

    #[test]
    fn test_attribute_names() {
        for good in ["path", "line_no", "a.b", "x-y"] {
            let message = OutboundMessage::new("b").with_string_attribute(good, "v");
            assert!(validate(&handle("q"), &message).is_ok(), "{} should pass", good);
        }

        for bad in [".lead", "trail.", "a..b", "sp ace", "AWS.thing", "amazon.x"] {
            let message = OutboundMessage::new("b").with_string_attribute(bad, "v");
            assert!(validate(&handle("q"), &message).is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn test_number_attribute_must_be_decimal() {
        let message =
            OutboundMessage::new("b").with_attribute("n", AttributeValue::Number("ten".to_string()));
        assert!(matches!(
            validate(&handle("q"), &message),
            Err(QueueError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn test_fifo_requires_group() {
        let fifo = handle("ordered.fifo");

        assert!(matches!(
            validate(&fifo, &OutboundMessage::new("b")),
            Err(QueueError::Validation(ValidationError::Required { field })) if field == "group_id"
        ));
        assert!(validate(&fifo, &OutboundMessage::new("b").with_group_id("g1")).is_ok());
    }

    #[test]
    fn test_fifo_rejects_per_message_delay() {
        let message = OutboundMessage::new("b")
            .with_group_id("g")
            .with_delay(Duration::from_secs(1));
        assert!(validate(&handle("ordered.fifo"), &message).is_err());
    }

    #[test]
    fn test_standard_queue_rejects_group() {
        let message = OutboundMessage::new("b").with_group_id("g");
        assert!(validate(&handle("q"), &message).is_err());
    }

    #[test]
    fn test_delay_limit() {
        let ok = OutboundMessage::new("b").with_delay(Duration::from_secs(900));
        let too_long = OutboundMessage::new("b").with_delay(Duration::from_secs(901));

        assert!(validate(&handle("q"), &ok).is_ok());
        assert!(validate(&handle("q"), &too_long).is_err());
    }
}

// ============================================================================
// Send Tests
// ============================================================================

mod send {
    use super::*;

    fn producer(service: MockQueueService) -> Producer {
        Producer::new(Arc::new(service), Arc::new(NoopObserver))
    }

    #[tokio::test]
    async fn test_send_returns_service_message_id() {
        let mut service = MockQueueService::new();
        service.expect_limits().returning(ServiceLimits::default);
        service
            .expect_send_message()
            .withf(|url, message| url == "url/q" && message.body == "hello")
            .times(1)
            .returning(|_, _| Ok("abc-123".parse().unwrap()));

        let id = producer(service)
            .send(&handle("q"), OutboundMessage::new("hello"))
            .await
            .unwrap();

        assert_eq!(id.as_str(), "abc-123");
    }

    #[tokio::test]
    async fn test_invalid_message_never_reaches_service() {
        let mut service = MockQueueService::new();
        service.expect_limits().returning(ServiceLimits::default);
        service.expect_send_message().never();

        let body = "x".repeat(ServiceLimits::default().max_message_bytes + 1);
        let error = producer(service)
            .send(&handle("q"), OutboundMessage::new(body.clone()))
            .await
            .unwrap_err();

        assert!(matches!(error.error(), QueueError::PayloadTooLarge { .. }));
        assert_eq!(error.message().body, body);
    }

    #[tokio::test]
    async fn test_transport_failure_hands_back_message() {
        let mut service = MockQueueService::new();
        service.expect_limits().returning(ServiceLimits::default);
        service.expect_send_message().returning(|_, _| {
            Err(QueueError::ConnectionFailed {
                message: "connection refused".to_string(),
            })
        });

        let message = OutboundMessage::new("keep me").with_string_attribute("k", "v");
        let error = producer(service)
            .send(&handle("q"), message.clone())
            .await
            .unwrap_err();

        assert!(error.error().is_transient());
        assert_eq!(error.into_message(), message);
    }
}
