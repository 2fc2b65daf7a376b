//! Tests for error types.

use super::*;
use crate::message::OutboundMessage;

#[test]
fn test_error_transience() {
    assert!(QueueError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(QueueError::TransportFailed {
        code: "InternalError".to_string(),
        message: "try again".to_string(),
    }
    .is_transient());

    assert!(!QueueError::QueueNotFound {
        queue_name: "test".to_string(),
    }
    .is_transient());

    assert!(!QueueError::PayloadTooLarge {
        size: 1000,
        max_size: 500
    }
    .is_transient());

    assert!(!QueueError::AlreadyAcknowledged {
        message_id: "m-1".to_string(),
    }
    .is_transient());
}

#[test]
fn test_retry_suggestions() {
    let connection = QueueError::ConnectionFailed {
        message: "refused".to_string(),
    };
    assert_eq!(connection.retry_after(), Some(Duration::from_secs(5)));

    let not_found = QueueError::QueueNotFound {
        queue_name: "test".to_string(),
    };
    assert_eq!(not_found.retry_after(), None);
}

#[test]
fn test_caller_errors_are_local_failures() {
    assert!(QueueError::PayloadTooLarge {
        size: 2,
        max_size: 1
    }
    .is_caller_error());
    assert!(QueueError::from(ValidationError::Required {
        field: "body".to_string()
    })
    .is_caller_error());

    assert!(!QueueError::ConnectionFailed {
        message: "refused".to_string()
    }
    .is_caller_error());
    assert!(!QueueError::QueueConflict {
        queue_name: "q".to_string(),
        message: "differs".to_string()
    }
    .is_caller_error());
}

#[test]
fn test_codec_error_converts_to_malformed_payload() {
    let error: QueueError = CodecError::MissingAttribute {
        key: "line".to_string(),
    }
    .into();

    assert!(matches!(
        error,
        QueueError::MalformedPayload(CodecError::MissingAttribute { .. })
    ));
    assert!(error.to_string().contains("'line'"));
}

mod send_error {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_send_error_returns_the_unsent_message() {
        let message = OutboundMessage::new("payload").with_string_attribute("k", "v");
        let error = SendError::new(
            QueueError::ConnectionFailed {
                message: "refused".to_string(),
            },
            message.clone(),
        );

        assert_eq!(error.message(), &message);
        assert!(matches!(error.error(), QueueError::ConnectionFailed { .. }));
        assert!(error.source().is_some());

        let (source, unsent) = error.into_parts();
        assert!(matches!(source, QueueError::ConnectionFailed { .. }));
        assert_eq!(unsent.body, "payload");
    }

    #[test]
    fn test_send_error_converts_into_queue_error() {
        let error = SendError::new(
            QueueError::PayloadTooLarge {
                size: 10,
                max_size: 5,
            },
            OutboundMessage::new("x"),
        );

        let queue_error: QueueError = error.into();
        assert!(matches!(queue_error, QueueError::PayloadTooLarge { size: 10, .. }));
    }
}
