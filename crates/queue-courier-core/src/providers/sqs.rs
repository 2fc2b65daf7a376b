//! SQS-compatible queue service over HTTP.
//!
//! Speaks the SQS query protocol directly instead of going through an SDK,
//! so the same code works against AWS and against local emulators, and unit
//! tests can mock the HTTP responses.
//!
//! ## Wire format
//!
//! - Every request is a form-encoded `POST` to the configured endpoint with
//!   `Action` and `Version=2012-11-05`; queue-scoped actions carry `QueueUrl`
//! - Responses and errors are XML
//! - Requests are signed with AWS Signature Version 4
//!
//! ## Message attributes
//!
//! Typed attributes travel as `MessageAttribute.N.Name`,
//! `MessageAttribute.N.Value.DataType` and either `.StringValue` or
//! `.BinaryValue` (base64). Receives ask for all system and message
//! attributes.

use crate::config::SqsConfig;
use crate::error::{ConfigurationError, QueueError};
use crate::message::{
    AttributeValue, MessageAttributes, MessageId, OutboundMessage, QueueName, ReceiptHandle,
    ReceiveOptions, ReceivedMessage, Timestamp,
};
use crate::queue::QueueAttributes;
use crate::service::{QueueService, ServiceKind, ServiceLimits};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;

/// Query API version sent with every request
const API_VERSION: &str = "2012-11-05";

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
struct SigV4Signer {
    access_key: String,
    secret_key: String,
    region: String,
    service: String,
}

impl SigV4Signer {
    fn new(access_key: String, secret_key: String, region: String) -> Self {
        Self {
            access_key,
            secret_key,
            region,
            service: "sqs".to_string(),
        }
    }

    /// Sign a request, returning the headers to add to it
    ///
    /// `host` must be exactly what is sent in the `Host` header, including a
    /// non-default port.
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>, QueueError> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Parameters travel in the body, so the canonical query is empty
        let canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let signed_headers = "host;x-amz-date";
        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, path, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp)?;

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        Ok(vec![("Authorization", authorization), ("x-amz-date", amz_date)])
    }

    /// Derive the signing key and sign
    ///
    /// kSecret = "AWS4" + secret, then HMAC over date, region, service and
    /// "aws4_request" in turn; the result signs `string_to_sign`.
    fn calculate_signature(
        &self,
        string_to_sign: &str,
        date_stamp: &str,
    ) -> Result<String, QueueError> {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;

        Ok(hex::encode(signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, QueueError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| QueueError::AuthenticationFailed {
            message: format!("Failed to initialise request signer: {}", e),
        })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ============================================================================
// Service Faults
// ============================================================================

/// Error document returned by the service
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceFault {
    status: u16,
    code: String,
    message: String,
}

impl ServiceFault {
    fn parse(xml: &str, status: u16) -> Self {
        let mut code = None;
        let mut message = None;

        // A malformed error body still yields a fault with the status code
        let _ = walk_elements(xml, |path, text| {
            match path {
                [.., error, leaf] if error == "Error" && leaf == "Code" => {
                    code = Some(text.trim().to_string())
                }
                [.., error, leaf] if error == "Error" && leaf == "Message" => {
                    message = Some(text.trim().to_string())
                }
                _ => {}
            }
            Ok(())
        });

        Self {
            status,
            code: code.unwrap_or_else(|| format!("HTTP{}", status)),
            message: message.unwrap_or_else(|| "Unknown error".to_string()),
        }
    }

    /// Map the fault for an operation on the queue or message named `subject`
    fn into_queue_error(self, subject: &str) -> QueueError {
        match self.code.as_str() {
            "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
                QueueError::QueueNotFound {
                    queue_name: subject.to_string(),
                }
            }
            "QueueAlreadyExists" | "QueueNameExists" => QueueError::QueueConflict {
                queue_name: subject.to_string(),
                message: self.message,
            },
            "InvalidClientTokenId"
            | "UnrecognizedClientException"
            | "SignatureDoesNotMatch"
            | "MissingAuthenticationToken"
            | "AccessDenied" => QueueError::AuthenticationFailed {
                message: format!("{}: {}", self.code, self.message),
            },
            _ if self.status == 401 || self.status == 403 => QueueError::AuthenticationFailed {
                message: format!("{}: {}", self.code, self.message),
            },
            _ => QueueError::TransportFailed {
                code: self.code,
                message: self.message,
            },
        }
    }

    /// Map the fault for an operation on a received message
    fn into_receipt_error(self, receipt: &ReceiptHandle) -> QueueError {
        match self.code.as_str() {
            "ReceiptHandleIsInvalid" | "InvalidReceiptHandle" | "MessageNotInflight" => {
                QueueError::ReceiptExpired {
                    message_id: receipt.message_id().to_string(),
                }
            }
            _ => self.into_queue_error(receipt.queue_url()),
        }
    }
}

/// Why a request did not produce a successful response
#[derive(Debug)]
enum RequestFailure {
    /// The request never got a response
    Transport(QueueError),
    /// The service answered with an error document
    Fault(ServiceFault),
}

impl RequestFailure {
    fn into_queue_error(self, subject: &str) -> QueueError {
        match self {
            Self::Transport(e) => e,
            Self::Fault(fault) => fault.into_queue_error(subject),
        }
    }

    fn into_receipt_error(self, receipt: &ReceiptHandle) -> QueueError {
        match self {
            Self::Transport(e) => e,
            Self::Fault(fault) => fault.into_receipt_error(receipt),
        }
    }
}

// ============================================================================
// XML Parsing
// ============================================================================

fn malformed_response(message: impl fmt::Display) -> QueueError {
    QueueError::TransportFailed {
        code: "MalformedResponse".to_string(),
        message: message.to_string(),
    }
}

/// Walk an XML document, calling `on_end` as each element closes
///
/// `on_end` receives the element path from the root (local names only) and
/// the text collected since the element's last child opened or closed.
fn walk_elements<F>(xml: &str, mut on_end: F) -> Result<(), QueueError>
where
    F: FnMut(&[String], &str) -> Result<(), QueueError>,
{
    let mut reader = Reader::from_str(xml);
    // Bodies are significant text; do not trim
    reader.trim_text(false);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                text.clear();
            }
            Ok(Event::Empty(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                on_end(&path, "")?;
                path.pop();
                text.clear();
            }
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().map_err(malformed_response)?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                on_end(&path, &text)?;
                path.pop();
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed_response(format!("XML parsing error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Text of the first element named `name`
fn find_element(xml: &str, name: &str) -> Result<Option<String>, QueueError> {
    let mut found = None;
    walk_elements(xml, |path, text| {
        if found.is_none() && path.last().is_some_and(|leaf| leaf == name) {
            found = Some(text.trim().to_string());
        }
        Ok(())
    })?;
    Ok(found)
}

fn require_element(xml: &str, name: &str) -> Result<String, QueueError> {
    find_element(xml, name)?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed_response(format!("{} not found in response", name)))
}

/// Message being assembled while walking a receive response
#[derive(Default)]
struct PartialMessage {
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: String,
    attributes: MessageAttributes,
    group_id: Option<String>,
    receive_count: u32,
    // Current <Attribute> or <MessageAttribute>
    entry_name: Option<String>,
    entry_value: Option<String>,
    entry_data_type: Option<String>,
    entry_binary: Option<String>,
}

impl PartialMessage {
    fn finish_system_attribute(&mut self) {
        let (Some(name), Some(value)) = (self.entry_name.take(), self.entry_value.take()) else {
            return;
        };

        match name.as_str() {
            "ApproximateReceiveCount" => {
                self.receive_count = value.trim().parse().unwrap_or(1);
            }
            "MessageGroupId" => self.group_id = Some(value),
            _ => {}
        }
    }

    fn finish_message_attribute(&mut self) -> Result<(), QueueError> {
        let name = self.entry_name.take();
        let value = self.entry_value.take();
        let binary = self.entry_binary.take();
        let data_type = self.entry_data_type.take();

        let Some(name) = name else {
            return Ok(());
        };

        // Custom types ("Number.int", "Binary.gif") carry their base type first
        let data_type = data_type.unwrap_or_else(|| "String".to_string());
        let base_type = data_type.split('.').next().unwrap_or("String");

        let value = match base_type {
            "Number" => AttributeValue::Number(value.unwrap_or_default()),
            "Binary" => {
                let encoded = binary.unwrap_or_default();
                let decoded = STANDARD.decode(encoded.trim()).map_err(|e| {
                    malformed_response(format!("attribute '{}' is not base64: {}", name, e))
                })?;
                AttributeValue::Binary(decoded.into())
            }
            _ => AttributeValue::String(value.unwrap_or_default()),
        };

        self.attributes.insert(name, value);
        Ok(())
    }
}

fn parse_received_messages(
    xml: &str,
    queue_url: &str,
    visible_until: Option<Instant>,
) -> Result<Vec<ReceivedMessage>, QueueError> {
    let mut messages = Vec::new();
    let mut current: Option<PartialMessage> = None;

    walk_elements(xml, |path, text| {
        let leaf = match path.last() {
            Some(leaf) => leaf.as_str(),
            None => return Ok(()),
        };
        let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
        let in_entry = path.iter().any(|p| p == "Attribute" || p == "MessageAttribute");

        if leaf == "Message" {
            let Some(partial) = current.take() else {
                return Ok(());
            };
            messages.push(build_received_message(partial, queue_url, visible_until)?);
            return Ok(());
        }

        // Elements close innermost first, so the message opens on whichever
        // descendant closes first
        let inside_message = path[..path.len() - 1].iter().any(|p| p == "Message");
        if current.is_none() && inside_message {
            current = Some(PartialMessage::default());
        }
        let Some(partial) = current.as_mut() else {
            return Ok(());
        };

        match (parent, leaf) {
            (Some("Message"), "MessageId") => partial.message_id = Some(text.trim().to_string()),
            (Some("Message"), "ReceiptHandle") => {
                partial.receipt_handle = Some(text.trim().to_string())
            }
            (Some("Message"), "Body") => partial.body = text.to_string(),
            (Some("Message"), "Attribute") => partial.finish_system_attribute(),
            (Some("Message"), "MessageAttribute") => partial.finish_message_attribute()?,
            (Some("Attribute"), "Name") | (Some("MessageAttribute"), "Name") => {
                partial.entry_name = Some(text.trim().to_string())
            }
            (Some("Attribute"), "Value") => partial.entry_value = Some(text.to_string()),
            (Some("Value"), "StringValue") if in_entry => {
                partial.entry_value = Some(text.to_string())
            }
            (Some("Value"), "BinaryValue") if in_entry => {
                partial.entry_binary = Some(text.to_string())
            }
            (Some("Value"), "DataType") if in_entry => {
                partial.entry_data_type = Some(text.trim().to_string())
            }
            _ => {}
        }

        Ok(())
    })?;

    Ok(messages)
}

fn build_received_message(
    partial: PartialMessage,
    queue_url: &str,
    visible_until: Option<Instant>,
) -> Result<ReceivedMessage, QueueError> {
    let message_id = partial
        .message_id
        .as_deref()
        .map(MessageId::from_str)
        .transpose()
        .map_err(malformed_response)?
        .ok_or_else(|| malformed_response("Message without MessageId"))?;

    let token = partial
        .receipt_handle
        .filter(|token| !token.is_empty())
        .ok_or_else(|| malformed_response(format!("Message '{}' without ReceiptHandle", message_id)))?;

    let receipt_handle = ReceiptHandle::new(
        token,
        queue_url.to_string(),
        message_id.clone(),
        visible_until,
    );

    Ok(ReceivedMessage {
        message_id,
        body: partial.body,
        attributes: partial.attributes,
        group_id: partial.group_id,
        receive_count: partial.receive_count.max(1),
        received_at: Timestamp::now(),
        receipt_handle,
    })
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Form parameters for one action
struct Params(Vec<(String, String)>);

impl Params {
    fn action(action: &str) -> Self {
        Self(vec![
            ("Action".to_string(), action.to_string()),
            ("Version".to_string(), API_VERSION.to_string()),
        ])
    }

    fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn push_message_attributes(params: &mut Params, attributes: &MessageAttributes) {
    for (index, (name, value)) in attributes.iter().enumerate() {
        let prefix = format!("MessageAttribute.{}", index + 1);
        params.push(format!("{}.Name", prefix), name.clone());
        params.push(format!("{}.Value.DataType", prefix), value.data_type());

        match value {
            AttributeValue::String(text) | AttributeValue::Number(text) => {
                params.push(format!("{}.Value.StringValue", prefix), text.clone());
            }
            AttributeValue::Binary(bytes) => {
                params.push(format!("{}.Value.BinaryValue", prefix), STANDARD.encode(bytes));
            }
        }
    }
}

/// Whole seconds, rounding any fraction up
fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

// ============================================================================
// SQS Queue Service
// ============================================================================

/// Queue service backed by an SQS-compatible HTTP endpoint
///
/// The service is cheap to share across tasks with `Arc`; the HTTP client
/// pools connections internally.
pub struct SqsQueueService {
    http_client: HttpClient,
    signer: SigV4Signer,
    endpoint: Url,
    host: String,
    request_timeout: Duration,
}

impl SqsQueueService {
    /// Create a service for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] if the endpoint or credentials
    /// are invalid, or [`QueueError::ConnectionFailed`] if the HTTP client
    /// cannot be built.
    pub fn new(config: SqsConfig) -> Result<Self, QueueError> {
        config.validate()?;
        let endpoint = config.base_url()?;

        let host_name = endpoint.host_str().ok_or_else(|| ConfigurationError::Invalid {
            message: format!("endpoint '{}' has no host", config.endpoint),
        })?;
        let host = match endpoint.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };

        let signer = SigV4Signer::new(
            config.credentials.access_key_id.clone(),
            config.credentials.secret_access_key.expose_secret().to_string(),
            config.region.clone(),
        );

        let http_client = HttpClient::builder()
            .build()
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
            host,
            request_timeout: config.request_timeout(),
        })
    }

    /// Endpoint all requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(
        &self,
        params: Params,
        extra_timeout: Duration,
    ) -> Result<String, RequestFailure> {
        let body = params.encode();
        let timestamp = Utc::now();
        let headers = self
            .signer
            .sign_request("POST", &self.host, self.endpoint.path(), &body, &timestamp)
            .map_err(RequestFailure::Transport)?;

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .timeout(self.request_timeout + extra_timeout)
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8");

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.body(body).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request timeout: {}", e)
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                format!("HTTP request failed: {}", e)
            };
            RequestFailure::Transport(QueueError::ConnectionFailed { message })
        })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| {
            RequestFailure::Transport(QueueError::ConnectionFailed {
                message: format!("Failed to read response body: {}", e),
            })
        })?;

        if !status.is_success() {
            let fault = ServiceFault::parse(&response_body, status.as_u16());
            debug!(status = status.as_u16(), code = %fault.code, "Service returned an error");
            return Err(RequestFailure::Fault(fault));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for SqsQueueService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueueService")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.signer.region)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn get_queue_url(&self, name: &QueueName) -> Result<String, QueueError> {
        let params = Params::action("GetQueueUrl").with("QueueName", name.as_str());

        let response = self
            .request(params, Duration::ZERO)
            .await
            .map_err(|f| f.into_queue_error(name.as_str()))?;

        require_element(&response, "QueueUrl")
    }

    async fn create_queue(
        &self,
        name: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<String, QueueError> {
        let mut params = Params::action("CreateQueue").with("QueueName", name.as_str());
        for (index, (key, value)) in attributes.iter().enumerate() {
            params.push(format!("Attribute.{}.Name", index + 1), key);
            params.push(format!("Attribute.{}.Value", index + 1), value);
        }

        let response = self
            .request(params, Duration::ZERO)
            .await
            .map_err(|f| f.into_queue_error(name.as_str()))?;

        require_element(&response, "QueueUrl")
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError> {
        let params = Params::action("DeleteQueue").with("QueueUrl", queue_url);

        self.request(params, Duration::ZERO)
            .await
            .map_err(|f| f.into_queue_error(queue_url))?;
        Ok(())
    }

    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutboundMessage,
    ) -> Result<MessageId, QueueError> {
        let mut params = Params::action("SendMessage")
            .with("QueueUrl", queue_url)
            .with("MessageBody", message.body.as_str());

        if let Some(delay) = message.delay {
            params.push("DelaySeconds", ceil_seconds(delay).to_string());
        }
        if let Some(group_id) = &message.group_id {
            params.push("MessageGroupId", group_id.as_str());
        }
        if let Some(dedup_id) = &message.deduplication_id {
            params.push("MessageDeduplicationId", dedup_id.as_str());
        }
        push_message_attributes(&mut params, &message.attributes);

        let response = self
            .request(params, Duration::ZERO)
            .await
            .map_err(|f| f.into_queue_error(queue_url))?;

        let message_id = require_element(&response, "MessageId")?;
        MessageId::from_str(&message_id).map_err(malformed_response)
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        options.validate()?;

        let mut params = Params::action("ReceiveMessage")
            .with("QueueUrl", queue_url)
            .with("MaxNumberOfMessages", options.max_messages.to_string())
            .with("WaitTimeSeconds", ceil_seconds(options.wait).to_string())
            .with("AttributeName.1", "All")
            .with("MessageAttributeName.1", "All");

        if let Some(timeout) = options.visibility_timeout {
            params.push("VisibilityTimeout", ceil_seconds(timeout).to_string());
        }

        // The deadline counts from before the request so it never overshoots
        let started = Instant::now();
        let visible_until = options.visibility_timeout.map(|timeout| started + timeout);

        let response = self
            .request(params, options.wait)
            .await
            .map_err(|f| f.into_queue_error(queue_url))?;

        let messages = parse_received_messages(&response, queue_url, visible_until)?;
        if messages.len() > options.max_messages as usize {
            warn!(
                requested = options.max_messages,
                received = messages.len(),
                "Service returned more messages than requested"
            );
        }
        Ok(messages)
    }

    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let params = Params::action("DeleteMessage")
            .with("QueueUrl", receipt.queue_url())
            .with("ReceiptHandle", receipt.token());

        self.request(params, Duration::ZERO)
            .await
            .map_err(|f| f.into_receipt_error(receipt))?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        let params = Params::action("ChangeMessageVisibility")
            .with("QueueUrl", receipt.queue_url())
            .with("ReceiptHandle", receipt.token())
            .with("VisibilityTimeout", ceil_seconds(timeout).to_string());

        self.request(params, Duration::ZERO)
            .await
            .map_err(|f| f.into_receipt_error(receipt))?;
        Ok(())
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Sqs
    }

    fn limits(&self) -> ServiceLimits {
        ServiceLimits::default()
    }
}
