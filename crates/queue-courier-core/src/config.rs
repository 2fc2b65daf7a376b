//! Connection configuration.
//!
//! There are no built-in connection defaults: the endpoint, region and
//! credentials for a remote service always come from the caller.

use crate::consumer::AckMode;
use crate::error::ConfigurationError;
use crate::service::ServiceKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Configuration for a [`QueueClient`](crate::client::QueueClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub ack_mode: AckMode,
}

impl ClientConfig {
    /// Create a configuration for the given provider with manual acknowledgement
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            ack_mode: AckMode::Manual,
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.provider.validate()
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Sqs(SqsConfig),
    InMemory(InMemoryConfig),
}

impl ProviderConfig {
    /// Service kind this configuration connects to
    pub fn kind(&self) -> ServiceKind {
        match self {
            Self::Sqs(_) => ServiceKind::Sqs,
            Self::InMemory(_) => ServiceKind::InMemory,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::Sqs(config) => config.validate(),
            Self::InMemory(config) => config.validate(),
        }
    }
}

/// SQS-compatible service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqsConfig {
    /// Host (and optional port) or full URL of the service
    pub endpoint: String,
    /// Region used in request signing
    pub region: String,
    pub credentials: Credentials,
    /// Use HTTPS; must agree with the scheme if `endpoint` is a full URL
    pub use_tls: bool,
    /// Per-request timeout, extended by the long-poll wait on receive
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

impl SqsConfig {
    /// Request timeout applied when none is configured
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Effective per-request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(Self::DEFAULT_REQUEST_TIMEOUT)
    }

    /// Base URL all requests are sent to
    pub fn base_url(&self) -> Result<Url, ConfigurationError> {
        let scheme = if self.use_tls { "https" } else { "http" };
        let endpoint = self.endpoint.trim();

        let url = if endpoint.contains("://") {
            Url::parse(endpoint)
        } else {
            Url::parse(&format!("{}://{}", scheme, endpoint))
        }
        .map_err(|e| ConfigurationError::Invalid {
            message: format!("endpoint '{}' is not a valid URL: {}", self.endpoint, e),
        })?;

        if url.scheme() != scheme {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "endpoint scheme '{}' does not match use_tls = {}",
                    url.scheme(),
                    self.use_tls
                ),
            });
        }

        if url.host_str().is_none() {
            return Err(ConfigurationError::Invalid {
                message: format!("endpoint '{}' has no host", self.endpoint),
            });
        }

        Ok(url)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "endpoint".to_string(),
            });
        }

        if self.region.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "region".to_string(),
            });
        }

        self.credentials.validate()?;

        if self.request_timeout_seconds == Some(0) {
            return Err(ConfigurationError::Invalid {
                message: "request_timeout_seconds must be greater than zero".to_string(),
            });
        }

        self.base_url().map(|_| ())
    }
}

/// Access key pair used to sign requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Secret::new(secret_access_key.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.access_key_id.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "credentials.access_key_id".to_string(),
            });
        }

        if self.secret_access_key.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "credentials.secret_access_key".to_string(),
            });
        }

        Ok(())
    }
}

/// Secret string that is wiped on drop and never printed
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Get the secret (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

/// In-memory service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Visibility timeout for queues that do not set one
    pub default_visibility_timeout_seconds: u64,
    /// Message size limit for queues that do not set MaximumMessageSize
    pub max_message_bytes: usize,
    /// FIFO deduplication window
    pub deduplication_window_seconds: u64,
    /// How long a deleted or expired receipt is remembered, so a late
    /// acknowledge can be told which of the two happened
    pub receipt_retention_seconds: u64,
}

impl InMemoryConfig {
    pub fn default_visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.default_visibility_timeout_seconds)
    }

    pub fn deduplication_window(&self) -> Duration {
        Duration::from_secs(self.deduplication_window_seconds)
    }

    pub fn receipt_retention(&self) -> Duration {
        Duration::from_secs(self.receipt_retention_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_message_bytes == 0 {
            return Err(ConfigurationError::Invalid {
                message: "max_message_bytes must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            default_visibility_timeout_seconds: 30,
            max_message_bytes: 256 * 1024,
            deduplication_window_seconds: 5 * 60,
            receipt_retention_seconds: 5 * 60,
        }
    }
}
