pub mod secrets_manager;
pub mod sigv4;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroize;

pub use secrets_manager::SecretsManagerClient;

/// Abstraction over remote secret stores.
/// Implementations: AWS Secrets Manager; tests substitute in-memory fakes.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current string value of a secret by name or ARN.
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue, SecretStoreError>;
}

/// A secret payload. Never printed by `Debug`; wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Every way a single retrieval can fail. The resolver treats all of them
/// the same way: the placeholder stays unsubstituted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretStoreError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no AWS credentials found")]
    MissingCredentials,

    #[error("secret has no string payload")]
    NoStringPayload,

    #[error("failed to sign request: {0}")]
    Signing(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl SecretStoreError {
    /// Maps a service error code (the part after `#` in `__type`) to a variant.
    pub fn from_service(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "ResourceNotFoundException" => SecretStoreError::NotFound(message),
            "AccessDeniedException" | "UnrecognizedClientException" => {
                SecretStoreError::AccessDenied(message)
            }
            "ThrottlingException" | "TooManyRequestsException" => {
                SecretStoreError::Throttled(message)
            }
            _ => SecretStoreError::Service {
                code: code.to_string(),
                message,
            },
        }
    }
}
