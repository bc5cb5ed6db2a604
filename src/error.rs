//! Gateway Error Types
//!
//! Errors surfaced by the routing core and by provider clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single provider call.
///
/// These are per-model and transient from the router's point of view: they are
/// recorded against the model's health and trigger a fallback to the next model.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider asked us to back off
    #[error("Rate limited by '{provider}'")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// Provider is down or returned a server error
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Authentication failed
    #[error("Authentication failed: {0}. Check your API key.")]
    Auth(String),

    /// HTTP request failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Response parsing failed
    #[error("Response error: {0}")]
    Response(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The caller cancelled the request while it was in flight
    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether this error is the provider throttling us
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::Unavailable(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ProviderError::Response(format!("Failed to decode response: {}", err))
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Response(format!("JSON parsing error: {}", err))
    }
}

/// Main error type for gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors, detected while building routers
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider type not present in the registry
    #[error("Provider '{0}' not found. Register it in the provider registry before building routers.")]
    ProviderNotFound(String),

    /// Router ID not known to the manager
    #[error("Router '{0}' not found")]
    RouterNotFound(String),

    /// Every retry attempt ran out of healthy models
    #[error("No model was available to handle the request. Try to configure more fallback models.")]
    NoModelAvailable,

    /// The pool asked for is empty (e.g. no model supports streaming)
    #[error("No models configured for router")]
    NoModelConfigured,

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// A provider error that escaped the router (e.g. during config building)
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl GatewayError {
    /// Classify into the stable kind exposed to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NoModelAvailable => ErrorKind::NoModelAvailable,
            GatewayError::NoModelConfigured => ErrorKind::NoModelConfigured,
            GatewayError::Cancelled => ErrorKind::Cancelled,
            GatewayError::Provider(ProviderError::Cancelled) => ErrorKind::Cancelled,
            GatewayError::Provider(_) => ErrorKind::ModelUnavailable,
            _ => ErrorKind::UnknownError,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Config(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Config(format!("IO error: {}", err))
    }
}

/// Stable error classification exposed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoModelConfigured,
    ModelUnavailable,
    NoModelAvailable,
    Cancelled,
    UnknownError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NoModelConfigured => "no_model_configured",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::NoModelAvailable => "no_model_available",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::UnknownError => "unknown_error",
        };
        f.write_str(name)
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            GatewayError::NoModelAvailable.kind(),
            ErrorKind::NoModelAvailable
        );
        assert_eq!(GatewayError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            GatewayError::Provider(ProviderError::Unavailable("down".into())).kind(),
            ErrorKind::ModelUnavailable
        );
        assert_eq!(
            GatewayError::Config("bad".into()).kind(),
            ErrorKind::UnknownError
        );
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::NoModelAvailable).unwrap();
        assert_eq!(json, "\"no_model_available\"");
        assert_eq!(ErrorKind::ModelUnavailable.to_string(), "model_unavailable");
    }

    #[test]
    fn test_rate_limit_message_hides_retry_after() {
        let err = ProviderError::RateLimited {
            provider: "openai".into(),
            retry_after: Some(Duration::from_secs(30)),
        };

        assert!(err.is_rate_limit());
        assert_eq!(err.to_string(), "Rate limited by 'openai'");
    }
}
