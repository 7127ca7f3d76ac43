//! Error types for the vendor clients and node adapters.

use lmchat_core::CoreError;
use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when working with LLM providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Model not found or unavailable.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Provider service unavailable (e.g., Ollama not running).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid response from provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request was aborted through its signal or the client's `abort()`.
    #[error("Request aborted")]
    Aborted,

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => !e.is_builder() && !e.is_decode(),
            LlmError::ServiceUnavailable(_) | LlmError::RateLimitExceeded(_) => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// Map a non-success HTTP status and body onto an error variant.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::AuthenticationError(body),
            404 => LlmError::ModelNotFound(body),
            429 => LlmError::RateLimitExceeded(body),
            400 | 422 => LlmError::InvalidRequest(body),
            500..=599 => {
                LlmError::ServiceUnavailable(format!("{} API error {}: {}", provider, status, body))
            }
            _ => LlmError::ProviderError(format!("{} API error {}: {}", provider, status, body)),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

/// Vendor errors cross into the host unmodified, boxed for downcasting.
impl From<LlmError> for CoreError {
    fn from(err: LlmError) -> Self {
        CoreError::Client(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LlmError::from_status("Ollama", StatusCode::UNAUTHORIZED, "no".into()),
            LlmError::AuthenticationError(_)
        ));
        assert!(matches!(
            LlmError::from_status("Ollama", StatusCode::NOT_FOUND, "model 'x' not found".into()),
            LlmError::ModelNotFound(_)
        ));
        assert!(matches!(
            LlmError::from_status("OpenAI", StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            LlmError::RateLimitExceeded(_)
        ));
        assert!(matches!(
            LlmError::from_status("OpenAI", StatusCode::BAD_GATEWAY, "".into()),
            LlmError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::RateLimitExceeded("x".into()).is_retryable());
        assert!(LlmError::ServiceUnavailable("x".into()).is_retryable());
        assert!(!LlmError::AuthenticationError("x".into()).is_retryable());
        assert!(!LlmError::Aborted.is_retryable());
        assert!(LlmError::ApiKeyNotFound("OPENAI_API_KEY".into()).is_auth_error());
    }

    #[test]
    fn test_conversion_preserves_error() {
        let core: CoreError = LlmError::ModelNotFound("llama3.2".into()).into();
        assert_eq!(core.to_string(), "Model not found: llama3.2");
        assert!(matches!(
            core.client_error::<LlmError>(),
            Some(LlmError::ModelNotFound(_))
        ));
    }
}
