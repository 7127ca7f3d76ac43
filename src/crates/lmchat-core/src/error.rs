//! Error types shared by the host contracts.
//!
//! Provider crates define their own richer error enums and convert into
//! [`CoreError`] at the [`ChatModel`](crate::llm::ChatModel) boundary, so the
//! host only ever has to deal with one error type.
//!
//! ```text
//! CoreError
//! ├── Client            - Vendor client error, boxed unmodified
//! ├── Provider          - Failure reported by a chat model client
//! ├── Configuration     - Invalid node options or client settings
//! ├── Credentials       - Missing or malformed credentials
//! ├── MissingParameter  - Node parameter absent from the host
//! ├── Serialization     - JSON encode/decode failures
//! ├── Callback          - Callback handler failure (never propagated by dispatch)
//! └── Other             - Anything else
//! ```

use thiserror::Error;

/// Result type for host contract operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced to the workflow host.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A vendor client error, kept intact so the host can downcast it.
    #[error(transparent)]
    Client(Box<dyn std::error::Error + Send + Sync>),

    /// The underlying chat model client failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials could not be resolved or parsed.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// A required node parameter was not supplied by the host.
    #[error("Missing node parameter: {0}")]
    MissingParameter(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A callback handler failed.
    #[error("Callback error: {0}")]
    Callback(String),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a provider error from anything displayable.
    pub fn provider(msg: impl Into<String>) -> Self {
        CoreError::Provider(msg.into())
    }

    /// Create a configuration error from anything displayable.
    pub fn configuration(msg: impl Into<String>) -> Self {
        CoreError::Configuration(msg.into())
    }

    /// Borrow the wrapped vendor error as `T`, if that is what it is.
    pub fn client_error<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            CoreError::Client(inner) => inner.downcast_ref::<T>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CoreError::provider("connection refused").to_string(),
            "Provider error: connection refused"
        );
        assert_eq!(
            CoreError::MissingParameter("model".into()).to_string(),
            "Missing node parameter: model"
        );
    }

    #[test]
    fn test_client_error_downcast() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = CoreError::Client(Box::new(io));
        assert_eq!(err.to_string(), "socket closed");
        assert!(err.client_error::<std::io::Error>().is_some());
        assert!(CoreError::provider("x").client_error::<std::io::Error>().is_none());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Serialization(_)));
    }
}
