//! Completion backend errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised by an [`LLMClient`](super::LLMClient) while executing a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in seconds)
    TimeoutError { seconds: u64 },

    /// Rate limit exceeded, retry after the specified duration (in seconds)
    RateLimitError { retry_after: Option<u64> },

    /// The provider answered but the payload carried no usable completion
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Configuration error (missing API keys, unknown model, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    /// Classifies a provider error message into the closest variant.
    ///
    /// Providers surface auth and throttling failures as free text, so this
    /// looks for the status codes and phrases they use.
    pub fn from_provider_message(provider: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("401") || lower.contains("unauthorized") || lower.contains("api key") {
            BackendError::AuthenticationError {
                message: format!("{}: {}", provider, message),
            }
        } else if lower.contains("429") || lower.contains("rate limit") {
            BackendError::RateLimitError { retry_after: None }
        } else if lower.contains("connection") || lower.contains("dns") {
            BackendError::NetworkError {
                message: format!("{}: {}", provider, message),
            }
        } else {
            BackendError::ApiError {
                message: format!("{} request failed: {}", provider, message),
                status_code: None,
            }
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from LLM: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status_code() {
        let err = BackendError::ApiError {
            message: "bad gateway".to_string(),
            status_code: Some(502),
        };
        assert_eq!(err.to_string(), "API error (502): bad gateway");
    }

    #[test]
    fn test_classifies_provider_messages() {
        assert!(matches!(
            BackendError::from_provider_message("OpenAI", "HTTP 401 Unauthorized"),
            BackendError::AuthenticationError { .. }
        ));
        assert!(matches!(
            BackendError::from_provider_message("OpenAI", "429 Too Many Requests"),
            BackendError::RateLimitError { .. }
        ));
        assert!(matches!(
            BackendError::from_provider_message("Ollama", "connection refused"),
            BackendError::NetworkError { .. }
        ));
        assert!(matches!(
            BackendError::from_provider_message("Ollama", "model not found"),
            BackendError::ApiError { .. }
        ));
    }
}
