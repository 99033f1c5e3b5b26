//! Language model client
//!
//! The conversation core only needs one operation: turn an ordered message
//! list into generated text. Transports implement [`ChatModel`].

mod openai;

use async_trait::async_trait;
use thiserror::Error;

use crate::Result;
use crate::context::Message;

pub use openai::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, OpenAiChat};

/// Sampling parameters for a single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Up to 4 stop sequences
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
        }
    }
}

impl GenerationParams {
    /// Parameters for conversational replies (short answers)
    #[must_use]
    pub fn conversation(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            ..Self::default()
        }
    }

    /// Parameters for archive summaries
    #[must_use]
    pub fn summary(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }
}

/// Provider-side failures of a completion request
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider throttled the request (HTTP 429)
    #[error("language model rate limited: {0}")]
    RateLimited(String),

    /// Credentials rejected (HTTP 401/403)
    #[error("language model rejected credentials: {0}")]
    Unauthorized(String),

    /// Request was malformed (HTTP 400/422)
    #[error("language model rejected request: {0}")]
    BadRequest(String),

    /// Any other non-success status
    #[error("language model error {status}: {body}")]
    Provider { status: u16, body: String },

    /// Success status but no choice with content
    #[error("language model returned no content")]
    EmptyResponse,
}

impl LlmError {
    /// Classify a non-success HTTP status and body
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited(body),
            401 | 403 => Self::Unauthorized(body),
            400 | 422 => Self::BadRequest(body),
            _ => Self::Provider { status, body },
        }
    }
}

/// A chat-completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply for the given messages
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Llm`] for provider failures and
    /// [`crate::Error::Http`] when the transport fails
    async fn generate(&self, messages: &[Message], params: &GenerationParams) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            LlmError::from_status(429, "slow down".into()),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status(401, String::new()),
            LlmError::Unauthorized(_)
        ));
        assert!(matches!(
            LlmError::from_status(400, String::new()),
            LlmError::BadRequest(_)
        ));
        assert!(matches!(
            LlmError::from_status(503, String::new()),
            LlmError::Provider { status: 503, .. }
        ));
    }

    #[test]
    fn summary_params_keep_sampling_defaults() {
        let params = GenerationParams::summary(100);
        assert_eq!(params.max_tokens, 100);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!(params.stop.is_empty());
    }
}
