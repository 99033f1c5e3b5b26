//! OpenAI-compatible chat completions over HTTP

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatModel, GenerationParams, LlmError};
use crate::context::Message;
use crate::{Error, Result};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Chat client for `OpenAI` and compatible endpoints
#[derive(Debug)]
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiChat {
    /// Create a chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat completions".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different compatible endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role().wire_name(),
            name: msg.speaker().and_then(wire_name),
            content: msg.content(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Sanitize a speaker name for the `name` field (`[A-Za-z0-9_-]{1,64}`)
fn wire_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn generate(&self, messages: &[Message], params: &GenerationParams) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stop: &params.stop,
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            max_tokens = params.max_tokens,
            "sending chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "chat completion failed");
            return Err(LlmError::from_status(status.as_u16(), body).into());
        }

        let result: ChatResponse = response.json().await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_rejected() {
        let result = OpenAiChat::new(SecretString::from(String::new()), DEFAULT_CHAT_MODEL);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn wire_name_sanitizes() {
        assert_eq!(wire_name("Mary Jane").as_deref(), Some("Mary_Jane"));
        assert_eq!(wire_name("Lingo_memory").as_deref(), Some("Lingo_memory"));
        assert_eq!(wire_name("   "), None);
        assert_eq!(wire_name("!!!"), None);
        assert_eq!(wire_name(&"x".repeat(80)).map(|n| n.len()), Some(64));
    }

    #[test]
    fn wire_message_shapes() {
        let system = Message::system("rules");
        let wire = WireMessage::from(&system);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["role"], "system");
        assert!(json.get("name").is_none());

        let memory = Message::memory("we talked about tea");
        let json = serde_json::to_value(WireMessage::from(&memory)).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["name"], "Lingo_memory");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let chat = OpenAiChat::new(SecretString::from("sk-test".to_string()), "m")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(chat.base_url, "http://localhost:8080/v1");
        assert_eq!(chat.model(), "m");
    }
}
