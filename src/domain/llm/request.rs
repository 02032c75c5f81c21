use serde::{Deserialize, Serialize};

use super::Message;
use crate::domain::DomainError;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Provider-agnostic completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UnifiedRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Raw prompt text, sent as a trailing user message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Model hint, resolved per provider through its model mapping table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl UnifiedRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn builder() -> UnifiedRequestBuilder {
        UnifiedRequestBuilder::new()
    }

    /// Minimal 1-token request used by provider health checks
    pub fn health_probe() -> Self {
        Self {
            prompt: Some("ping".to_string()),
            max_tokens: Some(1),
            temperature: Some(0.0),
            ..Default::default()
        }
    }

    /// Messages as sent to a provider, with the raw prompt appended as a user turn
    pub fn conversation(&self) -> Vec<Message> {
        let mut messages = self.messages.clone();

        if let Some(prompt) = &self.prompt {
            messages.push(Message::user(prompt.clone()));
        }

        messages
    }

    /// All input text joined, used for token estimation
    pub fn input_text(&self) -> String {
        self.conversation()
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let has_prompt = self
            .prompt
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false);
        let has_message = self.messages.iter().any(|m| !m.is_blank());

        if !has_prompt && !has_message {
            return Err(DomainError::invalid_request(
                "request must contain a non-empty prompt or at least one non-empty message",
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
                return Err(DomainError::invalid_request(format!(
                    "temperature must be between {} and {}, got {}",
                    MIN_TEMPERATURE, MAX_TEMPERATURE, temperature
                )));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(DomainError::invalid_request("max_tokens must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for UnifiedRequest
#[derive(Debug, Default)]
pub struct UnifiedRequestBuilder {
    request: UnifiedRequest,
}

impl UnifiedRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Message::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Message::user(content))
    }

    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.message(Message::assistant(content))
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.request.prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.request.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.request.max_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.request.temperature = Some(temp);
        self
    }

    pub fn build(self) -> UnifiedRequest {
        self.request
    }
}
