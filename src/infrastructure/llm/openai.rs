use async_trait::async_trait;
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use super::sse::sse_data;
use crate::domain::{
    ChunkStream, DomainError, Embedding, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage,
    FinishReason, Message, ProviderAdapter, ProviderProfile, StreamChunk, UnifiedRequest,
    UnifiedResponse, Usage,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Adapter for OpenAI and OpenAI-compatible APIs
#[derive(Debug)]
pub struct OpenAiAdapter<C: HttpClientTrait> {
    profile: ProviderProfile,
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiAdapter<C> {
    pub fn new(profile: ProviderProfile, client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(profile, client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        profile: ProviderProfile,
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            profile,
            client,
            auth_header,
            base_url,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn build_request(&self, model: &str, request: &UnifiedRequest, stream: bool) -> serde_json::Value {
        let conversation = request.conversation();
        let messages: Vec<OpenAiMessage> = conversation
            .iter()
            .map(OpenAiMessage::from_domain)
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn malformed(&self, detail: impl std::fmt::Display) -> DomainError {
        DomainError::provider_transport(&self.profile.name, format!("malformed response: {}", detail))
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<UnifiedResponse, DomainError> {
        let response: OpenAiResponse =
            serde_json::from_value(json).map_err(|e| self.malformed(e))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.malformed("no choices in response"))?;

        let mut unified = UnifiedResponse::new(
            response.id,
            response.model,
            choice.message.content.unwrap_or_default(),
        );

        if let Some(reason) = choice.finish_reason {
            unified = unified.with_finish_reason(FinishReason::parse(&reason));
        }

        if let Some(usage) = response.usage {
            unified = unified.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        Ok(unified)
    }

    fn parse_embeddings(&self, json: serde_json::Value) -> Result<EmbeddingResponse, DomainError> {
        let response: OpenAiEmbeddingResponse =
            serde_json::from_value(json).map_err(|e| self.malformed(e))?;

        let data = response
            .data
            .into_iter()
            .map(|d| Embedding::new(d.index, d.embedding))
            .collect();

        let usage = response
            .usage
            .map(|u| EmbeddingUsage::new(u.prompt_tokens, u.total_tokens))
            .unwrap_or_default();

        Ok(EmbeddingResponse::new(response.model, data, usage))
    }
}

#[async_trait]
impl<C: HttpClientTrait> ProviderAdapter for OpenAiAdapter<C> {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn complete(
        &self,
        model: &str,
        request: &UnifiedRequest,
    ) -> Result<UnifiedResponse, DomainError> {
        let body = self.build_request(model, request, false);
        let response = self
            .client
            .post_json(&self.chat_completions_url(), self.headers(), &body)
            .await
            .map_err(|e| e.into_domain(&self.profile.name))?;

        self.parse_response(response)
    }

    async fn embed(
        &self,
        model: &str,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, DomainError> {
        let mut body = serde_json::json!({
            "model": model,
            "input": request.input(),
        });

        if let Some(dimensions) = request.dimensions() {
            body["dimensions"] = serde_json::json!(dimensions);
        }

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await
            .map_err(|e| e.into_domain(&self.profile.name))?;

        self.parse_embeddings(response)
    }

    async fn stream(
        &self,
        model: &str,
        request: &UnifiedRequest,
    ) -> Result<ChunkStream, DomainError> {
        let body = self.build_request(model, request, true);
        let bytes = self
            .client
            .post_json_stream(&self.chat_completions_url(), self.headers(), &body)
            .await
            .map_err(|e| e.into_domain(&self.profile.name))?;

        let provider = self.profile.name.clone();
        let stream = sse_data(bytes)
            .take_while(|data| future::ready(!matches!(data, Ok(d) if d.trim() == "[DONE]")))
            .filter_map(move |data| {
                let result = match data {
                    Ok(data) => parse_stream_event(&provider, &data).transpose(),
                    Err(e) => Some(Err(e.into_domain(&provider))),
                };
                future::ready(result)
            });

        Ok(Box::pin(stream))
    }
}

fn parse_stream_event(provider: &str, data: &str) -> Result<Option<StreamChunk>, DomainError> {
    let event: OpenAiStreamChunk = serde_json::from_str(data).map_err(|e| {
        DomainError::provider_transport(provider, format!("malformed stream event: {}", e))
    })?;

    let choice = event.choices.into_iter().next();
    let chunk = StreamChunk {
        delta: choice
            .as_ref()
            .and_then(|c| c.delta.content.clone())
            .filter(|text| !text.is_empty()),
        finish_reason: choice
            .and_then(|c| c.finish_reason)
            .map(|reason| FinishReason::parse(&reason)),
        usage: event
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
    };

    if chunk.delta.is_none() && chunk.finish_reason.is_none() && chunk.usage.is_none() {
        return Ok(None);
    }

    Ok(Some(chunk))
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> OpenAiMessage<'a> {
    fn from_domain(message: &'a Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: &message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    id: String,
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    model: String,
    data: Vec<OpenAiEmbeddingData>,
    usage: Option<OpenAiEmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}
