use async_trait::async_trait;
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use super::sse::sse_data;
use crate::domain::{
    ChunkStream, DomainError, FinishReason, Message, MessageRole, ProviderAdapter,
    ProviderProfile, StreamChunk, UnifiedRequest, UnifiedResponse, Usage,
};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The messages API requires an explicit output limit
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for the Anthropic messages API
#[derive(Debug)]
pub struct AnthropicAdapter<C: HttpClientTrait> {
    profile: ProviderProfile,
    client: C,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> AnthropicAdapter<C> {
    pub fn new(profile: ProviderProfile, client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(profile, client, api_key, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(
        profile: ProviderProfile,
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            profile,
            client,
            api_key: api_key.into(),
            base_url,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request(&self, model: &str, request: &UnifiedRequest, stream: bool) -> serde_json::Value {
        let conversation = request.conversation();
        let (system, messages) = split_system_messages(&conversation);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });

        if let Some(system_content) = system {
            body["system"] = serde_json::json!(system_content);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<UnifiedResponse, DomainError> {
        let response: AnthropicResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider_transport(&self.profile.name, format!("malformed response: {}", e))
        })?;

        let text = response
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect::<String>();

        Ok(UnifiedResponse::new(response.id, response.model, text)
            .with_finish_reason(parse_stop_reason(response.stop_reason.as_deref()))
            .with_usage(Usage::new(
                response.usage.input_tokens,
                response.usage.output_tokens,
            )))
    }
}

#[async_trait]
impl<C: HttpClientTrait> ProviderAdapter for AnthropicAdapter<C> {
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
            .post_json(&self.messages_url(), self.headers(), &body)
            .await
            .map_err(|e| e.into_domain(&self.profile.name))?;

        self.parse_response(response)
    }

    async fn stream(
        &self,
        model: &str,
        request: &UnifiedRequest,
    ) -> Result<ChunkStream, DomainError> {
        let body = self.build_request(model, request, true);
        let bytes = self
            .client
            .post_json_stream(&self.messages_url(), self.headers(), &body)
            .await
            .map_err(|e| e.into_domain(&self.profile.name))?;

        let provider = self.profile.name.clone();
        let stream = sse_data(bytes)
            .scan(0u32, move |input_tokens, data| {
                let step = match data {
                    Ok(data) => parse_stream_event(&provider, &data, input_tokens),
                    Err(e) => StreamStep::Emit(Err(e.into_domain(&provider))),
                };

                future::ready(match step {
                    StreamStep::Emit(item) => Some(Some(item)),
                    StreamStep::Skip => Some(None),
                    StreamStep::Stop => None,
                })
            })
            .filter_map(future::ready);

        Ok(Box::pin(stream))
    }
}

enum StreamStep {
    Emit(Result<StreamChunk, DomainError>),
    Skip,
    Stop,
}

fn parse_stream_event(provider: &str, data: &str, input_tokens: &mut u32) -> StreamStep {
    let event: AnthropicStreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            return StreamStep::Emit(Err(DomainError::provider_transport(
                provider,
                format!("malformed stream event: {}", e),
            )));
        }
    };

    match event.event_type.as_str() {
        "message_start" => {
            if let Some(usage) = event.message.and_then(|m| m.usage) {
                *input_tokens = usage.input_tokens;
            }
            StreamStep::Skip
        }
        "content_block_delta" => match event.delta.and_then(|d| d.text) {
            Some(text) if !text.is_empty() => StreamStep::Emit(Ok(StreamChunk::delta(text))),
            _ => StreamStep::Skip,
        },
        "message_delta" => {
            let reason = event.delta.and_then(|d| d.stop_reason);
            let mut chunk = StreamChunk::finished(parse_stop_reason(reason.as_deref()));
            if let Some(usage) = event.usage {
                chunk = chunk.with_usage(Usage::new(*input_tokens, usage.output_tokens));
            }
            StreamStep::Emit(Ok(chunk))
        }
        "message_stop" => StreamStep::Stop,
        "error" => {
            let message = event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "stream error".to_string());
            StreamStep::Emit(Err(DomainError::provider_transport(provider, message)))
        }
        _ => StreamStep::Skip,
    }
}

fn split_system_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage<'_>>) {
    let system = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let others = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| AnthropicMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();

    ((!system.is_empty()).then_some(system), others)
}

fn parse_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some(reason) => FinishReason::parse(reason),
        None => FinishReason::Stop,
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    message: Option<StreamMessage>,
    delta: Option<StreamDelta>,
    usage: Option<AnthropicUsage>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    text: Option<String>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}
