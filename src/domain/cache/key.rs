//! Request fingerprints used as cache keys

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::llm::{Message, UnifiedRequest};

/// Namespace prefix for cached completions
pub const COMPLETION_NAMESPACE: &str = "completion";

#[derive(Serialize)]
struct FingerprintInput<'a> {
    model: Option<&'a str>,
    messages: &'a [Message],
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

/// Deterministic cache key for a completion request.
///
/// Covers the model hint, the full conversation (raw prompt folded in as a
/// trailing user message), temperature and max tokens.
pub fn completion_fingerprint(request: &UnifiedRequest) -> String {
    let messages = request.conversation();
    let input = FingerprintInput {
        model: request.model.as_deref(),
        messages: &messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    };

    // Serializing plain strings and numbers cannot fail.
    let canonical = serde_json::to_vec(&input).unwrap_or_default();
    let digest = Sha256::digest(&canonical);

    format!("{}:{}", COMPLETION_NAMESPACE, hex::encode(digest))
}
