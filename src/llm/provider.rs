//! Content generator trait
//!
//! Abstracts content generation so a client can drive different backends
//! through the same canonical request/response types.

use futures::stream::Stream;
use std::pin::Pin;

use super::types::{
    CountTokensParameters, CountTokensResponse, EmbedContentParameters, EmbedContentResponse,
    GenerateContentParameters, GenerateContentResponse, Part,
};
use crate::core::AdapterResult;

/// Stream of canonical response fragments
pub type ContentStream =
    Pin<Box<dyn Stream<Item = AdapterResult<GenerateContentResponse>> + Send>>;

/// A backend that generates canonical content.
///
/// Requests and responses use the canonical content/parts model; backends
/// with a different wire format translate internally.
#[async_trait::async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate one complete response.
    async fn generate_content(
        &self,
        params: GenerateContentParameters,
    ) -> AdapterResult<GenerateContentResponse>;

    /// Generate a response as a lazy stream of fragments.
    ///
    /// Fails before yielding anything when the request itself fails; errors
    /// after that arrive as stream items.
    async fn generate_content_stream(
        &self,
        params: GenerateContentParameters,
    ) -> AdapterResult<ContentStream>;

    /// Estimate the prompt size in tokens.
    async fn count_tokens(&self, params: CountTokensParameters)
        -> AdapterResult<CountTokensResponse>;

    /// Embed content.
    async fn embed_content(
        &self,
        params: EmbedContentParameters,
    ) -> AdapterResult<EmbedContentResponse>;

    /// Get the provider name (e.g., "glm").
    fn provider_name(&self) -> &str;
}

/// Token estimation for backends without a counting endpoint
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, parts: &[Part]) -> u32;
}

/// Roughly four characters per token over every textual field of the parts
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenEstimator;

const CHARS_PER_TOKEN: usize = 4;

impl TokenEstimator for ApproxTokenEstimator {
    fn estimate(&self, parts: &[Part]) -> u32 {
        let chars: usize = parts.iter().map(part_chars).sum();
        let tokens = chars.div_ceil(CHARS_PER_TOKEN);
        u32::try_from(tokens).unwrap_or(u32::MAX)
    }
}

fn part_chars(part: &Part) -> usize {
    match part {
        Part::Text { text } | Part::Thought { text } => text.chars().count(),
        Part::FunctionCall(call) => {
            call.name.chars().count() + call.args.to_string().chars().count()
        }
        Part::FunctionResponse(resp) => {
            resp.name.chars().count() + resp.response.to_string().chars().count()
        }
        Part::Attachment { .. } => 0,
    }
}

/// Flatten request contents into one part list
pub fn flatten_parts(params: &CountTokensParameters) -> Vec<Part> {
    params
        .contents
        .iter()
        .flat_map(|content| content.parts.iter().cloned())
        .collect()
}
