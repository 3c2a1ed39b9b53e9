//! Request builder: canonical request -> GLM chat-completions payload

use super::config::{GlmConfig, MODEL_PREFIX};
use super::convert::build_messages;
use super::tools::{convert_tool_choice, convert_tools};
use super::wire::{ChatCompletionRequest, StreamOptions, ThinkingDirective};
use crate::llm::types::GenerateContentParameters;

/// Map the caller's model id to a vendor model
///
/// GLM ids pass through; anything else is replaced by `default_model`.
pub fn map_model(requested: &str, default_model: &str) -> String {
    if requested.starts_with(MODEL_PREFIX) {
        requested.to_string()
    } else {
        if !requested.is_empty() {
            tracing::debug!(
                "[GLM] Model '{}' is not a GLM model, using '{}'",
                requested,
                default_model
            );
        }
        default_model.to_string()
    }
}

/// Build the outbound payload
pub fn build_request(
    params: &GenerateContentParameters,
    config: &GlmConfig,
    stream: bool,
) -> ChatCompletionRequest {
    let gen = &params.config;
    let messages = build_messages(gen.system_instruction.as_ref(), &params.contents);

    let tools = convert_tools(&gen.tools, gen.tool_config.as_ref());
    let tool_choice = if tools.is_some() {
        convert_tool_choice(gen.tool_config.as_ref())
    } else {
        None
    };

    ChatCompletionRequest {
        model: map_model(&params.model, &config.default_model),
        messages,
        stream: if stream { Some(true) } else { None },
        stream_options: if stream {
            Some(StreamOptions {
                include_usage: true,
            })
        } else {
            None
        },
        temperature: gen.temperature,
        top_p: gen.top_p,
        max_tokens: gen.max_output_tokens,
        tools,
        tool_choice,
        thinking: ThinkingDirective::always_enabled(config.clear_thinking),
    }
}
