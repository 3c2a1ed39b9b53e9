//! Response translator: GLM completion -> canonical response

use super::convert::ParsedArgs;
use super::wire::{ChatCompletion, ChatToolCall, ChatUsage};
use crate::core::{AdapterError, AdapterResult};
use crate::llm::types::{FinishReason, GenerateContentResponse, Part, UsageMetadata};

/// Map a vendor finish reason to the canonical one
///
/// | vendor           | canonical    |
/// |------------------|--------------|
/// | `stop`           | `STOP`       |
/// | `length`         | `MAX_TOKENS` |
/// | `content_filter` | `SAFETY`     |
/// | `tool_calls`     | `STOP`       |
/// | anything else    | unset        |
pub fn map_finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason? {
        "stop" | "tool_calls" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::MaxTokens),
        "content_filter" => Some(FinishReason::Safety),
        _ => None,
    }
}

/// Normalize vendor usage; the flat reasoning-token field wins over the nested one
pub fn map_usage(usage: &ChatUsage) -> UsageMetadata {
    let thoughts_token_count = usage.reasoning_tokens.or_else(|| {
        usage
            .completion_tokens_details
            .as_ref()
            .and_then(|d| d.reasoning_tokens)
    });

    UsageMetadata {
        prompt_token_count: usage.prompt_tokens.unwrap_or(0),
        candidates_token_count: usage.completion_tokens.unwrap_or(0),
        total_token_count: usage.total_tokens.unwrap_or(0),
        thoughts_token_count,
        cached_content_token_count: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens),
    }
}

/// Convert a complete vendor tool call to a canonical function-call part
pub fn tool_call_to_part(call: &ChatToolCall) -> Part {
    let args = ParsedArgs::parse(&call.function.arguments).into_value();
    Part::function_call(call.id.clone(), call.function.name.clone(), args)
}

/// Translate a complete (non-streaming) response
///
/// `fallback_model` is reported when the vendor omits `model`.
pub fn translate_completion(
    completion: ChatCompletion,
    fallback_model: &str,
) -> AdapterResult<GenerateContentResponse> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or(AdapterError::NoChoices)?;

    let message = choice.message.unwrap_or_default();
    let mut parts = Vec::new();

    if let Some(reasoning) = message.reasoning_content.filter(|r| !r.is_empty()) {
        parts.push(Part::thought(reasoning));
    }

    if let Some(text) = message.content.map(|c| c.to_text()).filter(|t| !t.is_empty()) {
        parts.push(Part::text(text));
    }

    for call in message.tool_calls.unwrap_or_default() {
        parts.push(tool_call_to_part(&call));
    }

    Ok(GenerateContentResponse::single(
        completion
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        completion
            .model
            .unwrap_or_else(|| fallback_model.to_string()),
        parts,
        map_finish_reason(choice.finish_reason.as_deref()),
        completion.usage.as_ref().map(map_usage),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completion(value: serde_json::Value) -> ChatCompletion {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_finish_reason_table() {
        assert_eq!(map_finish_reason(Some("stop")), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason(Some("length")), Some(FinishReason::MaxTokens));
        assert_eq!(map_finish_reason(Some("content_filter")), Some(FinishReason::Safety));
        assert_eq!(map_finish_reason(Some("tool_calls")), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason(Some("sensitive")), None);
        assert_eq!(map_finish_reason(Some("")), None);
        assert_eq!(map_finish_reason(None), None);
    }

    #[test]
    fn test_usage_nested_reasoning() {
        let usage: ChatUsage = serde_json::from_value(json!({
            "prompt_tokens": 10,
            "completion_tokens": 5,
            "total_tokens": 15,
            "completion_tokens_details": {"reasoning_tokens": 2}
        }))
        .unwrap();

        assert_eq!(
            map_usage(&usage),
            UsageMetadata {
                prompt_token_count: 10,
                candidates_token_count: 5,
                total_token_count: 15,
                thoughts_token_count: Some(2),
                cached_content_token_count: None,
            }
        );
    }

    #[test]
    fn test_usage_prefers_flat_reasoning() {
        let usage: ChatUsage = serde_json::from_value(json!({
            "prompt_tokens": 1,
            "reasoning_tokens": 7,
            "completion_tokens_details": {"reasoning_tokens": 3},
            "prompt_tokens_details": {"cached_tokens": 4}
        }))
        .unwrap();

        let mapped = map_usage(&usage);
        assert_eq!(mapped.thoughts_token_count, Some(7));
        assert_eq!(mapped.cached_content_token_count, Some(4));
        assert_eq!(mapped.candidates_token_count, 0);
    }

    #[test]
    fn test_full_response_scenario() {
        let resp = translate_completion(
            completion(json!({
                "id": "resp-1",
                "model": "glm-4.7",
                "choices": [{
                    "index": 0,
                    "finish_reason": "stop",
                    "message": {
                        "role": "assistant",
                        "content": "Hello world",
                        "reasoning_content": "thinking",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "do_work", "arguments": "{\"path\":\"foo\"}"}
                        }]
                    }
                }]
            })),
            "glm-4.7",
        )
        .unwrap();

        let parts = resp.parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Part::thought("thinking"));
        assert_eq!(parts[1], Part::text("Hello world"));
        assert_eq!(
            parts[2],
            Part::function_call(Some("call_1".into()), "do_work", json!({"path": "foo"}))
        );
        assert_eq!(resp.function_calls.len(), 1);
        assert_eq!(resp.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(resp.response_id, "resp-1");
        assert!(resp.usage_metadata.is_none());
    }

    #[test]
    fn test_malformed_arguments_fall_back_to_raw() {
        let resp = translate_completion(
            completion(json!({
                "choices": [{
                    "finish_reason": "tool_calls",
                    "message": {
                        "content": null,
                        "tool_calls": [{"function": {"name": "f", "arguments": "{oops"}}]
                    }
                }]
            })),
            "glm-4.7",
        )
        .unwrap();

        assert_eq!(resp.parts().len(), 1);
        assert_eq!(resp.function_calls[0].args, json!({"raw": "{oops"}));
        assert_eq!(resp.model_version, "glm-4.7");
        assert!(!resp.response_id.is_empty());
    }

    #[test]
    fn test_zero_choices_is_an_error() {
        let err = translate_completion(completion(json!({"id": "x", "choices": []})), "m")
            .unwrap_err();
        assert!(matches!(err, AdapterError::NoChoices));
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn test_empty_message_yields_no_parts() {
        let resp = translate_completion(
            completion(json!({
                "choices": [{"message": {"content": ""}, "finish_reason": "length"}]
            })),
            "m",
        )
        .unwrap();
        assert!(resp.parts().is_empty());
        assert!(resp.function_calls.is_empty());
        assert_eq!(resp.finish_reason(), Some(FinishReason::MaxTokens));
    }
}
