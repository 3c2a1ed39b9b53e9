//! Canonical turns -> GLM message list
//!
//! Normalization is total: malformed input degrades to a best-effort message
//! list instead of failing the call.

use serde_json::{json, Value};

use super::wire::{ChatMessage, ChatToolCall};
use crate::llm::types::{Content, InstructionEntry, Part, Role, SystemInstruction};

/// Tracking id used when a call carries neither id nor name
pub const FALLBACK_TOOL_ID: &str = "tool";

// ============================================================================
// JSON helpers
// ============================================================================

/// Outcome of parsing a tool-call argument string
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedArgs {
    /// The string was valid JSON
    Parsed(Value),
    /// The string was not valid JSON; kept verbatim
    Raw(String),
}

impl ParsedArgs {
    /// Parse an argument string. Blank input parses to an empty object.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return ParsedArgs::Parsed(json!({}));
        }
        match serde_json::from_str(raw) {
            Ok(value) => ParsedArgs::Parsed(value),
            Err(e) => {
                tracing::debug!("[GLM] Tool arguments are not valid JSON ({}), keeping raw", e);
                ParsedArgs::Raw(raw.to_string())
            }
        }
    }

    /// Convert to the canonical argument value; raw strings become `{"raw": ...}`
    pub fn into_value(self) -> Value {
        match self {
            ParsedArgs::Parsed(value) => value,
            ParsedArgs::Raw(raw) => json!({ "raw": raw }),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, ParsedArgs::Raw(_))
    }
}

/// JSON-encode a value, falling back to its plain string form
pub fn stringify_lossy(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn attachment_placeholder(mime_type: Option<&str>) -> String {
    match mime_type.filter(|m| !m.is_empty()) {
        Some(mime) => format!("[Attachment omitted: {}]", mime),
        None => "[Attachment omitted]".to_string(),
    }
}

// ============================================================================
// System instruction
// ============================================================================

/// Flatten a system instruction to text
pub fn normalize_system_instruction(instruction: &SystemInstruction) -> String {
    match instruction {
        SystemInstruction::Text(text) => text.clone(),
        SystemInstruction::Content(content) => content
            .parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("\n"),
        SystemInstruction::List(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                InstructionEntry::Text(text) => Some(text.as_str()),
                InstructionEntry::Part(part) => part.as_text(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ============================================================================
// Turns
// ============================================================================

/// Convert canonical turns to the vendor's flat message list
pub fn normalize_contents(contents: &[Content]) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    for content in contents {
        match content.role {
            Role::Model => {
                if let Some(msg) = normalize_model_turn(content) {
                    messages.push(msg);
                }
            }
            Role::User => normalize_user_turn(content, &mut messages),
        }
    }

    messages
}

/// Full message list: optional leading system message followed by the turns
pub fn build_messages(
    system_instruction: Option<&SystemInstruction>,
    contents: &[Content],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(contents.len() + 1);

    if let Some(instruction) = system_instruction {
        let system_text = normalize_system_instruction(instruction);
        if !system_text.is_empty() {
            messages.push(ChatMessage::system(system_text));
        }
    }

    messages.extend(normalize_contents(contents));
    messages
}

fn normalize_model_turn(content: &Content) -> Option<ChatMessage> {
    let mut texts: Vec<String> = Vec::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<ChatToolCall> = Vec::new();

    for part in &content.parts {
        match part {
            Part::Text { text } => texts.push(text.clone()),
            Part::Thought { text } => reasoning.push_str(text),
            Part::FunctionCall(call) => {
                let id = call
                    .id
                    .clone()
                    .or_else(|| non_empty(&call.name).map(str::to_string));
                tool_calls.push(ChatToolCall::function(
                    id,
                    call.name.clone(),
                    stringify_lossy(&call.args),
                ));
            }
            Part::Attachment { mime_type } => {
                texts.push(attachment_placeholder(mime_type.as_deref()));
            }
            Part::FunctionResponse(response) => {
                tracing::debug!(
                    "[GLM] Dropping function response '{}' found in a model turn",
                    response.name
                );
            }
        }
    }

    let text = texts.join("\n");
    if text.is_empty() && tool_calls.is_empty() && reasoning.is_empty() {
        return None;
    }

    let reasoning = if reasoning.is_empty() {
        None
    } else {
        Some(reasoning)
    };
    Some(ChatMessage::assistant(text, reasoning, tool_calls))
}

fn normalize_user_turn(content: &Content, messages: &mut Vec<ChatMessage>) {
    let mut texts: Vec<String> = Vec::new();

    for part in &content.parts {
        match part {
            Part::Text { text } => texts.push(text.clone()),
            Part::Attachment { mime_type } => {
                texts.push(attachment_placeholder(mime_type.as_deref()));
            }
            Part::FunctionResponse(response) => {
                let tool_call_id = response
                    .id
                    .as_deref()
                    .or_else(|| non_empty(&response.name))
                    .unwrap_or(FALLBACK_TOOL_ID)
                    .to_string();
                messages.push(ChatMessage::tool(
                    response.name.clone(),
                    tool_call_id,
                    stringify_lossy(&response.response),
                ));
            }
            // Reasoning is only meaningful on the model side
            Part::Thought { .. } => {}
            Part::FunctionCall(call) => {
                tracing::debug!(
                    "[GLM] Dropping function call '{}' found in a user turn",
                    call.name
                );
            }
        }
    }

    let text = texts.join("\n");
    if !text.is_empty() {
        messages.push(ChatMessage::user(text));
    }
}
