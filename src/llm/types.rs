//! Canonical content types
//!
//! These follow the Gemini content/parts model used by the host client. Every
//! vendor-specific payload is translated to and from these types at the
//! provider boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Turns and Parts
// ============================================================================

/// Author of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human (or tool results flowing back to the model)
    User,
    /// The model
    Model,
}

/// One conversation turn: a role plus an ordered list of parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn from parts
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Create a model turn from parts
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Create a user turn holding a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// Concatenated text of all `Text` parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The result of a function call, sent back to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub response: Value,
}

/// A typed piece of a turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Ordinary text
    Text { text: String },
    /// Reasoning trace; never shown to the other party as ordinary text
    Thought { text: String },
    /// Function call issued by the model
    FunctionCall(FunctionCall),
    /// Function result supplied by the caller
    FunctionResponse(FunctionResponse),
    /// Opaque non-text media
    Attachment {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Create a thought part
    pub fn thought(text: impl Into<String>) -> Self {
        Part::Thought { text: text.into() }
    }

    /// Create a function call part
    pub fn function_call(id: Option<String>, name: impl Into<String>, args: Value) -> Self {
        Part::FunctionCall(FunctionCall {
            id,
            name: name.into(),
            args,
        })
    }

    /// Create a function response part
    pub fn function_response(id: Option<String>, name: impl Into<String>, response: Value) -> Self {
        Part::FunctionResponse(FunctionResponse {
            id,
            name: name.into(),
            response,
        })
    }

    /// Create an attachment placeholder part
    pub fn attachment(mime_type: Option<String>) -> Self {
        Part::Attachment { mime_type }
    }

    /// Get the text if this is a `Text` part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    /// Get the text if this is a `Thought` part
    pub fn as_thought(&self) -> Option<&str> {
        match self {
            Part::Thought { text } => Some(text.as_str()),
            _ => None,
        }
    }

    /// Get the call if this is a `FunctionCall` part
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        }
    }
}

// ============================================================================
// System Instruction
// ============================================================================

/// Entry of a list-shaped system instruction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum InstructionEntry {
    Text(String),
    Part(Part),
}

/// System instruction in any of the shapes the host client produces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SystemInstruction {
    /// Plain string
    Text(String),
    /// Structured content (role is ignored)
    Content(Content),
    /// List of strings or parts
    List(Vec<InstructionEntry>),
}

impl From<&str> for SystemInstruction {
    fn from(text: &str) -> Self {
        SystemInstruction::Text(text.to_string())
    }
}

impl From<String> for SystemInstruction {
    fn from(text: String) -> Self {
        SystemInstruction::Text(text)
    }
}

// ============================================================================
// Tools
// ============================================================================

/// A function the model may call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments (preferred)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_json_schema: Option<Value>,
    /// Legacy OpenAPI-style schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl FunctionDeclaration {
    /// Create a declaration with a JSON schema for its arguments
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters_json_schema: Some(schema),
            parameters: None,
        }
    }
}

/// A group of function declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(default)]
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// How the model is allowed to call functions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionCallingMode {
    Auto,
    Any,
    None,
    Validated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FunctionCallingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_function_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calling_config: Option<FunctionCallingConfig>,
}

impl ToolConfig {
    /// Create a tool config with a mode and optional allow-list
    pub fn with_mode(mode: FunctionCallingMode, allowed: Option<Vec<String>>) -> Self {
        Self {
            function_calling_config: Some(FunctionCallingConfig {
                mode: Some(mode),
                allowed_function_names: allowed,
            }),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Per-call generation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    /// Cancels the in-flight vendor call when triggered
    #[serde(skip)]
    pub abort_signal: Option<CancellationToken>,
}

/// A generate-content request from the host client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentParameters {
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(default)]
    pub config: GenerateContentConfig,
}

impl GenerateContentParameters {
    /// Create a request with no extra configuration
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            config: GenerateContentConfig::default(),
        }
    }

    /// Set the system instruction
    pub fn with_system_instruction(mut self, instruction: impl Into<SystemInstruction>) -> Self {
        self.config.system_instruction = Some(instruction.into());
        self
    }

    /// Set the tools
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.config.tools = tools;
        self
    }

    /// Set the tool config
    pub fn with_tool_config(mut self, tool_config: ToolConfig) -> Self {
        self.config.tool_config = Some(tool_config);
        self
    }

    /// Set the cancellation token
    pub fn with_abort_signal(mut self, token: CancellationToken) -> Self {
        self.config.abort_signal = Some(token);
        self
    }
}

// ============================================================================
// Response
// ============================================================================

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub index: u32,
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: u32,
    pub candidates_token_count: u32,
    pub total_token_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts_token_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_content_token_count: Option<u32>,
}

/// A complete response, or one streamed fragment of one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub response_id: String,
    pub model_version: String,
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    /// Every function call found in the candidate, flattened
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionCall>,
}

impl GenerateContentResponse {
    /// Build a single-candidate response; `function_calls` is derived from the parts
    pub fn single(
        response_id: impl Into<String>,
        model_version: impl Into<String>,
        parts: Vec<Part>,
        finish_reason: Option<FinishReason>,
        usage_metadata: Option<UsageMetadata>,
    ) -> Self {
        let function_calls = parts
            .iter()
            .filter_map(|p| p.as_function_call().cloned())
            .collect();

        Self {
            response_id: response_id.into(),
            model_version: model_version.into(),
            candidates: vec![Candidate {
                content: Content::model(parts),
                finish_reason,
                index: 0,
            }],
            usage_metadata,
            function_calls,
        }
    }

    /// Parts of the first candidate
    pub fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .map(|c| c.content.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Concatenated reasoning of the first candidate
    pub fn thought_text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|p| p.as_thought())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Finish reason of the first candidate
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.candidates.first().and_then(|c| c.finish_reason)
    }
}

// ============================================================================
// Token counting / embeddings
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountTokensParameters {
    pub model: String,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountTokensResponse {
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedContentParameters {
    pub model: String,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedContentResponse {
    pub embeddings: Vec<Vec<f32>>,
}
