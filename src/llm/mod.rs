pub mod auth;
pub mod glm;
pub mod provider;
pub mod types;

pub use auth::{auth_provider, AuthConfig, AuthFuture, AuthProvider, AuthType, FnAuthProvider};
pub use glm::{GlmConfig, GlmContentGenerator, SearchSource, WebSearchOutcome};
pub use provider::{ApproxTokenEstimator, ContentGenerator, ContentStream, TokenEstimator};
pub use types::{
    Candidate, Content, CountTokensParameters, CountTokensResponse, EmbedContentParameters,
    EmbedContentResponse, FinishReason, FunctionCall, FunctionCallingConfig, FunctionCallingMode,
    FunctionDeclaration, FunctionResponse, GenerateContentConfig, GenerateContentParameters,
    GenerateContentResponse, Part, Role, SystemInstruction, Tool, ToolConfig, UsageMetadata,
};
