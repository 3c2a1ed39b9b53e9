//! GLM content generator
//!
//! Serves canonical content/parts requests from the GLM chat-completions
//! endpoint, translating in both directions.
//!
//! # Authentication
//!
//! Uses a GLM API key (set via `GLM_API_KEY` or passed directly), or a
//! dynamic [`AuthProvider`] callback.
//!
//! ```ignore
//! // From environment variables
//! let generator = GlmContentGenerator::from_env()?;
//!
//! // With an explicit key
//! let generator = GlmContentGenerator::new(GlmConfig::new("sk-..."));
//!
//! let mut stream = generator.generate_content_stream(params).await?;
//! while let Some(fragment) = stream.next().await {
//!     print!("{}", fragment?.text());
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod convert;
pub mod request;
pub mod response;
pub mod sse;
pub mod tools;
pub mod transport;
pub mod web_search;
pub mod wire;

use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use aggregator::StreamAggregator;
pub use config::GlmConfig;
pub use convert::ParsedArgs;
pub use transport::GlmTransport;
pub use web_search::{SearchSource, WebSearchOutcome};

use super::auth::{auth_provider, AuthConfig, AuthProvider, AuthSource, AuthType};
use super::provider::{
    flatten_parts, ApproxTokenEstimator, ContentGenerator, ContentStream, TokenEstimator,
};
use super::types::{
    CountTokensParameters, CountTokensResponse, EmbedContentParameters, EmbedContentResponse,
    GenerateContentParameters, GenerateContentResponse,
};
use crate::core::{AdapterError, AdapterResult};

/// GLM-backed [`ContentGenerator`]
///
/// Holds no per-call state; concurrent calls are independent.
pub struct GlmContentGenerator {
    transport: GlmTransport,
    auth: AuthSource,
    auth_type: AuthType,
    estimator: Arc<dyn TokenEstimator>,
}

impl GlmContentGenerator {
    /// Create a generator with the configuration's API key
    pub fn new(config: GlmConfig) -> Self {
        let auth = AuthSource::Static(AuthConfig::new(config.api_key.clone()));
        Self::with_source(config, auth)
    }

    /// Create a generator from environment variables
    ///
    /// See [`GlmConfig::from_env`].
    pub fn from_env() -> AdapterResult<Self> {
        tracing::info!("Creating GLM content generator from environment");
        Ok(Self::new(GlmConfig::from_env()?))
    }

    /// Create a generator with a dynamic auth provider callback
    ///
    /// The callback runs before each request. `AuthConfig.api_key` is the
    /// bearer token; `AuthConfig.base_url` (if set) overrides the endpoint.
    pub fn with_auth_provider<F, Fut>(config: GlmConfig, provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AuthConfig>> + Send + 'static,
    {
        Self::with_source(config, AuthSource::Dynamic(Arc::new(auth_provider(provider))))
    }

    /// Create a generator with a trait object auth provider
    pub fn with_auth_provider_boxed(config: GlmConfig, provider: Arc<dyn AuthProvider>) -> Self {
        Self::with_source(config, AuthSource::Dynamic(provider))
    }

    fn with_source(config: GlmConfig, auth: AuthSource) -> Self {
        Self {
            transport: GlmTransport::new(Client::new(), config),
            auth,
            auth_type: AuthType::Glm,
            estimator: Arc::new(ApproxTokenEstimator),
        }
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.transport = GlmTransport::new(client, self.transport.config().clone());
        self
    }

    /// Set the token estimator used by `count_tokens`
    pub fn with_token_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }

    /// Set the auth type of the active credentials
    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    pub fn config(&self) -> &GlmConfig {
        self.transport.config()
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// Run a web search through the native search tool
    pub async fn web_search(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> AdapterResult<WebSearchOutcome> {
        if !web_search::routes_to_glm(self.auth_type) {
            return Err(AdapterError::unsupported(format!(
                "web search via GLM requires GLM credentials (active: {:?})",
                self.auth_type
            )));
        }

        tracing::info!("[GLM] Web search: {}", query);
        let request = web_search::build_search_request(query, self.config());
        let auth = self.auth.get_auth().await?;
        let completion = self.transport.send_json(&auth, &request, cancel).await?;
        Ok(web_search::format_search_response(query, &completion))
    }
}

// ============================================================================
// ContentGenerator implementation
// ============================================================================

#[async_trait::async_trait]
impl ContentGenerator for GlmContentGenerator {
    async fn generate_content(
        &self,
        params: GenerateContentParameters,
    ) -> AdapterResult<GenerateContentResponse> {
        tracing::info!("[GLM] Generating content");
        tracing::debug!("[GLM] Contents count: {}", params.contents.len());
        tracing::debug!("[GLM] Tools count: {}", params.config.tools.len());

        let request = request::build_request(&params, self.config(), false);
        let cancel = params.config.abort_signal.as_ref();

        let auth = self.auth.get_auth().await?;
        let completion = self.transport.send_json(&auth, &request, cancel).await?;
        response::translate_completion(completion, &request.model)
    }

    async fn generate_content_stream(
        &self,
        params: GenerateContentParameters,
    ) -> AdapterResult<ContentStream> {
        tracing::info!("[GLM] Streaming content");
        tracing::debug!("[GLM] Contents count: {}", params.contents.len());
        tracing::debug!("[GLM] Tools count: {}", params.config.tools.len());

        let request = request::build_request(&params, self.config(), true);
        let cancel = params.config.abort_signal.clone();

        let auth = self.auth.get_auth().await?;
        let response = self
            .transport
            .open_stream(&auth, &request, cancel.as_ref())
            .await?;

        let chunks = sse::decode_stream(response.bytes_stream(), cancel);
        Ok(Box::pin(aggregator::aggregate(chunks, request.model)))
    }

    async fn count_tokens(
        &self,
        params: CountTokensParameters,
    ) -> AdapterResult<CountTokensResponse> {
        let total_tokens = self.estimator.estimate(&flatten_parts(&params));
        tracing::debug!("[GLM] Estimated {} tokens", total_tokens);
        Ok(CountTokensResponse { total_tokens })
    }

    async fn embed_content(
        &self,
        _params: EmbedContentParameters,
    ) -> AdapterResult<EmbedContentResponse> {
        Err(AdapterError::unsupported(
            "embeddings are not supported by the GLM content generator",
        ))
    }

    fn provider_name(&self) -> &str {
        "glm"
    }
}
