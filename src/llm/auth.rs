//! Authentication providers for the GLM endpoint
//!
//! Supports both static and dynamic authentication:
//! - Static: API key set once at creation
//! - Dynamic: Callback that provides fresh credentials before each request
//!
//! # Example: Dynamic auth through a proxy
//!
//! ```ignore
//! use glm_content_adapter::llm::{AuthConfig, GlmConfig, GlmContentGenerator};
//!
//! let generator = GlmContentGenerator::with_auth_provider(GlmConfig::default(), || async {
//!     let token = refresh_token().await?;
//!     Ok(AuthConfig::with_base_url(token, "https://proxy.example.com/v4"))
//! });
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::glm::config::mask_api_key;
use crate::core::{AdapterError, AdapterResult};

/// Which backend the active credentials belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// GLM / Z.ai API key
    #[default]
    Glm,
    /// Gemini API key
    GeminiApiKey,
    /// Vertex AI credentials
    VertexAi,
}

impl AuthType {
    /// Whether tool calls made under this auth type go to the GLM endpoint
    pub fn is_glm(self) -> bool {
        matches!(self, AuthType::Glm)
    }
}

/// Authentication configuration for API requests
#[derive(Clone)]
pub struct AuthConfig {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Optional endpoint override for this request
    pub base_url: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AuthConfig {
    /// Create a new auth config with just an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    /// Create a new auth config with API key and endpoint override
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Some(base_url.into()),
        }
    }
}

/// Type alias for the boxed future returned by auth providers
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<AuthConfig>> + Send + 'a>>;

/// Trait for providing authentication credentials dynamically
///
/// Called before each API request. Implementations handle caching and
/// refresh internally.
pub trait AuthProvider: Send + Sync {
    fn get_auth(&self) -> AuthFuture<'_>;
}

/// Wrapper to implement AuthProvider for async closures
pub struct FnAuthProvider<F> {
    func: F,
}

impl<F, Fut> AuthProvider for FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<AuthConfig>> + Send + 'static,
{
    fn get_auth(&self) -> AuthFuture<'_> {
        Box::pin((self.func)())
    }
}

/// Create an auth provider from an async closure
pub fn auth_provider<F, Fut>(func: F) -> FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<AuthConfig>> + Send + 'static,
{
    FnAuthProvider { func }
}

/// Internal auth source - either static or dynamic
#[derive(Clone)]
pub(crate) enum AuthSource {
    /// Static credentials set at creation time
    Static(AuthConfig),
    /// Dynamic credentials from a provider
    Dynamic(Arc<dyn AuthProvider>),
}

impl AuthSource {
    /// Get auth config (either returns static or calls provider)
    pub(crate) async fn get_auth(&self) -> AdapterResult<AuthConfig> {
        let config = match self {
            AuthSource::Static(config) => config.clone(),
            AuthSource::Dynamic(provider) => provider
                .get_auth()
                .await
                .map_err(|e| AdapterError::Auth(format!("{:#}", e)))?,
        };

        if config.api_key.trim().is_empty() {
            return Err(AdapterError::NotConfigured("API key is empty".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source() {
        let source = AuthSource::Static(AuthConfig::new("key-1"));
        let config = source.get_auth().await.unwrap();
        assert_eq!(config.api_key, "key-1");
        assert!(config.base_url.is_none());
    }

    #[tokio::test]
    async fn test_dynamic_source_is_called_each_time() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = auth_provider(move || {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                Ok::<_, anyhow::Error>(AuthConfig::with_base_url(
                    format!("jwt-{}", n),
                    "http://proxy",
                ))
            }
        });
        let source = AuthSource::Dynamic(Arc::new(provider));

        assert_eq!(source.get_auth().await.unwrap().api_key, "jwt-0");
        let second = source.get_auth().await.unwrap();
        assert_eq!(second.api_key, "jwt-1");
        assert_eq!(second.base_url.as_deref(), Some("http://proxy"));
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_auth_error() {
        let provider = auth_provider(|| async {
            Err::<AuthConfig, _>(anyhow::anyhow!("token service down"))
        });
        let source = AuthSource::Dynamic(Arc::new(provider));
        let err = source.get_auth().await.unwrap_err();
        assert!(matches!(err, AdapterError::Auth(ref m) if m.contains("token service down")));
    }

    #[tokio::test]
    async fn test_empty_key_is_not_configured() {
        let source = AuthSource::Static(AuthConfig::new(""));
        assert!(matches!(
            source.get_auth().await,
            Err(AdapterError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_auth_type_routing() {
        assert!(AuthType::Glm.is_glm());
        assert!(!AuthType::GeminiApiKey.is_glm());
        assert_eq!(AuthType::default(), AuthType::Glm);
    }

    #[test]
    fn test_debug_masks_key() {
        let debug = format!("{:?}", AuthConfig::new("abcd1234567890wxyz"));
        assert!(debug.contains("abcd...wxyz"));
        assert!(!debug.contains("1234567890"));
    }
}
