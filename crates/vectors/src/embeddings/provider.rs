//! Embedding provider trait.

use lance_mcp_core::AppResult;

/// Converts free text into a query vector.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "mock")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Generate the embedding for a single text.
    ///
    /// The returned length is whatever the model produces; callers compare it
    /// against the table dimension themselves.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}
