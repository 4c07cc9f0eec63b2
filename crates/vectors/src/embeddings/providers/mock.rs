//! Mock embedding provider using hashed word features.

use crate::embeddings::provider::EmbeddingProvider;
use lance_mcp_core::AppResult;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic provider for tests and offline runs.
///
/// Each word is hashed into one of `dimensions` buckets and the result is
/// normalized to unit length. Not semantically meaningful, but stable and
/// content-dependent. Counts how many times it has been asked to embed.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn generate_mock_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        for word in text.to_lowercase().split_whitespace() {
            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash as usize) % self.dimensions] += 1.0;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "hashed-words"
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.generate_mock_embedding(text))
    }
}
