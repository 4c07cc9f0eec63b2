//! Text embedding for free-text queries.
//!
//! Queries given as text are turned into vectors by an external model server.
//! The Ollama provider talks to it over HTTP; the mock provider is a
//! deterministic stand-in for tests and offline use.

pub mod provider;
pub mod providers;

pub use provider::EmbeddingProvider;
pub use providers::mock::MockProvider;
pub use providers::ollama::OllamaProvider;
