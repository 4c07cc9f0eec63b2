//! Vector operations backed by LanceDB.
//!
//! Validates tool arguments, converts JSON records to Arrow, and runs
//! add/search/list against a LanceDB connection. Free-text queries are
//! embedded through an HTTP embedding service.

pub mod args;
pub mod embeddings;
pub mod lancedb_store;
pub mod records;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use args::{AddVectorsArgs, DistanceKind, QueryInput, SearchArgs, DEFAULT_LIMIT};
pub use embeddings::{EmbeddingProvider, MockProvider, OllamaProvider};
pub use lancedb_store::LanceDbStore;
pub use records::{VectorColumn, VectorRecord};
pub use service::{AddOutcome, VectorService};
pub use store::{VectorSearch, VectorStore};
