//! Vector store abstraction.
//!
//! The narrow interface the handlers need from the storage engine: list
//! tables, read a table schema, create or append to a table, and run a
//! nearest-neighbour query.

use crate::args::DistanceKind;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use lance_mcp_core::AppResult;

/// A nearest-neighbour query against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearch {
    pub vector: Vec<f32>,
    /// Column to search; the store picks one when `None`
    pub column: Option<String>,
    pub distance: DistanceKind,
    pub limit: usize,
    /// SQL-like predicate restricting eligible rows
    pub filter: Option<String>,
}

/// Trait for vector store backends.
///
/// Methods taking a table name return `AppError::TableNotFound` when the
/// table is missing, so callers can tell that case apart from real failures.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of all tables, in store order.
    async fn table_names(&self) -> AppResult<Vec<String>>;

    /// Arrow schema of an existing table.
    async fn table_schema(&self, table: &str) -> AppResult<SchemaRef>;

    /// Create a table whose schema and initial rows come from `batch`.
    async fn create_table(&self, table: &str, batch: RecordBatch) -> AppResult<()>;

    /// Append rows to an existing table.
    async fn add(&self, table: &str, batch: RecordBatch) -> AppResult<()>;

    /// Number of rows in a table.
    async fn count_rows(&self, table: &str) -> AppResult<usize>;

    /// Run a similarity query, returning rows ordered nearest first.
    async fn search(&self, table: &str, query: &VectorSearch) -> AppResult<Vec<RecordBatch>>;
}
