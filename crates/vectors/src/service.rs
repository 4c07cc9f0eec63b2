//! Request handlers for the three vector operations.
//!
//! [`VectorService`] owns the shared store handle and embedding provider.
//! Each method takes an already-validated argument bundle and runs one
//! request/response cycle; nothing is kept between calls.

use crate::args::{AddVectorsArgs, QueryInput, SearchArgs};
use crate::embeddings::EmbeddingProvider;
use crate::records::{self, VECTOR_FIELD};
use crate::store::{VectorSearch, VectorStore};
use lance_mcp_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

/// Outcome of an add-vectors call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Rows written
    pub added: usize,
    /// Whether the table was created by this call
    pub created: bool,
}

/// Vector operations over a shared store connection.
pub struct VectorService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Append records to a table, creating it on first write.
    #[instrument(skip(self, args), fields(table = %args.table_name, records = args.records.len()))]
    pub async fn add_vectors(&self, args: AddVectorsArgs) -> AppResult<AddOutcome> {
        let table = args.table_name.as_str();
        let added = args.records.len();

        let created = match self.store.table_schema(table).await {
            Ok(schema) => {
                let batch = records::batch_for_schema(&args.records, &schema)?;
                self.store.add(table, batch).await?;
                false
            }
            Err(AppError::TableNotFound(_)) => {
                tracing::info!("Table '{}' does not exist, creating it", table);
                let batch = records::infer_batch(&args.records)?;
                self.store.create_table(table, batch).await?;
                true
            }
            Err(e) => return Err(e),
        };

        tracing::info!("Added {} vectors to table '{}'", added, table);
        Ok(AddOutcome { added, created })
    }

    /// Similarity search; the vector column is dropped unless `with_vectors` is set.
    #[instrument(skip(self, args), fields(table = %args.table_name, limit = args.limit, distance = args.distance.as_str()))]
    pub async fn search_vectors(&self, args: SearchArgs) -> AppResult<Vec<Map<String, Value>>> {
        let table = args.table_name.as_str();

        let vector = match args.query {
            QueryInput::Vector(vector) => vector,
            QueryInput::Text(text) => {
                tracing::debug!(
                    "Embedding query text with {} ({})",
                    self.embedder.provider_name(),
                    self.embedder.model_name()
                );
                self.embedder.embed(&text).await?
            }
        };

        let schema = self.store.table_schema(table).await?;
        let column = records::resolve_vector_column(&schema);

        match &column {
            Some(col) if col.dimension != vector.len() => {
                tracing::warn!(
                    "Query vector has {} dimensions but column '{}' of table '{}' has {}",
                    vector.len(),
                    col.name,
                    table,
                    col.dimension
                );
            }
            None => {
                tracing::warn!("No vector column found in table '{}'", table);
            }
            _ => {}
        }

        let query = VectorSearch {
            vector,
            column: column.as_ref().map(|c| c.name.clone()),
            distance: args.distance,
            limit: args.limit,
            filter: args.filter,
        };

        let batches = self.store.search(table, &query).await?;

        let batches = if args.with_vectors {
            batches
        } else {
            let hidden = column.as_ref().map_or(VECTOR_FIELD, |c| c.name.as_str());
            records::without_column(&batches, hidden)?
        };

        let rows = records::batches_to_rows(&batches)?;
        tracing::debug!("Search on '{}' returned {} rows", table, rows.len());
        Ok(rows)
    }

    /// Table names known to the store.
    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> AppResult<Vec<String>> {
        self.store.table_names().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::lancedb_store::LanceDbStore;
    use arrow_array::RecordBatch;
    use arrow_schema::{DataType, Field, Schema, SchemaRef};
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Store with a fixed two-column schema that records every search.
    struct RecordingStore {
        schema: SchemaRef,
        searches: Mutex<Vec<VectorSearch>>,
    }

    impl RecordingStore {
        fn with_dimension(dimension: i32) -> Self {
            let item = Arc::new(Field::new("item", DataType::Float32, true));
            let schema = Schema::new(vec![
                Field::new(VECTOR_FIELD, DataType::FixedSizeList(item, dimension), false),
                Field::new("title", DataType::Utf8, true),
            ]);
            Self {
                schema: Arc::new(schema),
                searches: Mutex::new(Vec::new()),
            }
        }

        fn searches(&self) -> Vec<VectorSearch> {
            self.searches.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl VectorStore for RecordingStore {
        async fn table_names(&self) -> AppResult<Vec<String>> {
            Ok(vec!["docs".to_string()])
        }

        async fn table_schema(&self, _table: &str) -> AppResult<SchemaRef> {
            Ok(self.schema.clone())
        }

        async fn create_table(&self, _table: &str, _batch: RecordBatch) -> AppResult<()> {
            Ok(())
        }

        async fn add(&self, _table: &str, _batch: RecordBatch) -> AppResult<()> {
            Ok(())
        }

        async fn count_rows(&self, _table: &str) -> AppResult<usize> {
            Ok(0)
        }

        async fn search(&self, _table: &str, query: &VectorSearch) -> AppResult<Vec<RecordBatch>> {
            self.searches.lock().unwrap().push(query.clone());
            Ok(Vec::new())
        }
    }

    struct Fixture {
        _temp: TempDir,
        store: Arc<LanceDbStore>,
        embedder: Arc<MockProvider>,
        service: VectorService,
    }

    async fn fixture(embedding_dim: usize) -> Fixture {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lance");
        let store = Arc::new(LanceDbStore::connect(path.to_str().unwrap()).await.unwrap());
        let embedder = Arc::new(MockProvider::new(embedding_dim));
        let service = VectorService::new(store.clone(), embedder.clone());
        Fixture {
            _temp: temp,
            store,
            embedder,
            service,
        }
    }

    fn add_args(table: &str, vectors: Value) -> AddVectorsArgs {
        AddVectorsArgs::from_value(json!({ "table_name": table, "vectors": vectors })).unwrap()
    }

    fn search_args(value: Value) -> SearchArgs {
        SearchArgs::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_add_creates_missing_table() {
        let fx = fixture(2).await;
        assert!(fx.service.list_tables().await.unwrap().is_empty());

        let outcome = fx
            .service
            .add_vectors(add_args("docs", json!([{"vector": [0.1, 0.2], "title": "a"}])))
            .await
            .unwrap();

        assert_eq!(outcome, AddOutcome { added: 1, created: true });
        assert_eq!(fx.service.list_tables().await.unwrap(), vec!["docs".to_string()]);
        assert_eq!(fx.store.count_rows("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_appends_to_existing_table() {
        let fx = fixture(2).await;
        fx.service
            .add_vectors(add_args("docs", json!([{"vector": [0.1, 0.2], "title": "a"}])))
            .await
            .unwrap();

        let outcome = fx
            .service
            .add_vectors(add_args(
                "docs",
                json!([
                    {"vector": [0.3, 0.4], "title": "b"},
                    {"vector": [0.5, 0.6], "title": "c"}
                ]),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, AddOutcome { added: 2, created: false });
        assert_eq!(fx.store.count_rows("docs").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_with_wrong_dimension_fails_without_writing() {
        let fx = fixture(2).await;
        fx.service
            .add_vectors(add_args("docs", json!([{"vector": [0.1, 0.2]}])))
            .await
            .unwrap();

        let err = fx
            .service
            .add_vectors(add_args("docs", json!([{"vector": [0.1, 0.2, 0.3]}])))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(fx.store.count_rows("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_strips_vectors_by_default() {
        let fx = fixture(2).await;
        fx.service
            .add_vectors(add_args(
                "docs",
                json!([
                    {"vector": [0.1, 0.2], "title": "a"},
                    {"vector": [0.9, -0.5], "title": "b"}
                ]),
            ))
            .await
            .unwrap();

        let rows = fx
            .service
            .search_vectors(search_args(json!({
                "table_name": "docs",
                "query_vector": [0.1, 0.2],
                "limit": 1
            })))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], json!("a"));
        assert!(!rows[0].contains_key("vector"));
    }

    #[tokio::test]
    async fn test_search_with_vectors_keeps_column() {
        let fx = fixture(2).await;
        fx.service
            .add_vectors(add_args(
                "docs",
                json!([
                    {"vector": [1.0, 0.0], "title": "a"},
                    {"vector": [0.0, 1.0], "title": "b"}
                ]),
            ))
            .await
            .unwrap();

        let rows = fx
            .service
            .search_vectors(search_args(json!({
                "table_name": "docs",
                "query_vector": [1.0, 0.0],
                "distance_type": "l2",
                "with_vectors": true
            })))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.contains_key("vector")));
        let nearest: Vec<f64> = rows[0]["vector"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(nearest, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_search_text_embeds_once() {
        let fx = fixture(4).await;
        fx.service
            .add_vectors(add_args(
                "notes",
                json!([
                    {"vector": [1.0, 0.0, 0.0, 0.0], "body": "x"},
                    {"vector": [0.0, 1.0, 0.0, 0.0], "body": "y"},
                    {"vector": [0.0, 0.0, 1.0, 0.0], "body": "z"}
                ]),
            ))
            .await
            .unwrap();

        let rows = fx
            .service
            .search_vectors(search_args(json!({
                "table_name": "notes",
                "query_text": "rust borrow checker",
                "limit": 2
            })))
            .await
            .unwrap();

        assert_eq!(fx.embedder.calls(), 1);
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_search_text_uses_embedding_as_query() {
        let store = Arc::new(RecordingStore::with_dimension(4));
        let embedder = Arc::new(MockProvider::new(4));
        let service = VectorService::new(store.clone(), embedder.clone());

        let expected = MockProvider::new(4).embed("rust borrow checker").await.unwrap();
        service
            .search_vectors(search_args(json!({
                "table_name": "docs",
                "query_text": "rust borrow checker"
            })))
            .await
            .unwrap();

        let searches = store.searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].vector, expected);
        assert_eq!(searches[0].column.as_deref(), Some(VECTOR_FIELD));
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch_still_queries_store() {
        let store = Arc::new(RecordingStore::with_dimension(2));
        let service = VectorService::new(store.clone(), Arc::new(MockProvider::new(2)));

        let rows = service
            .search_vectors(search_args(json!({
                "table_name": "docs",
                "query_vector": [1.0, 0.0, 0.5]
            })))
            .await
            .unwrap();

        assert!(rows.is_empty());
        let searches = store.searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].vector, vec![1.0, 0.0, 0.5]);
    }

    #[tokio::test]
    async fn test_add_twice_to_single_dimension_table() {
        let fx = fixture(2).await;
        for value in [0.5, 0.25] {
            fx.service
                .add_vectors(add_args("tiny", json!([{"vector": [value]}])))
                .await
                .unwrap();
        }

        assert_eq!(fx.store.count_rows("tiny").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_literal_vector_skips_embedder() {
        let fx = fixture(2).await;
        fx.service
            .add_vectors(add_args("docs", json!([{"vector": [1.0, 0.0]}])))
            .await
            .unwrap();

        fx.service
            .search_vectors(search_args(json!({
                "table_name": "docs",
                "query_vector": [1.0, 0.0],
                "query_text": "unused"
            })))
            .await
            .unwrap();

        assert_eq!(fx.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let fx = fixture(2).await;
        fx.service
            .add_vectors(add_args(
                "docs",
                json!([
                    {"vector": [1.0, 0.0], "kind": "book"},
                    {"vector": [0.9, 0.1], "kind": "film"},
                    {"vector": [0.0, 1.0], "kind": "book"}
                ]),
            ))
            .await
            .unwrap();

        let rows = fx
            .service
            .search_vectors(search_args(json!({
                "table_name": "docs",
                "query_vector": [1.0, 0.0],
                "where": "kind = 'book'"
            })))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["kind"] == json!("book")));
    }

    #[tokio::test]
    async fn test_search_missing_table() {
        let fx = fixture(2).await;
        let err = fx
            .service
            .search_vectors(search_args(json!({
                "table_name": "ghost",
                "query_vector": [1.0, 0.0]
            })))
            .await
            .unwrap_err();

        assert!(err.is_table_not_found());
    }

    #[tokio::test]
    async fn test_list_tables_reflects_adds() {
        let fx = fixture(2).await;
        for table in ["alpha", "beta"] {
            fx.service
                .add_vectors(add_args(table, json!([{"vector": [1.0, 2.0]}])))
                .await
                .unwrap();
        }

        let mut tables = fx.service.list_tables().await.unwrap();
        tables.sort();
        assert_eq!(tables, vec!["alpha".to_string(), "beta".to_string()]);
    }
}
