//! LanceDB-backed vector store implementation.

use crate::args::DistanceKind;
use crate::store::{VectorSearch, VectorStore};
use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::SchemaRef;
use futures::TryStreamExt;
use lance_mcp_core::{AppError, AppResult};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;

/// LanceDB connection shared by all handlers.
#[derive(Clone)]
pub struct LanceDbStore {
    conn: Connection,
    uri: String,
}

impl std::fmt::Debug for LanceDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbStore").field("uri", &self.uri).finish()
    }
}

impl From<DistanceKind> for DistanceType {
    fn from(kind: DistanceKind) -> Self {
        match kind {
            DistanceKind::L2 => DistanceType::L2,
            DistanceKind::Cosine => DistanceType::Cosine,
            DistanceKind::Dot => DistanceType::Dot,
        }
    }
}

impl LanceDbStore {
    /// Connect to the LanceDB database at `uri`.
    ///
    /// Plain paths are created if missing; URIs with a scheme are passed through.
    pub async fn connect(uri: &str) -> AppResult<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(Path::new(uri)).map_err(|e| {
                AppError::Storage(format!("Failed to create database directory '{}': {}", uri, e))
            })?;
        }

        let conn = lancedb::connect(uri).execute().await.map_err(|e| {
            AppError::Storage(format!("Failed to connect to LanceDB at '{}': {}", uri, e))
        })?;

        tracing::info!("Connected to LanceDB at {}", uri);

        Ok(Self {
            conn,
            uri: uri.to_string(),
        })
    }

    /// Location this store is connected to.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn open(&self, table: &str) -> AppResult<Table> {
        self.conn
            .open_table(table)
            .execute()
            .await
            .map_err(|e| match e {
                lancedb::Error::TableNotFound { .. } => AppError::TableNotFound(table.to_string()),
                other => {
                    AppError::Storage(format!("Failed to open table '{}': {}", table, other))
                }
            })
    }
}

#[async_trait::async_trait]
impl VectorStore for LanceDbStore {
    async fn table_names(&self) -> AppResult<Vec<String>> {
        self.conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list tables: {}", e)))
    }

    async fn table_schema(&self, table: &str) -> AppResult<SchemaRef> {
        self.open(table)
            .await?
            .schema()
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to read schema of table '{}': {}", table, e))
            })
    }

    async fn create_table(&self, table: &str, batch: RecordBatch) -> AppResult<()> {
        let rows = batch.num_rows();
        let schema = batch.schema();

        self.conn
            .create_table(table, RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create table '{}': {}", table, e)))?;

        tracing::debug!("Created table '{}' with {} rows", table, rows);
        Ok(())
    }

    async fn add(&self, table: &str, batch: RecordBatch) -> AppResult<()> {
        let rows = batch.num_rows();
        let schema = batch.schema();

        self.open(table)
            .await?
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to add rows to table '{}': {}", table, e))
            })?;

        tracing::debug!("Appended {} rows to table '{}'", rows, table);
        Ok(())
    }

    async fn count_rows(&self, table: &str) -> AppResult<usize> {
        self.open(table)
            .await?
            .count_rows(None)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to count rows in '{}': {}", table, e)))
    }

    async fn search(&self, table: &str, query: &VectorSearch) -> AppResult<Vec<RecordBatch>> {
        let handle = self.open(table).await?;

        let mut vector_query = handle
            .query()
            .nearest_to(query.vector.clone())
            .map_err(|e| {
                AppError::Storage(format!("Failed to create query on '{}': {}", table, e))
            })?
            .distance_type(query.distance.into())
            .limit(query.limit);

        if let Some(column) = &query.column {
            vector_query = vector_query.column(column);
        }

        if let Some(filter) = &query.filter {
            vector_query = vector_query.only_if(filter.as_str());
        }

        let batches = vector_query
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to search table '{}': {}", table, e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to collect results from '{}': {}", table, e))
            })?;

        tracing::debug!(
            "Search on '{}' returned {} rows in {} batches",
            table,
            batches.iter().map(|b| b.num_rows()).sum::<usize>(),
            batches.len()
        );

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{infer_batch, VectorRecord};
    use serde_json::json;
    use tempfile::TempDir;

    fn record(vector: &[f32], id: &str) -> VectorRecord {
        VectorRecord {
            vector: vector.to_vec(),
            fields: json!({ "id": id }).as_object().cloned().unwrap(),
        }
    }

    async fn store(temp: &TempDir) -> LanceDbStore {
        let path = temp.path().join("db");
        LanceDbStore::connect(path.to_str().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_creates_directory() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        assert!(temp.path().join("db").is_dir());
        assert!(store.table_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_is_typed() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        let err = store.table_schema("nope").await.unwrap_err();
        assert!(err.is_table_not_found(), "unexpected error: {}", err);

        let batch = infer_batch(&[record(&[1.0, 0.0], "a")]).unwrap();
        let err = store.add("nope", batch).await.unwrap_err();
        assert!(err.is_table_not_found());
    }

    #[tokio::test]
    async fn test_create_add_and_count() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        let batch = infer_batch(&[record(&[1.0, 0.0], "a")]).unwrap();
        store.create_table("items", batch).await.unwrap();
        assert_eq!(store.count_rows("items").await.unwrap(), 1);

        let batch = infer_batch(&[record(&[0.0, 1.0], "b"), record(&[0.5, 0.5], "c")]).unwrap();
        store.add("items", batch).await.unwrap();
        assert_eq!(store.count_rows("items").await.unwrap(), 3);

        assert_eq!(store.table_names().await.unwrap(), vec!["items".to_string()]);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        let batch = infer_batch(&[
            record(&[0.0, 1.0], "far"),
            record(&[1.0, 0.0], "exact"),
            record(&[0.9, 0.2], "near"),
        ])
        .unwrap();
        store.create_table("items", batch).await.unwrap();

        let query = VectorSearch {
            vector: vec![1.0, 0.0],
            column: Some("vector".to_string()),
            distance: DistanceKind::L2,
            limit: 2,
            filter: None,
        };
        let batches = store.search("items", &query).await.unwrap();
        let rows = crate::records::batches_to_rows(&batches).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("exact"));
        assert_eq!(rows[1]["id"], json!("near"));
        assert!(rows[0].contains_key("_distance"));
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp).await;

        let batch = infer_batch(&[
            record(&[1.0, 0.0], "a"),
            record(&[0.9, 0.1], "b"),
            record(&[0.0, 1.0], "c"),
        ])
        .unwrap();
        store.create_table("items", batch).await.unwrap();

        let query = VectorSearch {
            vector: vec![1.0, 0.0],
            column: None,
            distance: DistanceKind::Cosine,
            limit: 10,
            filter: Some("id != 'a'".to_string()),
        };
        let batches = store.search("items", &query).await.unwrap();
        let rows = crate::records::batches_to_rows(&batches).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["id"] != json!("a")));
        assert_eq!(rows[0]["id"], json!("b"));
    }
}
