//! Conversion between JSON records and Arrow record batches.
//!
//! Incoming records carry one numeric `vector` plus arbitrary extra fields.
//! The vector becomes a `FixedSizeList` column; extra fields are decoded with
//! `arrow-json`, either against an inferred schema (new table) or against the
//! schema of the table being appended to.

use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, Float64Array, RecordBatch};
use arrow_json::reader::{infer_json_schema_from_iterator, ReaderBuilder};
use arrow_json::ArrayWriter;
use arrow_schema::{ArrowError, DataType, Field, FieldRef, Schema, SchemaRef};
use lance_mcp_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Name of the vector column created for new tables.
pub const VECTOR_FIELD: &str = "vector";

/// Smallest list size treated as a vector column when inspecting a schema.
pub const MIN_VECTOR_DIMENSION: i32 = 2;

/// A record submitted for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Embedding values
    pub vector: Vec<f32>,
    /// Remaining fields, stored as-is
    pub fields: Map<String, Value>,
}

/// The vector-bearing column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorColumn {
    pub name: String,
    pub dimension: usize,
}

/// Find the vector column of a schema.
///
/// A vector column is a fixed-size list of floating-point values with at
/// least [`MIN_VECTOR_DIMENSION`] elements. When several columns qualify,
/// the one named [`VECTOR_FIELD`] wins, otherwise the first in schema order.
pub fn locate_vector_column(schema: &Schema) -> Option<VectorColumn> {
    let candidates: Vec<VectorColumn> = schema
        .fields()
        .iter()
        .filter_map(|field| match field.data_type() {
            DataType::FixedSizeList(item, size)
                if item.data_type().is_floating() && *size >= MIN_VECTOR_DIMENSION =>
            {
                Some(VectorColumn {
                    name: field.name().clone(),
                    dimension: *size as usize,
                })
            }
            _ => None,
        })
        .collect();

    if candidates.len() > 1 {
        tracing::debug!(
            "Schema has {} vector-like columns: {:?}",
            candidates.len(),
            candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
    }

    let preferred = candidates.iter().position(|c| c.name == VECTOR_FIELD);
    match preferred {
        Some(idx) => candidates.into_iter().nth(idx),
        None => candidates.into_iter().next(),
    }
}

/// Vector column of a table this server reads or writes.
///
/// Like [`locate_vector_column`], but a float fixed-size list named
/// [`VECTOR_FIELD`] is accepted at any length, so tables created from short
/// vectors stay usable.
pub fn resolve_vector_column(schema: &Schema) -> Option<VectorColumn> {
    locate_vector_column(schema).or_else(|| {
        let field = schema.field_with_name(VECTOR_FIELD).ok()?;
        match field.data_type() {
            DataType::FixedSizeList(item, size) if item.data_type().is_floating() && *size > 0 => {
                Some(VectorColumn {
                    name: VECTOR_FIELD.to_string(),
                    dimension: *size as usize,
                })
            }
            _ => None,
        }
    })
}

/// Build a batch for a new table, inferring column types from the records.
pub fn infer_batch(records: &[VectorRecord]) -> AppResult<RecordBatch> {
    let dimension = records
        .first()
        .map(|r| r.vector.len())
        .ok_or_else(|| AppError::Validation("No records to insert".to_string()))?;
    check_dimensions(records, dimension)?;

    let inferred = infer_json_schema_from_iterator(
        records
            .iter()
            .map(|r| Ok::<_, ArrowError>(Value::Object(r.fields.clone()))),
    )
    .map_err(|e| AppError::Serialization(format!("Failed to infer record schema: {}", e)))?;
    let field_schema = Arc::new(without_null_types(&inferred));

    let item: FieldRef = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_field: FieldRef = Arc::new(Field::new(
        VECTOR_FIELD,
        DataType::FixedSizeList(item.clone(), dimension as i32),
        false,
    ));
    let vector_array = build_vector_array(records, &item, dimension)?;

    let mut fields = vec![vector_field];
    let mut columns = vec![vector_array];

    if !field_schema.fields().is_empty() {
        let decoded = decode_fields(records, field_schema, false)?;
        fields.extend(decoded.schema().fields().iter().cloned());
        columns.extend(decoded.columns().iter().cloned());
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .map_err(|e| AppError::Serialization(format!("Failed to create RecordBatch: {}", e)))
}

/// Build a batch matching an existing table schema.
///
/// The record `vector` goes into the table's vector column, whatever its name.
/// Fields unknown to the table are rejected.
pub fn batch_for_schema(records: &[VectorRecord], schema: &SchemaRef) -> AppResult<RecordBatch> {
    let column = resolve_vector_column(schema).ok_or_else(|| {
        AppError::Validation("Table has no vector column to insert into".to_string())
    })?;
    check_dimensions(records, column.dimension)?;

    let item = match schema
        .field_with_name(&column.name)
        .map(|f| f.data_type().clone())
    {
        Ok(DataType::FixedSizeList(item, _)) => item,
        _ => {
            return Err(AppError::Serialization(format!(
                "Vector column '{}' is not a fixed-size list",
                column.name
            )))
        }
    };
    let vector_array = build_vector_array(records, &item, column.dimension)?;

    let others: Vec<FieldRef> = schema
        .fields()
        .iter()
        .filter(|f| f.name() != &column.name)
        .cloned()
        .collect();

    let decoded = if others.is_empty() {
        if let Some(extra) = records.iter().flat_map(|r| r.fields.keys()).next() {
            return Err(AppError::Validation(format!(
                "Field '{}' is not part of the table schema",
                extra
            )));
        }
        None
    } else {
        Some(decode_fields(records, Arc::new(Schema::new(others)), true)?)
    };

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            if field.name() == &column.name {
                return Ok(vector_array.clone());
            }
            decoded
                .as_ref()
                .and_then(|batch| batch.column_by_name(field.name()).cloned())
                .ok_or_else(|| {
                    AppError::Serialization(format!("Missing decoded column '{}'", field.name()))
                })
        })
        .collect::<AppResult<Vec<ArrayRef>>>()?;

    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| AppError::Validation(format!("Records do not match table schema: {}", e)))
}

/// Drop a column from every batch. Batches without it are returned unchanged.
pub fn without_column(batches: &[RecordBatch], name: &str) -> AppResult<Vec<RecordBatch>> {
    batches
        .iter()
        .map(|batch| match batch.schema().index_of(name) {
            Ok(idx) => {
                let keep: Vec<usize> = (0..batch.num_columns()).filter(|i| *i != idx).collect();
                batch.project(&keep).map_err(|e| {
                    AppError::Serialization(format!("Failed to project out '{}': {}", name, e))
                })
            }
            Err(_) => Ok(batch.clone()),
        })
        .collect()
}

/// Render batches as JSON objects, one per row.
pub fn batches_to_rows(batches: &[RecordBatch]) -> AppResult<Vec<Map<String, Value>>> {
    let non_empty: Vec<&RecordBatch> = batches.iter().filter(|b| b.num_rows() > 0).collect();
    if non_empty.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = ArrayWriter::new(Vec::new());
    writer
        .write_batches(&non_empty)
        .map_err(|e| AppError::Serialization(format!("Failed to encode results: {}", e)))?;
    writer
        .finish()
        .map_err(|e| AppError::Serialization(format!("Failed to encode results: {}", e)))?;

    let buf = writer.into_inner();
    Ok(serde_json::from_slice(&buf)?)
}

fn check_dimensions(records: &[VectorRecord], dimension: usize) -> AppResult<()> {
    for (idx, record) in records.iter().enumerate() {
        if record.vector.len() != dimension {
            return Err(AppError::Validation(format!(
                "vectors[{}] has {} dimensions, expected {}",
                idx,
                record.vector.len(),
                dimension
            )));
        }
    }
    Ok(())
}

fn build_vector_array(
    records: &[VectorRecord],
    item: &FieldRef,
    dimension: usize,
) -> AppResult<ArrayRef> {
    let flat = records.iter().flat_map(|r| r.vector.iter().copied());
    let values: ArrayRef = match item.data_type() {
        DataType::Float32 => Arc::new(Float32Array::from_iter_values(flat)),
        DataType::Float64 => Arc::new(Float64Array::from_iter_values(flat.map(f64::from))),
        other => {
            return Err(AppError::Validation(format!(
                "Unsupported vector element type: {}",
                other
            )))
        }
    };

    let array = FixedSizeListArray::try_new(item.clone(), dimension as i32, values, None)
        .map_err(|e| AppError::Serialization(format!("Failed to build vector column: {}", e)))?;
    Ok(Arc::new(array))
}

fn decode_fields(
    records: &[VectorRecord],
    schema: SchemaRef,
    strict: bool,
) -> AppResult<RecordBatch> {
    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_batch_size(records.len().max(1))
        .with_strict_mode(strict)
        .build_decoder()
        .map_err(|e| AppError::Serialization(format!("Failed to build decoder: {}", e)))?;

    let rows: Vec<&Map<String, Value>> = records.iter().map(|r| &r.fields).collect();
    decoder
        .serialize(&rows)
        .map_err(|e| AppError::Validation(format!("Records do not match table schema: {}", e)))?;

    let batch = decoder
        .flush()
        .map_err(|e| AppError::Validation(format!("Records do not match table schema: {}", e)))?;
    Ok(batch.unwrap_or_else(|| RecordBatch::new_empty(schema)))
}

/// All-null fields infer as `Null`; store them as nullable strings instead.
fn without_null_types(schema: &Schema) -> Schema {
    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| {
            if field.data_type() == &DataType::Null {
                Arc::new(Field::new(field.name(), DataType::Utf8, true))
            } else {
                field.clone()
            }
        })
        .collect();
    Schema::new(fields)
}
