//! Validated tool arguments.
//!
//! Each operation deserializes its raw JSON arguments into a typed bundle.
//! A bundle can only be built from arguments that pass validation, so
//! handlers never see a malformed request.

use crate::records::{VectorRecord, VECTOR_FIELD};
use lance_mcp_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of search results.
pub const DEFAULT_LIMIT: usize = 10;

/// Distance metric used for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    /// Euclidean distance
    L2,
    /// Cosine distance
    #[default]
    Cosine,
    /// Dot product
    Dot,
}

impl DistanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceKind::L2 => "l2",
            DistanceKind::Cosine => "cosine",
            DistanceKind::Dot => "dot",
        }
    }
}

/// How the search vector is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Literal query vector
    Vector(Vec<f32>),
    /// Free text, embedded before searching
    Text(String),
}

/// Arguments for `add-vectors`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddVectorsArgs {
    pub table_name: String,
    pub records: Vec<VectorRecord>,
}

/// Arguments for `search-vectors`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchArgs {
    pub table_name: String,
    pub query: QueryInput,
    pub limit: usize,
    pub distance: DistanceKind,
    pub filter: Option<String>,
    pub with_vectors: bool,
}

#[derive(Debug, Deserialize)]
struct RawAddVectors {
    table_name: String,
    vectors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    table_name: String,
    query_vector: Option<Vec<f32>>,
    query_text: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    distance_type: DistanceKind,
    #[serde(rename = "where")]
    filter: Option<String>,
    #[serde(default)]
    with_vectors: bool,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl AddVectorsArgs {
    /// Validate raw `add-vectors` arguments.
    pub fn from_value(arguments: Value) -> AppResult<Self> {
        let raw: RawAddVectors = parse(arguments)?;
        let table_name = check_table_name(raw.table_name)?;

        if raw.vectors.is_empty() {
            return Err(AppError::Validation(
                "'vectors' must contain at least one record".to_string(),
            ));
        }

        let records = raw
            .vectors
            .into_iter()
            .enumerate()
            .map(|(idx, value)| parse_record(idx, value))
            .collect::<AppResult<Vec<_>>>()?;

        let dimension = records[0].vector.len();
        if let Some((idx, record)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.vector.len() != dimension)
        {
            return Err(AppError::Validation(format!(
                "vectors[{}] has {} dimensions but vectors[0] has {}",
                idx,
                record.vector.len(),
                dimension
            )));
        }

        Ok(Self {
            table_name,
            records,
        })
    }
}

impl SearchArgs {
    /// Validate raw `search-vectors` arguments.
    pub fn from_value(arguments: Value) -> AppResult<Self> {
        let raw: RawSearch = parse(arguments)?;
        let table_name = check_table_name(raw.table_name)?;

        let query = match (raw.query_vector, raw.query_text) {
            (Some(vector), _) if !vector.is_empty() => QueryInput::Vector(vector),
            (Some(_), _) => {
                return Err(AppError::Validation(
                    "'query_vector' must not be empty".to_string(),
                ))
            }
            (None, Some(text)) if !text.trim().is_empty() => QueryInput::Text(text),
            (None, Some(_)) => {
                return Err(AppError::Validation(
                    "'query_text' must not be blank".to_string(),
                ))
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "Either 'query_vector' or 'query_text' must be provided".to_string(),
                ))
            }
        };

        if raw.limit == 0 {
            return Err(AppError::Validation(
                "'limit' must be at least 1".to_string(),
            ));
        }

        let filter = raw.filter.filter(|f| !f.trim().is_empty());

        Ok(Self {
            table_name,
            query,
            limit: raw.limit,
            distance: raw.distance_type,
            filter,
            with_vectors: raw.with_vectors,
        })
    }
}

/// Deserialize tool arguments; absent arguments count as an empty object.
fn parse<T: DeserializeOwned>(arguments: Value) -> AppResult<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };

    serde_json::from_value(arguments).map_err(|e| AppError::Validation(e.to_string()))
}

fn check_table_name(name: String) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "'table_name' must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn parse_record(idx: usize, value: Value) -> AppResult<VectorRecord> {
    let Value::Object(mut fields) = value else {
        return Err(AppError::Validation(format!(
            "vectors[{}] must be an object",
            idx
        )));
    };

    let vector = match fields.remove(VECTOR_FIELD) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_f64().map(|v| v as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "vectors[{}].{} must contain only numbers",
                    idx, VECTOR_FIELD
                ))
            })?,
        Some(_) => {
            return Err(AppError::Validation(format!(
                "vectors[{}].{} must be an array of numbers",
                idx, VECTOR_FIELD
            )))
        }
        None => {
            return Err(AppError::Validation(format!(
                "vectors[{}] is missing the '{}' field",
                idx, VECTOR_FIELD
            )))
        }
    };

    if vector.is_empty() {
        return Err(AppError::Validation(format!(
            "vectors[{}].{} must not be empty",
            idx, VECTOR_FIELD
        )));
    }

    Ok(VectorRecord { vector, fields })
}
