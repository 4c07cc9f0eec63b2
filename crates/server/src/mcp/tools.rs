//! MCP tool definitions and execution.
//!
//! Three tools map onto [`VectorService`] operations. Arguments are validated
//! into typed bundles before the service is touched.

use lance_mcp_core::{AppError, AppResult};
use lance_mcp_vectors::{AddVectorsArgs, SearchArgs, VectorService, DEFAULT_LIMIT};
use serde::Serialize;
use serde_json::Value;

pub const ADD_VECTORS: &str = "add-vectors";
pub const SEARCH_VECTORS: &str = "search-vectors";
pub const LIST_TABLES: &str = "list-tables";

/// Definition of an MCP tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// One piece of tool output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// Registry of the vector tools, bound to one service.
pub struct ToolRegistry {
    service: VectorService,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(service: VectorService) -> Self {
        Self {
            service,
            definitions: vec![add_vectors_tool(), search_vectors_tool(), list_tables_tool()],
        }
    }

    /// Returns all tool definitions, in a stable order.
    pub fn list_tools(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Executes a tool with the given arguments.
    pub async fn execute(&self, name: &str, arguments: Value) -> AppResult<ToolResult> {
        match name {
            ADD_VECTORS => {
                let args = AddVectorsArgs::from_value(arguments)?;
                let table = args.table_name.clone();
                let outcome = self.service.add_vectors(args).await?;
                Ok(ToolResult::text(format!(
                    "Added {} vectors to table {}",
                    outcome.added, table
                )))
            }
            SEARCH_VECTORS => {
                let args = SearchArgs::from_value(arguments)?;
                let rows = self.service.search_vectors(args).await?;
                Ok(ToolResult::text(serde_json::to_string_pretty(&rows)?))
            }
            LIST_TABLES => {
                let tables = self.service.list_tables().await?;
                Ok(ToolResult::text(serde_json::to_string_pretty(&tables)?))
            }
            _ => Err(AppError::Validation(format!("Unknown tool: {}", name))),
        }
    }
}

fn add_vectors_tool() -> ToolDefinition {
    ToolDefinition {
        name: ADD_VECTORS,
        description: "Add vectors to a table. The table is created from the first batch if it does not exist.",
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Name of the table to add vectors to"
                },
                "vectors": {
                    "type": "array",
                    "description": "Records to add; each needs a numeric 'vector' and may carry extra fields",
                    "items": {
                        "type": "object",
                        "properties": {
                            "vector": {
                                "type": "array",
                                "items": { "type": "number" },
                                "description": "The vector data"
                            }
                        },
                        "required": ["vector"],
                        "additionalProperties": true
                    },
                    "minItems": 1
                }
            },
            "required": ["table_name", "vectors"]
        }),
    }
}

fn search_vectors_tool() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_VECTORS,
        description: "Search a table for the nearest vectors, by literal vector or by text embedded with the configured model.",
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Name of the table to search"
                },
                "query_vector": {
                    "type": "array",
                    "items": { "type": "number" },
                    "description": "Query vector (takes precedence over query_text)"
                },
                "query_text": {
                    "type": "string",
                    "description": "Text to embed and search with"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "default": DEFAULT_LIMIT,
                    "description": "Maximum number of results"
                },
                "distance_type": {
                    "type": "string",
                    "enum": ["l2", "cosine", "dot"],
                    "default": "cosine",
                    "description": "Distance metric"
                },
                "where": {
                    "type": "string",
                    "description": "Filter predicate, e.g. \"category = 'book'\""
                },
                "with_vectors": {
                    "type": "boolean",
                    "default": false,
                    "description": "Include vector data in results"
                }
            },
            "required": ["table_name"]
        }),
    }
}

fn list_tables_tool() -> ToolDefinition {
    ToolDefinition {
        name: LIST_TABLES,
        description: "List all tables in the database",
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    }
}
