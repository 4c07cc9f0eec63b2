//! lance-mcp
//!
//! MCP server over stdio exposing a LanceDB database as vector tools.

mod mcp;

use clap::{error::ErrorKind, CommandFactory, Parser};
use lance_mcp_core::{logging, AppResult, ServerConfig};
use lance_mcp_vectors::{LanceDbStore, OllamaProvider, VectorService};
use mcp::{McpServer, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// MCP server for vector search over a LanceDB database
#[derive(Parser, Debug)]
#[command(name = "lance-mcp")]
#[command(about = "MCP server for vector search over LanceDB", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the LanceDB database directory
    #[arg(long, env = "LANCE_MCP_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Base URL of the Ollama embedding service
    #[arg(long, env = "LANCE_MCP_OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Embedding model used for query_text
    #[arg(long, env = "LANCE_MCP_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Path to config file
    #[arg(short, long, env = "LANCE_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = ServerConfig::load(cli.config.as_deref())?.with_overrides(
        cli.db_path,
        cli.ollama_url,
        cli.embedding_model,
        cli.log_level,
        cli.no_color,
    );

    if config.db_path.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a database path is required: pass --db-path or set LANCE_MCP_DB_PATH",
            )
            .exit();
    }

    config.validate()?;
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("lance-mcp {} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Embedding service: {} ({})", config.ollama_url, config.embedding_model);

    let store = Arc::new(LanceDbStore::connect(&config.db_uri()?).await?);
    let embedder = Arc::new(OllamaProvider::new(
        &config.ollama_url,
        &config.embedding_model,
        Duration::from_secs(config.request_timeout_secs),
    )?);

    let server = McpServer::new(ToolRegistry::new(VectorService::new(store, embedder)));

    let result = tokio::select! {
        result = server.run_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received");
            Ok(())
        }
    };

    match &result {
        Ok(()) => tracing::info!("Shutting down"),
        Err(e) => tracing::error!("Server failed: {}", e),
    }

    result
}
