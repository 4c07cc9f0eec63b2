//! Model Context Protocol surface.

pub mod dispatch;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::ToolRegistry;
