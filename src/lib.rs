//! # Sheets MCP
//!
//! A Model Context Protocol (MCP) server exposing Google Sheets tools:
//! `list_spreadsheets`, `create_spreadsheet` and `append_rows`.
//!
//! ## Architecture
//!
//! - [`config`]: Layered configuration (file, environment)
//! - [`auth`]: Single-flight credential provider and token minting
//! - [`google`]: Drive/Sheets backend trait, REST client and mock
//! - [`models`]: Tool inputs and outputs with validation
//! - [`mcp`]: Tool registry, JSON-RPC dispatch, HTTP/SSE and stdio transports
//! - [`utils`]: Shared HTTP client

pub mod auth;
pub mod config;
pub mod google;
pub mod mcp;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use mcp::{McpServer, ToolKind, ToolRegistry};
pub use models::SpreadsheetRef;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
