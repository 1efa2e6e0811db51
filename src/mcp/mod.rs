//! MCP (Model Context Protocol) implementation.

pub mod envelope;
pub mod http;
pub mod protocol;
pub mod server;
pub mod session;
mod tools;

pub use envelope::{wrap, Envelope};
pub use protocol::McpHandler;
pub use server::{McpServer, ServerError};
pub use session::{SessionError, SessionGuard, SessionTable};
pub use tools::{ToolError, ToolKind, ToolRegistry};
