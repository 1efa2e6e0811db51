//! MCP server: HTTP/SSE via axum, stdio via pmcp.
//!
//! Both modes serve the same [`ToolRegistry`]. The HTTP listener carries the
//! stateless `/mcp` endpoint and the SSE session endpoints side by side.

use crate::auth::{CredentialProvider, MetadataAuthenticator};
use crate::config::{Config, DEFAULT_SSE_KEEP_ALIVE_SECS};
use crate::google::GoogleClient;
use crate::mcp::http::{self, AppState};
use crate::mcp::protocol::{SERVER_NAME, SERVER_VERSION};
use crate::mcp::session::SessionTable;
use crate::mcp::envelope::Envelope;
use crate::mcp::tools::{ToolError, ToolKind, ToolRegistry};
use crate::utils::HttpClient;
use async_trait::async_trait;
use pmcp::types::ToolAnnotations;
use pmcp::{Error, RequestHandlerExtra, Server, ServerCapabilities, ToolHandler, ToolInfo};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Errors starting the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Mcp(#[from] pmcp::Error),
}

/// The MCP server for Google Sheets
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    sessions: SessionTable,
    keep_alive: Duration,
}

impl McpServer {
    /// Create a new MCP server over the given tool registry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            sessions: SessionTable::new(),
            keep_alive: Duration::from_secs(DEFAULT_SSE_KEEP_ALIVE_SECS),
        }
    }

    /// Set the interval between SSE keep-alive comments.
    ///
    /// A dropped client is only noticed when a write to it fails, so this also
    /// bounds how long a dead session stays in the table.
    pub fn with_sse_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Wire credentials, the Google client and the registry from configuration
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let client = HttpClient::new()?;
        let authenticator = MetadataAuthenticator::new(client.clone(), &config.google);
        let credentials = Arc::new(CredentialProvider::new(Arc::new(authenticator)));
        let backend = GoogleClient::new(client, credentials, &config.google);

        let registry = ToolRegistry::new(Arc::new(backend), config.google.folder_id.clone());
        Ok(Self::new(Arc::new(registry))
            .with_sse_keep_alive(Duration::from_secs(config.server.sse_keep_alive_secs.max(1))))
    }

    /// Get the tool registry
    pub fn tools(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    /// Get the SSE session table
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Router serving both HTTP transports
    pub fn router(&self) -> axum::Router {
        http::router(AppState {
            registry: self.registry.clone(),
            sessions: self.sessions.clone(),
            keep_alive: self.keep_alive,
        })
    }

    /// Run the server in HTTP/SSE mode
    ///
    /// Binding happens before this returns, so a bad address or a taken port
    /// is reported to the caller rather than inside the spawned task.
    pub async fn run_http(&self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| ServerError::InvalidAddress(format!("{}: {}", addr, e)))?;

        let listener = TcpListener::bind(socket_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: socket_addr,
                source,
            })?;
        let bound = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: socket_addr,
            source,
        })?;

        tracing::info!("MCP server listening on {}", bound);

        let app = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });

        Ok((bound, handle))
    }

    /// Run the server in stdio mode (for desktop MCP clients)
    pub async fn run_stdio(&self) -> Result<(), ServerError> {
        tracing::info!("Starting MCP server in stdio mode");

        let mut builder = Server::builder()
            .name(SERVER_NAME)
            .version(SERVER_VERSION)
            .capabilities(ServerCapabilities::default());

        for kind in self.registry.all() {
            let tool_handler = ToolWrapper {
                kind,
                registry: self.registry.clone(),
            };
            builder = builder.tool(kind.name().to_string(), tool_handler);
        }

        let server = builder.build()?;
        server.run_stdio().await?;
        Ok(())
    }
}

/// Wrapper for adapting a tool kind to pmcp's ToolHandler
#[derive(Debug, Clone)]
struct ToolWrapper {
    kind: ToolKind,
    registry: Arc<ToolRegistry>,
}

#[async_trait]
impl ToolHandler for ToolWrapper {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> Result<Value, Error> {
        stdio_result(self.registry.call(self.kind, Some(args)).await)
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(
            ToolInfo::with_annotations(
                self.kind.name().to_string(),
                Some(self.kind.description().to_string()),
                self.kind.input_schema(),
                ToolAnnotations::new().with_title(self.kind.title()),
            )
            .with_output_schema(self.kind.output_schema()),
        )
    }
}

/// pmcp wraps whatever a handler returns in a successful result, so a tool
/// failure can only surface on stdio as a JSON-RPC error
fn stdio_result(result: Result<Envelope, ToolError>) -> Result<Value, Error> {
    match result {
        Ok(envelope) => Ok(envelope.structured_content.unwrap_or(Value::Null)),
        Err(e) if e.is_invalid_params() => Err(Error::invalid_params(e.to_string())),
        Err(e) => {
            tracing::warn!(error = %e, "Tool call failed");
            Err(Error::internal(e.to_string()))
        }
    }
}
