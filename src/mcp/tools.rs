//! Tool registry for MCP tools.
//!
//! The set of tools is closed: [`ToolKind`] enumerates them and every match
//! over it is exhaustive, so adding a tool means touching each place that
//! describes or dispatches one.

use serde_json::{json, Value};
use std::sync::Arc;

use super::envelope::{self, Envelope};
use crate::google::{BackendError, SpreadsheetBackend};
use crate::models::{
    parse_arguments, AppendRowsInput, AppendRowsOutput, CreateSpreadsheetInput,
    CreateSpreadsheetOutput, ListSpreadsheetsInput, ListSpreadsheetsOutput, ValidationError,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};

/// The tools this server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListSpreadsheets,
    CreateSpreadsheet,
    AppendRows,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::ListSpreadsheets,
        ToolKind::CreateSpreadsheet,
        ToolKind::AppendRows,
    ];

    /// Wire name (e.g., "list_spreadsheets")
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListSpreadsheets => "list_spreadsheets",
            ToolKind::CreateSpreadsheet => "create_spreadsheet",
            ToolKind::AppendRows => "append_rows",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn title(self) -> &'static str {
        match self {
            ToolKind::ListSpreadsheets => "List spreadsheets",
            ToolKind::CreateSpreadsheet => "Create spreadsheet",
            ToolKind::AppendRows => "Append rows",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ListSpreadsheets => {
                "List the Google Sheets spreadsheets in the configured Drive folder."
            }
            ToolKind::CreateSpreadsheet => {
                "Create a new Google Sheets spreadsheet, filed in the configured Drive folder when one is set."
            }
            ToolKind::AppendRows => {
                "Append rows after the existing data in a range. Values are interpreted as if typed by a user, so dates and formulas are parsed."
            }
        }
    }

    /// JSON Schema for the arguments
    pub fn input_schema(self) -> Value {
        match self {
            ToolKind::ListSpreadsheets => json!({
                "type": "object",
                "properties": {
                    "pageSize": {
                        "type": "integer",
                        "description": "Maximum number of spreadsheets to return",
                        "minimum": MIN_PAGE_SIZE,
                        "maximum": MAX_PAGE_SIZE,
                        "default": DEFAULT_PAGE_SIZE
                    }
                }
            }),
            ToolKind::CreateSpreadsheet => json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title of the new spreadsheet",
                        "minLength": 1
                    }
                },
                "required": ["title"]
            }),
            ToolKind::AppendRows => json!({
                "type": "object",
                "properties": {
                    "spreadsheetId": {
                        "type": "string",
                        "description": "Target spreadsheet id",
                        "minLength": 1
                    },
                    "range": {
                        "type": "string",
                        "description": "Range in A1 notation, e.g. 'Sheet1!A1'",
                        "minLength": 1
                    },
                    "values": {
                        "type": "array",
                        "description": "Rows to append; each row is a list of cells",
                        "minItems": 1,
                        "items": {
                            "type": "array",
                            "items": { "type": ["string", "number", "boolean"] }
                        }
                    }
                },
                "required": ["spreadsheetId", "range", "values"]
            }),
        }
    }

    /// JSON Schema for the structured result
    pub fn output_schema(self) -> Value {
        match self {
            ToolKind::ListSpreadsheets => json!({
                "type": "object",
                "properties": {
                    "spreadsheets": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "name": { "type": "string" }
                            },
                            "required": ["id", "name"]
                        }
                    }
                },
                "required": ["spreadsheets"]
            }),
            ToolKind::CreateSpreadsheet => json!({
                "type": "object",
                "properties": {
                    "spreadsheetId": { "type": "string" },
                    "title": { "type": "string" }
                },
                "required": ["spreadsheetId", "title"]
            }),
            ToolKind::AppendRows => json!({
                "type": "object",
                "properties": {
                    "updatedRange": { "type": "string" },
                    "updatedRows": { "type": "integer" }
                },
                "required": ["updatedRange", "updatedRows"]
            }),
        }
    }

    /// Descriptor as listed by `tools/list`
    pub fn descriptor(self) -> Value {
        json!({
            "name": self.name(),
            "title": self.title(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
            "outputSchema": self.output_schema(),
        })
    }
}

/// Errors from resolving or running a tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    #[error("DRIVE_FOLDER_ID is not configured; cannot list spreadsheets")]
    MissingFolderId,

    #[error("Spreadsheet creation did not return an id")]
    MissingSpreadsheetId,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ToolError {
    /// Whether the caller sent a bad request rather than the tool failing
    pub fn is_invalid_params(&self) -> bool {
        matches!(self, ToolError::NotFound(_) | ToolError::InvalidInput(_))
    }
}

/// Registry for all MCP tools, bound to a backend
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    backend: Arc<dyn SpreadsheetBackend>,
    folder_id: Option<String>,
}

impl ToolRegistry {
    pub fn new(backend: Arc<dyn SpreadsheetBackend>, folder_id: Option<String>) -> Self {
        Self {
            backend,
            folder_id: folder_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// All tools, in registration order
    pub fn all(&self) -> impl Iterator<Item = ToolKind> {
        ToolKind::ALL.into_iter()
    }

    /// Descriptors for `tools/list`
    pub fn descriptors(&self) -> Vec<Value> {
        self.all().map(ToolKind::descriptor).collect()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> Result<Envelope, ToolError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        self.call(kind, arguments).await
    }

    /// Validate arguments, run the tool and wrap its result
    pub async fn call(&self, kind: ToolKind, arguments: Option<Value>) -> Result<Envelope, ToolError> {
        tracing::debug!(tool = kind.name(), "Calling tool");

        let payload = match kind {
            ToolKind::ListSpreadsheets => {
                serde_json::to_value(self.list_spreadsheets(parse_arguments(arguments)?).await?)?
            }
            ToolKind::CreateSpreadsheet => {
                serde_json::to_value(self.create_spreadsheet(parse_arguments(arguments)?).await?)?
            }
            ToolKind::AppendRows => {
                serde_json::to_value(self.append_rows(parse_arguments(arguments)?).await?)?
            }
        };

        Ok(envelope::wrap(payload))
    }

    pub async fn list_spreadsheets(
        &self,
        input: ListSpreadsheetsInput,
    ) -> Result<ListSpreadsheetsOutput, ToolError> {
        let folder_id = self.folder_id.as_deref().ok_or(ToolError::MissingFolderId)?;

        let spreadsheets = self
            .backend
            .list_spreadsheets(folder_id, input.page_size)
            .await?;

        Ok(ListSpreadsheetsOutput { spreadsheets })
    }

    pub async fn create_spreadsheet(
        &self,
        input: CreateSpreadsheetInput,
    ) -> Result<CreateSpreadsheetOutput, ToolError> {
        let created = self.backend.create_spreadsheet(&input.title).await?;
        let spreadsheet_id = created
            .spreadsheet_id
            .filter(|id| !id.is_empty())
            .ok_or(ToolError::MissingSpreadsheetId)?;

        if let Some(folder_id) = &self.folder_id {
            self.backend.add_parent(&spreadsheet_id, folder_id).await?;
        }

        let title = created
            .properties
            .and_then(|p| p.title)
            .unwrap_or(input.title);

        tracing::info!(spreadsheet_id = %spreadsheet_id, "Created spreadsheet");
        Ok(CreateSpreadsheetOutput {
            spreadsheet_id,
            title,
        })
    }

    pub async fn append_rows(&self, input: AppendRowsInput) -> Result<AppendRowsOutput, ToolError> {
        let updates = self
            .backend
            .append_rows(&input.spreadsheet_id, &input.range, &input.values)
            .await?;

        Ok(AppendRowsOutput {
            updated_range: updates.updated_range.unwrap_or_default(),
            updated_rows: updates.updated_rows.unwrap_or(0),
        })
    }
}
