//! Google Drive and Sheets backend.
//!
//! The tool handlers talk to the backend through the [`SpreadsheetBackend`]
//! trait. [`GoogleClient`] implements it against the Drive v3 and Sheets v4
//! REST APIs; [`MockBackend`] records calls for tests.
//!
//! Every trait method maps to exactly one HTTP round trip. Nothing here
//! retries, pages or caches.

mod client;
pub mod mock;

pub use client::GoogleClient;
pub use mock::{BackendCall, MockBackend};

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::AuthError;
use crate::models::{CellValue, SpreadsheetRef};

/// How Sheets interprets appended values
pub const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Where Sheets places appended values
pub const INSERT_DATA_OPTION: &str = "INSERT_ROWS";

/// Raw result of `spreadsheets.create`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSpreadsheet {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    #[serde(default)]
    pub properties: Option<SpreadsheetProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpreadsheetProperties {
    #[serde(default)]
    pub title: Option<String>,
}

/// Raw `updates` block of `spreadsheets.values.append`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendUpdates {
    #[serde(default)]
    pub updated_range: Option<String>,

    #[serde(default)]
    pub updated_rows: Option<u64>,
}

/// Operations the spreadsheet tools need from the backend
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync + std::fmt::Debug {
    /// List native spreadsheets whose parent is `folder_id`, in API order
    async fn list_spreadsheets(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<SpreadsheetRef>, BackendError>;

    /// Create an empty spreadsheet
    async fn create_spreadsheet(&self, title: &str) -> Result<CreatedSpreadsheet, BackendError>;

    /// Attach an existing file to an additional parent folder
    async fn add_parent(&self, file_id: &str, folder_id: &str) -> Result<(), BackendError>;

    /// Append rows after the last row of data in `range`
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<CellValue>],
    ) -> Result<AppendUpdates, BackendError>;
}

/// Errors that can occur when calling the backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Credentials could not be obtained
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a non-success status
    #[error("Google API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Parse(format!("JSON: {}", err))
    }
}
