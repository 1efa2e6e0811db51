//! Spreadsheet references and cell values.

use serde::{Deserialize, Serialize};

/// Drive MIME type of a native Google Sheets document
pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// A spreadsheet as listed by Drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetRef {
    /// Drive file id (doubles as the Sheets spreadsheet id)
    pub id: String,

    /// Display name
    pub name: String,
}

impl SpreadsheetRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One cell of an appended row.
///
/// Cells are sent as typed-in input, so strings such as `"2024-01-31"` or
/// `"=SUM(A1:A3)"` are parsed by Sheets rather than stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value.into())
    }
}
