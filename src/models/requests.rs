//! Tool inputs and outputs.
//!
//! Field names follow the wire contract (camelCase). Inputs are parsed with
//! [`parse_arguments`], which rejects both shape mismatches and out-of-range
//! values before any backend call is made.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CellValue, SpreadsheetRef};

pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Input validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid arguments: {0}")]
    Shape(String),

    #[error("'{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },

    #[error("'{0}' must not be empty")]
    Empty(&'static str),
}

/// Semantic checks that serde alone cannot express
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Deserialize and validate tool arguments; absent arguments mean `{}`
pub fn parse_arguments<T>(arguments: Option<Value>) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let arguments = match arguments {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(value) => value,
    };

    let parsed: T =
        serde_json::from_value(arguments).map_err(|e| ValidationError::Shape(e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Arguments of `list_spreadsheets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSpreadsheetsInput {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListSpreadsheetsInput {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Validate for ListSpreadsheetsInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ValidationError::OutOfRange {
                field: "pageSize",
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
                value: self.page_size,
            });
        }
        Ok(())
    }
}

/// Result of `list_spreadsheets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSpreadsheetsOutput {
    pub spreadsheets: Vec<SpreadsheetRef>,
}

/// Arguments of `create_spreadsheet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSpreadsheetInput {
    pub title: String,
}

impl Validate for CreateSpreadsheetInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.title.is_empty() {
            return Err(ValidationError::Empty("title"));
        }
        Ok(())
    }
}

/// Result of `create_spreadsheet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpreadsheetOutput {
    pub spreadsheet_id: String,
    pub title: String,
}

/// Arguments of `append_rows`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRowsInput {
    pub spreadsheet_id: String,

    /// A1 notation, e.g. `Sheet1!A1`
    pub range: String,

    pub values: Vec<Vec<CellValue>>,
}

impl Validate for AppendRowsInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.spreadsheet_id.is_empty() {
            return Err(ValidationError::Empty("spreadsheetId"));
        }
        if self.range.is_empty() {
            return Err(ValidationError::Empty("range"));
        }
        if self.values.is_empty() {
            return Err(ValidationError::Empty("values"));
        }
        Ok(())
    }
}

/// Result of `append_rows`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRowsOutput {
    pub updated_range: String,
    pub updated_rows: u64,
}
