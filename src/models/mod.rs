//! Data models for the spreadsheet tools.

mod requests;
mod spreadsheet;

pub use requests::{
    parse_arguments, AppendRowsInput, AppendRowsOutput, CreateSpreadsheetInput,
    CreateSpreadsheetOutput, ListSpreadsheetsInput, ListSpreadsheetsOutput, Validate,
    ValidationError, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
pub use spreadsheet::{CellValue, SpreadsheetRef, SPREADSHEET_MIME_TYPE};
