//! Basic usage example for the Sheets MCP library.
//!
//! This example drives the tool registry directly against a mock backend, so
//! it runs without Google credentials. Swap in `McpServer::from_config` to
//! talk to the real Drive and Sheets APIs.

use serde_json::json;
use sheets_mcp::google::MockBackend;
use sheets_mcp::{SpreadsheetRef, ToolRegistry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let backend = Arc::new(MockBackend::new());
    backend.set_files(vec![
        SpreadsheetRef::new("1a2b3c", "Budget 2024"),
        SpreadsheetRef::new("4d5e6f", "Team roster"),
    ]);

    let registry = ToolRegistry::new(backend.clone(), Some("demo-folder".to_string()));

    println!("Available tools:");
    for kind in registry.all() {
        println!("  {:<20}{}", kind.name(), kind.title());
    }

    let listed = registry
        .execute("list_spreadsheets", Some(json!({ "pageSize": 10 })))
        .await?;
    println!("\nlist_spreadsheets:\n{}", listed.text());

    let created = registry
        .execute("create_spreadsheet", Some(json!({ "title": "Expenses" })))
        .await?;
    println!("\ncreate_spreadsheet:\n{}", created.text());

    let appended = registry
        .execute(
            "append_rows",
            Some(json!({
                "spreadsheetId": "1a2b3c",
                "range": "Sheet1!A1",
                "values": [["2024-01-31", "Coffee", 4.5], ["2024-02-01", "Lunch", 12]]
            })),
        )
        .await?;
    println!("\nappend_rows:\n{}", appended.text());

    println!("\nBackend received {} calls", backend.calls().len());
    Ok(())
}
