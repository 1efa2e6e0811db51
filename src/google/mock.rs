//! Mock backend for testing purposes.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{
    AppendUpdates, BackendError, CreatedSpreadsheet, SpreadsheetBackend, SpreadsheetProperties,
};
use crate::models::{CellValue, SpreadsheetRef};

/// A call received by [`MockBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    List {
        folder_id: String,
        page_size: u32,
    },
    Create {
        title: String,
    },
    AddParent {
        file_id: String,
        folder_id: String,
    },
    Append {
        spreadsheet_id: String,
        range: String,
        values: Vec<Vec<CellValue>>,
    },
}

/// A backend that records calls and returns predefined responses.
#[derive(Debug, Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    files: Mutex<Vec<SpreadsheetRef>>,
    created_id: Mutex<Option<String>>,
    append_updates: Mutex<AppendUpdates>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockBackend {
    /// Create a new mock backend. Creation yields id `"mock-spreadsheet"`.
    pub fn new() -> Self {
        Self {
            created_id: Mutex::new(Some("mock-spreadsheet".to_string())),
            ..Self::default()
        }
    }

    /// Set the files returned by listing
    pub fn set_files(&self, files: Vec<SpreadsheetRef>) {
        *self.files.lock().unwrap() = files;
    }

    /// Set the id returned on creation (`None` simulates a response without one)
    pub fn set_created_id(&self, id: Option<&str>) {
        *self.created_id.lock().unwrap() = id.map(str::to_string);
    }

    /// Set the `updates` block returned by append
    pub fn set_append_updates(&self, updates: AppendUpdates) {
        *self.append_updates.lock().unwrap() = updates;
    }

    /// Make every call fail with an API error carrying `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Hold every call for `delay` after recording it
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(call);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match &*self.failure.lock().unwrap() {
            Some(message) => Err(BackendError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpreadsheetBackend for MockBackend {
    async fn list_spreadsheets(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<SpreadsheetRef>, BackendError> {
        self.record(BackendCall::List {
            folder_id: folder_id.to_string(),
            page_size,
        })
        .await?;
        Ok(self.files.lock().unwrap().clone())
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<CreatedSpreadsheet, BackendError> {
        self.record(BackendCall::Create {
            title: title.to_string(),
        })
        .await?;
        Ok(CreatedSpreadsheet {
            spreadsheet_id: self.created_id.lock().unwrap().clone(),
            properties: Some(SpreadsheetProperties {
                title: Some(title.to_string()),
            }),
        })
    }

    async fn add_parent(&self, file_id: &str, folder_id: &str) -> Result<(), BackendError> {
        self.record(BackendCall::AddParent {
            file_id: file_id.to_string(),
            folder_id: folder_id.to_string(),
        })
        .await
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<CellValue>],
    ) -> Result<AppendUpdates, BackendError> {
        self.record(BackendCall::Append {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            values: values.to_vec(),
        })
        .await?;
        Ok(self.append_updates.lock().unwrap().clone())
    }
}
