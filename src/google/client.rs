//! REST client for Drive v3 and Sheets v4.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{
    AppendUpdates, BackendError, CreatedSpreadsheet, SpreadsheetBackend, INSERT_DATA_OPTION,
    VALUE_INPUT_OPTION,
};
use crate::auth::CredentialProvider;
use crate::config::GoogleConfig;
use crate::models::{CellValue, SpreadsheetRef, SPREADSHEET_MIME_TYPE};
use crate::utils::HttpClient;

/// Google REST backend
///
/// Each request asks the [`CredentialProvider`] for the shared handle, so the
/// first tool call pays for authentication and every later one reuses it. The
/// handle re-mints its token once it is close to expiry.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client: HttpClient,
    credentials: Arc<CredentialProvider>,
    drive_base_url: String,
    sheets_base_url: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GoogleClient {
    pub fn new(
        client: HttpClient,
        credentials: Arc<CredentialProvider>,
        config: &GoogleConfig,
    ) -> Self {
        Self {
            client,
            credentials,
            drive_base_url: config.drive_base_url.trim_end_matches('/').to_string(),
            sheets_base_url: config.sheets_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Attach the bearer token and send
    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let handle = self.credentials.client_handle().await?;
        let token = handle.access_token().await?;
        let response = request.bearer_auth(&token.value).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);

        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn folder_query(folder_id: &str) -> String {
        format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            folder_id.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME_TYPE
        )
    }
}

#[async_trait]
impl SpreadsheetBackend for GoogleClient {
    async fn list_spreadsheets(
        &self,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<SpreadsheetRef>, BackendError> {
        let url = format!("{}/files", self.drive_base_url);
        let request = self.client.client().get(&url).query(&[
            ("q", Self::folder_query(folder_id)),
            ("fields", "files(id,name)".to_string()),
            ("pageSize", page_size.to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
        ]);

        let list: FileList = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("files.list: {}", e)))?;

        Ok(list
            .files
            .into_iter()
            .map(|f| SpreadsheetRef::new(f.id, f.name))
            .collect())
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<CreatedSpreadsheet, BackendError> {
        let url = format!("{}/spreadsheets", self.sheets_base_url);
        let request = self
            .client
            .client()
            .post(&url)
            .json(&json!({ "properties": { "title": title } }));

        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("spreadsheets.create: {}", e)))
    }

    async fn add_parent(&self, file_id: &str, folder_id: &str) -> Result<(), BackendError> {
        let url = format!(
            "{}/files/{}",
            self.drive_base_url,
            urlencoding::encode(file_id)
        );
        let request = self
            .client
            .client()
            .patch(&url)
            .query(&[
                ("addParents", folder_id),
                ("fields", "id,parents"),
                ("supportsAllDrives", "true"),
            ])
            .json(&json!({}));

        self.send(request).await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<CellValue>],
    ) -> Result<AppendUpdates, BackendError> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.sheets_base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        );
        let request = self
            .client
            .client()
            .post(&url)
            .query(&[
                ("valueInputOption", VALUE_INPUT_OPTION),
                ("insertDataOption", INSERT_DATA_OPTION),
            ])
            .json(&json!({ "values": values }));

        let response: AppendResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("values.append: {}", e)))?;

        Ok(response.updates.unwrap_or_default())
    }
}
