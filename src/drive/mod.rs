//! External Drive Search
//!
//! Searches a company's linked Drive folder for files relevant to a query
//! and fetches their text content. Token refresh is handled upstream; this
//! client consumes a ready access token stored on the company record.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while searching the linked folder
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Drive folder not linked")]
    NotLinked,

    #[error("Drive request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse Drive response: {0}")]
    ParseError(String),
}

/// A file hit from the linked folder
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(api_base: &str, access_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Full-text search within a folder, capped to `max_results`.
    pub async fn search(
        &self,
        query: &str,
        folder_id: &str,
        max_results: usize,
    ) -> Result<Vec<DriveFile>, DriveError> {
        info!(folder_id = %folder_id, "Searching linked Drive folder");

        let escaped = query.replace('\\', "\\\\").replace('\'', "\\'");
        let q = format!("'{}' in parents and fullText contains '{}'", folder_id, escaped);
        let page_size = max_results.to_string();

        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", q.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", "files(id,name,mimeType)"),
            ])
            .send()
            .await
            .map_err(|e| DriveError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DriveError::RequestFailed(format!(
                "{}: {}",
                status, error_text
            )));
        }

        let parsed: FileListResponse = response
            .json()
            .await
            .map_err(|e| DriveError::ParseError(e.to_string()))?;

        debug!(count = parsed.files.len(), "Drive search returned files");
        Ok(parsed.files)
    }

    /// Fetch a file's content as plain text. Native documents are exported;
    /// everything else is downloaded directly.
    pub async fn fetch_content(&self, file: &DriveFile) -> Result<String, DriveError> {
        let url = if file.mime_type.starts_with("application/vnd.google-apps") {
            format!(
                "{}/files/{}/export?mimeType=text/plain",
                self.api_base, file.id
            )
        } else {
            format!("{}/files/{}?alt=media", self.api_base, file.id)
        };

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| DriveError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriveError::RequestFailed(status.to_string()));
        }

        response
            .text()
            .await
            .map_err(|e| DriveError::ParseError(e.to_string()))
    }
}
